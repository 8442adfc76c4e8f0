use crate::error::AttemptError;
use crate::image::backends::{build_image_http_client, check_status, malformed, require_key, ImageBackend};
use crate::image::sizes::SizeTable;
use crate::image::{AspectRatio, ImageProvider, ImageSpec};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::multipart::Form;
use reqwest::Client;
use serde::Deserialize;

const PROVIDER: ImageProvider = ImageProvider::Stability;

/// Stability AI stable-image core endpoint. Images come back inline and are returned
/// as data URLs.
pub struct StabilityBackend {
    client: Client,
    base_url: String,
    aspect_ratios: SizeTable<&'static str>,
}

impl StabilityBackend {
    pub fn new(base_url: Option<String>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_image_http_client()?,
            base_url: base_url.unwrap_or_else(|| "https://api.stability.ai".to_string()),
            aspect_ratios: Self::default_aspect_ratios(),
        })
    }

    pub fn default_aspect_ratios() -> SizeTable<&'static str> {
        SizeTable::new(
            vec![
                (AspectRatio::Square, "1:1"),
                (AspectRatio::Landscape, "16:9"),
                (AspectRatio::Portrait, "9:16"),
                (AspectRatio::Standard, "4:3"),
                (AspectRatio::Wide, "21:9"),
            ],
            "1:1",
        )
    }

    pub fn aspect_ratio_for(&self, aspect: AspectRatio) -> &'static str {
        *self.aspect_ratios.lookup(aspect)
    }
}

#[derive(Deserialize)]
struct StabilityResponse {
    image: Option<String>,
    finish_reason: Option<String>,
}

pub(crate) fn parse_response(body: &str) -> Result<String, AttemptError> {
    let parsed: StabilityResponse = serde_json::from_str(body)
        .map_err(|e| malformed(PROVIDER, format!("invalid JSON: {}", e)))?;
    if let Some(reason) = parsed.finish_reason.as_deref() {
        if reason != "SUCCESS" {
            return Err(malformed(PROVIDER, format!("generation finished with {}", reason)));
        }
    }
    let image = parsed
        .image
        .filter(|image| !image.is_empty())
        .ok_or_else(|| malformed(PROVIDER, "response contained no image"))?;
    STANDARD
        .decode(image.as_bytes())
        .map_err(|e| malformed(PROVIDER, format!("image is not valid base64: {}", e)))?;
    Ok(format!("data:image/png;base64,{}", image))
}

#[async_trait]
impl ImageBackend for StabilityBackend {
    fn provider(&self) -> ImageProvider {
        PROVIDER
    }

    async fn generate(&self, spec: &ImageSpec, api_key: Option<&str>) -> Result<String, AttemptError> {
        let api_key = require_key(PROVIDER, api_key)?;
        let form = Form::new()
            .text("prompt", spec.prompt())
            .text("aspect_ratio", self.aspect_ratio_for(spec.aspect_ratio))
            .text("output_format", "png");

        let response = self
            .client
            .post(format!("{}/v2beta/stable-image/generate/core", self.base_url))
            .bearer_auth(api_key)
            .header("Accept", "application/json")
            .multipart(form)
            .send()
            .await
            .map_err(|e| AttemptError::from_http(PROVIDER.as_str(), e))?;
        let response = check_status(PROVIDER, response).await?;
        let body = response
            .text()
            .await
            .map_err(|e| AttemptError::from_http(PROVIDER.as_str(), e))?;
        parse_response(&body)
    }
}
