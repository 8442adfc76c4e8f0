use crate::error::AttemptError;
use crate::image::backends::{build_image_http_client, check_status, malformed, require_key, ImageBackend};
use crate::image::sizes::SizeTable;
use crate::image::{AspectRatio, ImageProvider, ImageSpec};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const PROVIDER: ImageProvider = ImageProvider::OpenAi;

/// OpenAI images API (DALL-E)
pub struct OpenAiImageBackend {
    client: Client,
    model: String,
    base_url: String,
    sizes: SizeTable<&'static str>,
}

impl OpenAiImageBackend {
    pub fn new(model: Option<String>, base_url: Option<String>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_image_http_client()?,
            model: model.unwrap_or_else(|| "dall-e-3".to_string()),
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            sizes: Self::default_sizes(),
        })
    }

    /// dall-e-3 only accepts three sizes.
    pub fn default_sizes() -> SizeTable<&'static str> {
        SizeTable::new(
            vec![
                (AspectRatio::Square, "1024x1024"),
                (AspectRatio::Landscape, "1792x1024"),
                (AspectRatio::Portrait, "1024x1792"),
            ],
            "1024x1024",
        )
    }

    pub fn size_for(&self, aspect: AspectRatio) -> &'static str {
        *self.sizes.lookup(aspect)
    }
}

#[derive(Serialize)]
struct ImageGenerationRequest<'a> {
    model: &'a str,
    prompt: String,
    n: u32,
    size: &'a str,
}

#[derive(Deserialize)]
struct ImageGenerationResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
}

#[derive(Deserialize)]
struct ImageDatum {
    url: Option<String>,
}

pub(crate) fn parse_response(body: &str) -> Result<String, AttemptError> {
    let parsed: ImageGenerationResponse = serde_json::from_str(body)
        .map_err(|e| malformed(PROVIDER, format!("invalid JSON: {}", e)))?;
    parsed
        .data
        .into_iter()
        .find_map(|datum| datum.url)
        .filter(|url| !url.is_empty())
        .ok_or_else(|| malformed(PROVIDER, "response contained no image url"))
}

#[async_trait]
impl ImageBackend for OpenAiImageBackend {
    fn provider(&self) -> ImageProvider {
        PROVIDER
    }

    async fn generate(&self, spec: &ImageSpec, api_key: Option<&str>) -> Result<String, AttemptError> {
        let api_key = require_key(PROVIDER, api_key)?;
        let request = ImageGenerationRequest {
            model: &self.model,
            prompt: spec.prompt(),
            n: 1,
            size: self.size_for(spec.aspect_ratio),
        };

        let response = self
            .client
            .post(format!("{}/images/generations", self.base_url))
            .bearer_auth(api_key)
            .json(&request)
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
