use crate::error::AttemptError;
use crate::image::backends::{build_image_http_client, check_status, malformed, require_key, ImageBackend};
use crate::image::sizes::SizeTable;
use crate::image::{AspectRatio, ImageProvider, ImageSpec};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

const PROVIDER: ImageProvider = ImageProvider::Unsplash;

/// Unsplash photo search. Uses the description as the query (style hints are ignored,
/// stock photos have no style).
pub struct UnsplashBackend {
    client: Client,
    base_url: String,
    orientations: SizeTable<&'static str>,
}

impl UnsplashBackend {
    pub fn new(base_url: Option<String>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_image_http_client()?,
            base_url: base_url.unwrap_or_else(|| "https://api.unsplash.com".to_string()),
            orientations: Self::default_orientations(),
        })
    }

    pub fn default_orientations() -> SizeTable<&'static str> {
        SizeTable::new(
            vec![
                (AspectRatio::Square, "squarish"),
                (AspectRatio::Landscape, "landscape"),
                (AspectRatio::Portrait, "portrait"),
            ],
            "landscape",
        )
    }

    pub fn orientation_for(&self, aspect: AspectRatio) -> &'static str {
        *self.orientations.lookup(aspect)
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Photo>,
}

#[derive(Deserialize)]
struct Photo {
    urls: PhotoUrls,
}

#[derive(Deserialize)]
struct PhotoUrls {
    regular: Option<String>,
    full: Option<String>,
}

pub(crate) fn parse_response(body: &str) -> Result<String, AttemptError> {
    let parsed: SearchResponse = serde_json::from_str(body)
        .map_err(|e| malformed(PROVIDER, format!("invalid JSON: {}", e)))?;
    parsed
        .results
        .into_iter()
        .find_map(|photo| photo.urls.regular.or(photo.urls.full))
        .ok_or_else(|| malformed(PROVIDER, "search returned no photos"))
}

#[async_trait]
impl ImageBackend for UnsplashBackend {
    fn provider(&self) -> ImageProvider {
        PROVIDER
    }

    async fn generate(&self, spec: &ImageSpec, api_key: Option<&str>) -> Result<String, AttemptError> {
        let api_key = require_key(PROVIDER, api_key)?;
        let response = self
            .client
            .get(format!("{}/search/photos", self.base_url))
            .header("Authorization", format!("Client-ID {}", api_key))
            .header("Accept-Version", "v1")
            .query(&[
                ("query", spec.description.trim()),
                ("orientation", self.orientation_for(spec.aspect_ratio)),
                ("per_page", "1"),
            ])
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
