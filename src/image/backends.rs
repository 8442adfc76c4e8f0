//! Image generation backends. Each backend performs exactly one request per attempt
//! and reports failure as an [`AttemptError`]; retrying is the chain's business.

use crate::error::{AttemptError, AttemptErrorKind};
use crate::image::{ImageProvider, ImageSpec};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

mod openai;
mod pollinations;
mod stability;
mod unsplash;

pub use openai::OpenAiImageBackend;
pub use pollinations::PollinationsBackend;
pub use stability::StabilityBackend;
pub use unsplash::UnsplashBackend;

/// One image generation backend.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    fn provider(&self) -> ImageProvider;

    /// Produce a URL for `spec`. `api_key` is the credential configured for this
    /// provider, if any.
    async fn generate(&self, spec: &ImageSpec, api_key: Option<&str>) -> Result<String, AttemptError>;
}

const IMAGE_HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const IMAGE_HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

pub(crate) fn build_image_http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(IMAGE_HTTP_CONNECT_TIMEOUT)
        .timeout(IMAGE_HTTP_REQUEST_TIMEOUT)
        .build()
}

pub(crate) fn require_key(provider: ImageProvider, api_key: Option<&str>) -> Result<String, AttemptError> {
    api_key
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AttemptError::missing_credential(provider.as_str()))
}

/// Turn a non-success response into an attempt error carrying the status code.
pub(crate) async fn check_status(
    provider: ImageProvider,
    response: reqwest::Response,
) -> Result<reqwest::Response, AttemptError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(AttemptError::new(
        provider.as_str(),
        AttemptErrorKind::Status(status.as_u16()),
        format!("status {}: {}", status, truncate_body(&body)),
    ))
}

pub(crate) fn malformed(provider: ImageProvider, message: impl Into<String>) -> AttemptError {
    AttemptError::new(provider.as_str(), AttemptErrorKind::Malformed, message)
}

fn truncate_body(body: &str) -> String {
    const MAX_BODY_CHARS: usize = 300;
    if body.chars().count() <= MAX_BODY_CHARS {
        body.to_string()
    } else {
        let mut out: String = body.chars().take(MAX_BODY_CHARS).collect();
        out.push_str("...");
        out
    }
}
