use crate::error::AttemptError;
use crate::image::backends::{build_image_http_client, check_status, ImageBackend};
use crate::image::sizes::{Dimensions, SizeTable};
use crate::image::{AspectRatio, ImageProvider, ImageSpec};
use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::Client;

const PROVIDER: ImageProvider = ImageProvider::Pollinations;

/// Pollinations public endpoint. The image URL is derived from the prompt; a liveness
/// check against it is optional.
pub struct PollinationsBackend {
    client: Client,
    base_url: String,
    sizes: SizeTable<Dimensions>,
    verify: bool,
}

impl PollinationsBackend {
    pub fn new(base_url: Option<String>, verify: bool) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_image_http_client()?,
            base_url: base_url.unwrap_or_else(|| "https://image.pollinations.ai".to_string()),
            sizes: Self::default_sizes(),
            verify,
        })
    }

    pub fn default_sizes() -> SizeTable<Dimensions> {
        SizeTable::new(
            vec![
                (AspectRatio::Square, Dimensions::new(1024, 1024)),
                (AspectRatio::Landscape, Dimensions::new(1280, 720)),
                (AspectRatio::Portrait, Dimensions::new(720, 1280)),
                (AspectRatio::Standard, Dimensions::new(1024, 768)),
            ],
            Dimensions::new(1024, 1024),
        )
    }

    pub fn url_for(&self, spec: &ImageSpec) -> String {
        let dims = self.sizes.lookup(spec.aspect_ratio);
        format!(
            "{}/prompt/{}?width={}&height={}&nologo=true",
            self.base_url,
            utf8_percent_encode(&spec.prompt(), NON_ALPHANUMERIC),
            dims.width,
            dims.height
        )
    }
}

#[async_trait]
impl ImageBackend for PollinationsBackend {
    fn provider(&self) -> ImageProvider {
        PROVIDER
    }

    async fn generate(&self, spec: &ImageSpec, _api_key: Option<&str>) -> Result<String, AttemptError> {
        let url = self.url_for(spec);
        if self.verify {
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| AttemptError::from_http(PROVIDER.as_str(), e))?;
            check_status(PROVIDER, response).await?;
        }
        Ok(url)
    }
}
