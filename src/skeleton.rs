//! Skeleton Generation
//!
//! Stage one of a run: ask a text backend for a page skeleton, pull the document out of
//! the raw response, and derive the SEO metadata and asset requests the later stages
//! consume.

use crate::error::ProviderError;
use crate::image::AssetRequest;
use crate::provider::{
    CompletionOptions, ModelProviderClient, ProviderFactory, TokenUsage,
};
use crate::request::GenerationRequest;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

pub mod assets;
pub mod extract;
pub mod prompt;
pub mod seo;

pub use assets::{discover_assets, placeholder_token};
pub use extract::{extract_document, Extraction, ExtractionRule};
pub use prompt::build_messages;
pub use seo::SeoMetadata;

/// Raw text backend output plus what is needed to audit the call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkeletonResponse {
    pub text: String,
    pub backend_id: String,
    pub model: String,
    /// User prompt sent to the backend
    pub prompt: String,
    pub usage: Option<TokenUsage>,
}

/// Produces raw skeleton text for a request.
#[async_trait]
pub trait SkeletonGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<SkeletonResponse, ProviderError>;
}

/// Skeleton generator backed by a chat-completion provider.
///
/// By default a client is built per request from `request.text`, so an unconfigured
/// backend fails before any network I/O.
pub struct ProviderSkeletonGenerator {
    client: Option<Arc<dyn ModelProviderClient>>,
    options: CompletionOptions,
}

impl ProviderSkeletonGenerator {
    pub fn new() -> Self {
        Self {
            client: None,
            options: CompletionOptions::default(),
        }
    }

    /// Always use `client`, ignoring the request's text backend.
    pub fn with_client(client: Arc<dyn ModelProviderClient>) -> Self {
        Self {
            client: Some(client),
            options: CompletionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    fn client_for(&self, request: &GenerationRequest) -> Result<Arc<dyn ModelProviderClient>, ProviderError> {
        match &self.client {
            Some(client) => Ok(Arc::clone(client)),
            None => ProviderFactory::create_client(&request.text).map(Arc::from),
        }
    }
}

impl Default for ProviderSkeletonGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SkeletonGenerator for ProviderSkeletonGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<SkeletonResponse, ProviderError> {
        let client = self.client_for(request)?;
        let messages = build_messages(request);
        let prompt = messages
            .last()
            .map(|message| message.content.clone())
            .unwrap_or_default();

        debug!(
            provider = client.provider_name(),
            model = client.model_name(),
            prompt_chars = prompt.chars().count(),
            "requesting skeleton"
        );
        let response = client.complete(messages, self.options.clone()).await?;
        info!(
            provider = client.provider_name(),
            model = %response.model,
            response_chars = response.content.chars().count(),
            finish_reason = ?response.finish_reason,
            "skeleton response received"
        );

        Ok(SkeletonResponse {
            text: response.content,
            backend_id: client.provider_name().to_string(),
            model: response.model,
            prompt,
            usage: response.usage,
        })
    }
}

/// Post-processed stage-one output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkeletonDraft {
    pub document: String,
    pub rule: ExtractionRule,
    pub seo: SeoMetadata,
    pub assets: Vec<AssetRequest>,
    pub response: SkeletonResponse,
}

impl SkeletonDraft {
    /// Extracts the document, metadata and asset requests. A response with nothing
    /// extractable is an [`ProviderError::EmptyDocument`].
    pub fn from_response(response: SkeletonResponse, fallback_description: &str) -> Result<Self, ProviderError> {
        let Extraction { rule, document } =
            extract_document(&response.text).ok_or(ProviderError::EmptyDocument)?;
        let seo = SeoMetadata::extract(&document);
        let assets = discover_assets(&document, fallback_description);
        debug!(rule = ?rule, assets = assets.len(), "skeleton post-processed");
        Ok(Self {
            document,
            rule,
            seo,
            assets,
            response,
        })
    }
}

static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)([a-z_:][-a-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>/=`]+))"#).unwrap()
});

/// Attributes of a single start tag, names lowercased. First occurrence wins.
pub(crate) fn tag_attributes(tag: &str) -> HashMap<String, String> {
    let mut attributes = HashMap::new();
    for caps in ATTRIBUTE.captures_iter(tag) {
        let name = caps[1].to_ascii_lowercase();
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        attributes.entry(name).or_insert(value);
    }
    attributes
}
