//! Configuration System
//!
//! Loosely-typed settings from defaults, an optional TOML file and `PAGEWRIGHT__*`
//! environment variables. Everything is validated once here and turned into the typed
//! parts a run needs (text backend, image chain, synthesizer, orchestrator).

use crate::error::ConfigError;
use crate::image::{ChainPolicy, FallbackChain, ImageProvider, PlaceholderTable};
use crate::logging::{self, LoggingConfig};
use crate::pipeline::StageOrchestrator;
use crate::provider::{ModelProvider, ProviderConfig};
use crate::request::{Credentials, GenerationRequest, ImageSettings, PageConfig};
use crate::skeleton::ProviderSkeletonGenerator;
use crate::synthesis::AssetSynthesizer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

mod loader;

pub use loader::{ConfigLoader, ENV_PREFIX, ENV_SEPARATOR};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Text backend for skeleton generation
    #[serde(default = "default_text")]
    pub text: ProviderConfig,

    #[serde(default)]
    pub images: ImageConfig,

    /// Default page settings applied to requests built from this config
    #[serde(default)]
    pub page: PageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_text() -> ProviderConfig {
    ProviderConfig {
        provider_type: "openai".to_string(),
        model: "gpt-4o".to_string(),
        api_key: None,
        endpoint: None,
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            text: default_text(),
            images: ImageConfig::default(),
            page: PageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Image chain configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Provider attempted first for every asset
    #[serde(default = "default_preferred")]
    pub preferred: String,

    /// Fallback order after the preferred provider
    #[serde(default = "default_priority")]
    pub priority: Vec<String>,

    /// Assets resolved at once; 0 means no limit
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Per-attempt timeout in seconds
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,

    /// Check generated Pollinations URLs before accepting them
    #[serde(default)]
    pub verify_urls: bool,

    /// API keys by provider name
    #[serde(default)]
    pub credentials: BTreeMap<String, String>,
}

fn default_preferred() -> String {
    ImageProvider::Pollinations.as_str().to_string()
}

fn default_priority() -> Vec<String> {
    ImageProvider::DEFAULT_PRIORITY
        .iter()
        .map(|p| p.as_str().to_string())
        .collect()
}

fn default_max_concurrency() -> usize {
    AssetSynthesizer::DEFAULT_MAX_CONCURRENCY
}

fn default_attempt_timeout_secs() -> u64 {
    ChainPolicy::DEFAULT_ATTEMPT_TIMEOUT.as_secs()
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            preferred: default_preferred(),
            priority: default_priority(),
            max_concurrency: default_max_concurrency(),
            attempt_timeout_secs: default_attempt_timeout_secs(),
            verify_urls: false,
            credentials: BTreeMap::new(),
        }
    }
}

impl ImageConfig {
    pub fn preferred_provider(&self) -> Result<ImageProvider, ConfigError> {
        self.preferred.parse().map_err(ConfigError::Invalid)
    }

    pub fn priority_order(&self) -> Result<Vec<ImageProvider>, ConfigError> {
        self.priority
            .iter()
            .map(|name| name.parse::<ImageProvider>().map_err(ConfigError::Invalid))
            .collect()
    }

    pub fn attempt_timeout(&self) -> Result<Duration, ConfigError> {
        if self.attempt_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "images.attempt_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(Duration::from_secs(self.attempt_timeout_secs))
    }

    /// Unknown provider names are rejected; blank keys are dropped.
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        let mut credentials = Credentials::new();
        for (name, key) in &self.credentials {
            let provider: ImageProvider = name.parse().map_err(ConfigError::Invalid)?;
            credentials.insert(provider, key.clone());
        }
        Ok(credentials)
    }

    pub fn settings(&self) -> Result<ImageSettings, ConfigError> {
        Ok(ImageSettings {
            preferred: self.preferred_provider()?,
            credentials: self.credentials()?,
        })
    }

    pub fn chain_policy(&self) -> Result<ChainPolicy, ConfigError> {
        Ok(ChainPolicy::new(
            self.priority_order()?,
            PlaceholderTable::default(),
            self.attempt_timeout()?,
        ))
    }

    /// Synthesizer over the four built-in HTTP backends.
    pub fn build_synthesizer(&self) -> Result<AssetSynthesizer, ConfigError> {
        let chain = FallbackChain::standard(self.chain_policy()?, self.verify_urls)
            .map_err(|e| ConfigError::Invalid(format!("Failed to build image HTTP client: {}", e)))?;
        Ok(AssetSynthesizer::new(chain, self.max_concurrency))
    }

    fn validate(&self) -> Result<(), String> {
        self.preferred_provider().map_err(|e| e.to_string())?;
        self.priority_order().map_err(|e| e.to_string())?;
        self.attempt_timeout().map_err(|e| e.to_string())?;
        self.credentials().map_err(|e| e.to_string())?;
        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Text(String),
    Images(String),
    Logging(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Text(msg) => write!(f, "text: {}", msg),
            ValidationError::Images(msg) => write!(f, "images: {}", msg),
            ValidationError::Logging(msg) => write!(f, "logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl PipelineConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.text.to_model_provider() {
            errors.push(ValidationError::Text(e.to_string()));
        }
        if let Err(e) = self.images.validate() {
            errors.push(ValidationError::Images(e));
        }
        if let Err(e) = logging::validate(&self.logging) {
            errors.push(ValidationError::Logging(e.to_string()));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Like [`validate`](Self::validate), folded into a single error.
    pub fn ensure_valid(&self) -> Result<(), ConfigError> {
        self.validate().map_err(|errors| {
            let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
            ConfigError::Invalid(format!(
                "Configuration validation failed:\n{}",
                messages.join("\n")
            ))
        })
    }

    /// Render as TOML, in the layout [`ConfigLoader`] reads back.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Invalid(format!("Failed to serialize config: {}", e)))
    }

    pub fn text_provider(&self) -> Result<ModelProvider, ConfigError> {
        self.text
            .to_model_provider()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Request for `prompt` using the configured backends and page defaults.
    pub fn request(&self, prompt: impl Into<String>) -> Result<GenerationRequest, ConfigError> {
        Ok(GenerationRequest::new(prompt, self.text_provider()?)
            .with_page(self.page.clone())
            .with_images(self.images.settings()?))
    }

    /// Orchestrator with the provider-backed skeleton generator and standard image chain.
    pub fn orchestrator(&self) -> Result<StageOrchestrator, ConfigError> {
        Ok(StageOrchestrator::new(
            Arc::new(ProviderSkeletonGenerator::new()),
            self.images.build_synthesizer()?,
        ))
    }
}
