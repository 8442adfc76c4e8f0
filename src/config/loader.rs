//! Layered configuration loading: defaults, then an optional TOML file, then
//! `PAGEWRIGHT__`-prefixed environment variables (`__` separates nested keys, e.g.
//! `PAGEWRIGHT__IMAGES__MAX_CONCURRENCY=8`).

use crate::config::PipelineConfig;
use crate::error::ConfigError;
use crate::image::ImageProvider;
use crate::synthesis::AssetSynthesizer;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const ENV_PREFIX: &str = "PAGEWRIGHT";
pub const ENV_SEPARATOR: &str = "__";

/// Path of the config file to load, when set.
pub const ENV_CONFIG_PATH: &str = "PAGEWRIGHT_CONFIG";

const LIST_KEYS: [&str; 3] = ["images.priority", "page.sections", "page.hints"];

#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    env: Option<config::Map<String, String>>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader for the file named by `PAGEWRIGHT_CONFIG`, if any.
    pub fn from_env() -> Self {
        Self {
            file: std::env::var_os(ENV_CONFIG_PATH).map(PathBuf::from),
            env: None,
        }
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Read overrides from `vars` instead of the process environment.
    pub fn with_env_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env = Some(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    /// Load a configuration from a specific TOML file (no environment overrides).
    pub fn load_from_file(path: &Path) -> Result<PipelineConfig, ConfigError> {
        Self::new()
            .with_file(path)
            .with_env_vars(Vec::<(String, String)>::new())
            .load()
    }

    pub fn load(&self) -> Result<PipelineConfig, ConfigError> {
        let mut builder = builder_with_defaults()?;

        if let Some(path) = &self.file {
            if !path.exists() {
                return Err(ConfigError::Invalid(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            debug!(config_path = %path.display(), "loading config file");
            builder = builder.add_source(File::from(path.as_path()).format(FileFormat::Toml).required(true));
        }

        let mut environment = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
            .list_separator(",");
        for key in LIST_KEYS {
            environment = environment.with_list_parse_key(key);
        }
        if let Some(vars) = &self.env {
            environment = environment.source(Some(vars.clone()));
        }

        let config: PipelineConfig = builder.add_source(environment).build()?.try_deserialize()?;
        Ok(config)
    }
}

/// Builder with every scalar default applied.
fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
    let priority: Vec<String> = ImageProvider::DEFAULT_PRIORITY
        .iter()
        .map(|p| p.as_str().to_string())
        .collect();

    Config::builder()
        .set_default("text.provider_type", "openai")?
        .set_default("text.model", "gpt-4o")?
        .set_default("images.preferred", ImageProvider::Pollinations.as_str())?
        .set_default("images.priority", priority)?
        .set_default("images.max_concurrency", AssetSynthesizer::DEFAULT_MAX_CONCURRENCY as i64)?
        .set_default("images.attempt_timeout_secs", 60_i64)?
        .set_default("images.verify_urls", false)?
        .set_default("page.page_type", "landing")?
        .set_default("page.language", "en")?
        .set_default("page.max_images", 6_i64)?
        .set_default("logging.level", "info")?
        .set_default("logging.format", "text")?
        .set_default("logging.output", "stderr")
}
