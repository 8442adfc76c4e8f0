//! Generation request: the immutable input to one pipeline run.

use crate::image::ImageProvider;
use crate::provider::ModelProvider;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Page-level configuration handed to the skeleton generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageConfig {
    #[serde(default = "default_page_type")]
    pub page_type: String,

    #[serde(default)]
    pub title: Option<String>,

    /// Section names in display order (e.g. hero, features, pricing)
    #[serde(default)]
    pub sections: Vec<String>,

    #[serde(default)]
    pub color_scheme: Option<String>,

    #[serde(default = "default_language")]
    pub language: String,

    /// Structural hints produced upstream by intent classification
    #[serde(default)]
    pub hints: Vec<String>,

    /// Upper bound on image placeholders requested from the text backend
    #[serde(default = "default_max_images")]
    pub max_images: usize,
}

fn default_page_type() -> String {
    "landing".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_max_images() -> usize {
    6
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            page_type: default_page_type(),
            title: None,
            sections: Vec::new(),
            color_scheme: None,
            language: default_language(),
            hints: Vec::new(),
            max_images: default_max_images(),
        }
    }
}

/// Per-backend optional API keys for image providers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    keys: HashMap<ImageProvider, String>,
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, provider: ImageProvider, key: impl Into<String>) -> Self {
        self.insert(provider, key);
        self
    }

    /// Blank keys are treated as absent.
    pub fn insert(&mut self, provider: ImageProvider, key: impl Into<String>) {
        let key = key.into();
        if key.trim().is_empty() {
            self.keys.remove(&provider);
        } else {
            self.keys.insert(provider, key);
        }
    }

    pub fn get(&self, provider: ImageProvider) -> Option<&str> {
        self.keys.get(&provider).map(String::as_str)
    }
}

/// Image backend selection for a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSettings {
    pub preferred: ImageProvider,
    #[serde(default)]
    pub credentials: Credentials,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            preferred: ImageProvider::Pollinations,
            credentials: Credentials::default(),
        }
    }
}

/// Immutable input to a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(default)]
    pub page: PageConfig,
    pub text: ModelProvider,
    #[serde(default)]
    pub images: ImageSettings,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, text: ModelProvider) -> Self {
        Self {
            prompt: prompt.into(),
            page: PageConfig::default(),
            text,
            images: ImageSettings::default(),
        }
    }

    pub fn with_page(mut self, page: PageConfig) -> Self {
        self.page = page;
        self
    }

    pub fn with_images(mut self, images: ImageSettings) -> Self {
        self.images = images;
        self
    }
}
