//! Image assets: request/result types, per-backend request shaping, and the provider
//! fallback chain that resolves one asset description into a URL.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod backends;
pub mod chain;
pub mod placeholder;
pub mod sizes;

pub use backends::{ImageBackend, OpenAiImageBackend, PollinationsBackend, StabilityBackend, UnsplashBackend};
pub use chain::{ChainOutcome, ChainPolicy, FallbackChain};
pub use placeholder::PlaceholderTable;
pub use sizes::{Dimensions, SizeTable};

/// Aspect-ratio class requested for an asset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AspectRatio {
    #[default]
    Square,
    Landscape,
    Portrait,
    Standard,
    Wide,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 5] = [
        AspectRatio::Square,
        AspectRatio::Landscape,
        AspectRatio::Portrait,
        AspectRatio::Standard,
        AspectRatio::Wide,
    ];

    /// Lenient parse of a free-form hint. Unknown hints resolve to `Square`.
    pub fn from_hint(hint: &str) -> Self {
        match hint.trim().to_ascii_lowercase().as_str() {
            "16:9" | "landscape" | "horizontal" | "card" => AspectRatio::Landscape,
            "9:16" | "portrait" | "vertical" | "tall" => AspectRatio::Portrait,
            "4:3" | "standard" | "photo" => AspectRatio::Standard,
            "21:9" | "wide" | "banner" | "hero" | "panorama" => AspectRatio::Wide,
            _ => AspectRatio::Square,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square => "square",
            AspectRatio::Landscape => "landscape",
            AspectRatio::Portrait => "portrait",
            AspectRatio::Standard => "standard",
            AspectRatio::Wide => "wide",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Image generation backends known to the fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageProvider {
    OpenAi,
    Stability,
    Unsplash,
    Pollinations,
}

impl ImageProvider {
    /// Default fixed priority order shared by every chain.
    pub const DEFAULT_PRIORITY: [ImageProvider; 4] = [
        ImageProvider::OpenAi,
        ImageProvider::Stability,
        ImageProvider::Unsplash,
        ImageProvider::Pollinations,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageProvider::OpenAi => "openai",
            ImageProvider::Stability => "stability",
            ImageProvider::Unsplash => "unsplash",
            ImageProvider::Pollinations => "pollinations",
        }
    }

    pub fn requires_credential(&self) -> bool {
        !matches!(self, ImageProvider::Pollinations)
    }
}

impl fmt::Display for ImageProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" | "dalle" | "dall-e" => Ok(ImageProvider::OpenAi),
            "stability" | "stabilityai" => Ok(ImageProvider::Stability),
            "unsplash" => Ok(ImageProvider::Unsplash),
            "pollinations" => Ok(ImageProvider::Pollinations),
            other => Err(format!("unknown image provider '{}'", other)),
        }
    }
}

/// One asset to resolve, declared by the skeleton.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRequest {
    pub id: String,
    pub placeholder_token: String,
    pub description: String,
    #[serde(default)]
    pub style_hint: Option<String>,
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
}

impl AssetRequest {
    pub fn spec(&self) -> ImageSpec {
        ImageSpec {
            description: self.description.clone(),
            style_hint: self.style_hint.clone(),
            aspect_ratio: self.aspect_ratio,
        }
    }
}

/// Outcome for one asset. Exactly one per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetResult {
    pub id: String,
    pub url: String,
    pub succeeded: bool,
    pub provider_used: Option<ImageProvider>,
    pub attempts: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What a backend is asked to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSpec {
    pub description: String,
    pub style_hint: Option<String>,
    pub aspect_ratio: AspectRatio,
}

impl ImageSpec {
    pub fn new(description: impl Into<String>, aspect_ratio: AspectRatio) -> Self {
        Self {
            description: description.into(),
            style_hint: None,
            aspect_ratio,
        }
    }

    pub fn with_style(mut self, style_hint: impl Into<String>) -> Self {
        self.style_hint = Some(style_hint.into());
        self
    }

    /// Prompt text sent to generative backends.
    pub fn prompt(&self) -> String {
        match self.style_hint.as_deref().map(str::trim) {
            Some(style) if !style.is_empty() => {
                format!("{}, {} style", self.description.trim(), style)
            }
            _ => self.description.trim().to_string(),
        }
    }
}
