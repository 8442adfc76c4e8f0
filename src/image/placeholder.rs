//! Deterministic placeholder URLs for assets whose fallback chain is exhausted.

use crate::image::sizes::{Dimensions, SizeTable};
use crate::image::AspectRatio;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

const PLACEHOLDER_BASE_URL: &str = "https://placehold.co";
const EXCERPT_CHARS: usize = 60;

/// Aspect-ratio → placeholder dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderTable {
    sizes: SizeTable<Dimensions>,
}

impl PlaceholderTable {
    pub fn new(sizes: SizeTable<Dimensions>) -> Self {
        Self { sizes }
    }

    pub fn dimensions(&self, aspect: AspectRatio) -> Dimensions {
        *self.sizes.lookup(aspect)
    }

    /// Same input always yields the same URL.
    pub fn url_for(&self, description: &str, aspect: AspectRatio) -> String {
        let dims = self.dimensions(aspect);
        format!(
            "{}/{}x{}?text={}",
            PLACEHOLDER_BASE_URL,
            dims.width,
            dims.height,
            utf8_percent_encode(&excerpt(description), NON_ALPHANUMERIC)
        )
    }
}

impl Default for PlaceholderTable {
    fn default() -> Self {
        Self::new(SizeTable::new(
            vec![
                (AspectRatio::Square, Dimensions::new(800, 800)),
                (AspectRatio::Landscape, Dimensions::new(1280, 720)),
                (AspectRatio::Portrait, Dimensions::new(720, 1280)),
                (AspectRatio::Standard, Dimensions::new(1024, 768)),
                (AspectRatio::Wide, Dimensions::new(1680, 720)),
            ],
            Dimensions::new(800, 800),
        ))
    }
}

fn excerpt(description: &str) -> String {
    let trimmed = description.trim();
    if trimmed.is_empty() {
        return "Image".to_string();
    }
    trimmed.chars().take(EXCERPT_CHARS).collect::<String>().trim_end().to_string()
}
