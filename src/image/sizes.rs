//! Static aspect-ratio lookup tables used to shape backend requests.

use crate::image::AspectRatio;
use serde::{Deserialize, Serialize};

/// Pixel dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Maps aspect-ratio classes to a backend-specific encoding. Classes without an entry
/// resolve to the baseline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeTable<T> {
    entries: Vec<(AspectRatio, T)>,
    baseline: T,
}

impl<T> SizeTable<T> {
    pub fn new(entries: Vec<(AspectRatio, T)>, baseline: T) -> Self {
        Self { entries, baseline }
    }

    pub fn lookup(&self, aspect: AspectRatio) -> &T {
        self.entries
            .iter()
            .find(|(candidate, _)| *candidate == aspect)
            .map(|(_, value)| value)
            .unwrap_or(&self.baseline)
    }

    pub fn is_mapped(&self, aspect: AspectRatio) -> bool {
        self.entries.iter().any(|(candidate, _)| *candidate == aspect)
    }

    pub fn baseline(&self) -> &T {
        &self.baseline
    }
}
