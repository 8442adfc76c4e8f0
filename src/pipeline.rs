//! Stage Orchestration
//!
//! Sequences skeleton generation, asset synthesis and assembly for one run, reports
//! monotonic progress, and records the run through an optional [`RunRecorder`].

use crate::skeleton::{ExtractionRule, SeoMetadata};
use crate::synthesis::{AssetBatch, BatchSummary};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod orchestrator;
pub mod progress;
pub mod recorder;
pub mod state;

pub use orchestrator::StageOrchestrator;
pub use progress::{Checkpoint, ProgressEvent, ProgressReporter};
pub use recorder::{new_run_id, AuditEntry, MemoryRunRecorder, RunRecord, RunRecorder};
pub use state::{RunState, RunStatus};

/// The three sequential phases of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Skeleton,
    Assets,
    Assembly,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Skeleton => "skeleton",
            Stage::Assets => "assets",
            Stage::Assembly => "assembly",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Successful run result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutcome {
    pub run_id: String,
    pub artifact: String,
    pub seo: SeoMetadata,
    pub extraction: ExtractionRule,
    pub assets: AssetBatch,
}

impl GenerationOutcome {
    pub fn summary(&self) -> BatchSummary {
        self.assets.summary()
    }
}
