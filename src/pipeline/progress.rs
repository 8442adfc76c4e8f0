//! Run progress events.
//!
//! Fixed checkpoints: 10 (started), 30 (skeleton ready), 30..=80 while assets settle,
//! 85 (assembly started), 100 (done). Reported percent never decreases within a run.

use crate::pipeline::RunStatus;
use crate::synthesis::Settlement;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: RunStatus,
    pub percent: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    Started,
    SkeletonReady,
    AssemblyStarted,
    Done,
}

impl Checkpoint {
    pub fn percent(&self) -> u8 {
        match self {
            Checkpoint::Started => 10,
            Checkpoint::SkeletonReady => 30,
            Checkpoint::AssemblyStarted => 85,
            Checkpoint::Done => 100,
        }
    }

    pub fn stage(&self) -> RunStatus {
        match self {
            Checkpoint::Started => RunStatus::Skeleton,
            Checkpoint::SkeletonReady => RunStatus::Assets,
            Checkpoint::AssemblyStarted => RunStatus::Assembly,
            Checkpoint::Done => RunStatus::Completed,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            Checkpoint::Started => "Generating page skeleton",
            Checkpoint::SkeletonReady => "Skeleton ready, generating images",
            Checkpoint::AssemblyStarted => "Assembling page",
            Checkpoint::Done => "Page ready",
        }
    }
}

const ASSET_RAMP_START: u8 = 30;
const ASSET_RAMP_SPAN: usize = 50;

/// Forwards progress to a caller-supplied sink.
pub struct ProgressReporter<'a> {
    sink: &'a mut (dyn FnMut(&ProgressEvent) + Send),
    last_percent: u8,
    reached: Vec<Checkpoint>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(sink: &'a mut (dyn FnMut(&ProgressEvent) + Send)) -> Self {
        Self {
            sink,
            last_percent: 0,
            reached: Vec::new(),
        }
    }

    pub fn last_percent(&self) -> u8 {
        self.last_percent
    }

    /// Emits `checkpoint` unless it was already reported.
    pub fn checkpoint(&mut self, checkpoint: Checkpoint) {
        if self.reached.contains(&checkpoint) {
            return;
        }
        self.reached.push(checkpoint);
        self.emit(checkpoint.stage(), checkpoint.percent(), checkpoint.message().to_string(), None);
    }

    /// One stage-two ramp event per settled asset.
    pub fn asset_settled(&mut self, settlement: Settlement<'_>) {
        let total = settlement.total.max(1);
        let completed = settlement.completed.min(total);
        let percent = ASSET_RAMP_START + (ASSET_RAMP_SPAN * completed / total) as u8;
        let payload = json!({
            "completed": settlement.completed,
            "total": settlement.total,
            "asset_id": settlement.result.id,
            "succeeded": settlement.result.succeeded,
        });
        self.emit(
            RunStatus::Assets,
            percent,
            format!("Generated image {} of {}", settlement.completed, settlement.total),
            Some(payload),
        );
    }

    fn emit(&mut self, stage: RunStatus, percent: u8, message: String, payload: Option<Value>) {
        let percent = percent.min(100).max(self.last_percent);
        self.last_percent = percent;
        debug!(stage = %stage, percent, message = %message, "progress");
        (self.sink)(&ProgressEvent {
            stage,
            percent,
            message,
            payload,
        });
    }
}
