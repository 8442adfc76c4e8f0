//! Run status state machine.

use crate::error::PersistenceError;
use crate::pipeline::Stage;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Created,
    Skeleton,
    Assets,
    Assembly,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Created => "created",
            RunStatus::Skeleton => "skeleton",
            RunStatus::Assets => "assets",
            RunStatus::Assembly => "assembly",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }

    /// Pipeline stage this status runs, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            RunStatus::Skeleton => Some(Stage::Skeleton),
            RunStatus::Assets => Some(Stage::Assets),
            RunStatus::Assembly => Some(Stage::Assembly),
            _ => None,
        }
    }

    fn successor(&self) -> Option<RunStatus> {
        match self {
            RunStatus::Created => Some(RunStatus::Skeleton),
            RunStatus::Skeleton => Some(RunStatus::Assets),
            RunStatus::Assets => Some(RunStatus::Assembly),
            RunStatus::Assembly => Some(RunStatus::Completed),
            RunStatus::Completed | RunStatus::Failed => None,
        }
    }

    /// Forward by exactly one step, or to `Failed` from any non-terminal status.
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == RunStatus::Failed || self.successor() == Some(next)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// In-process state of one run.
#[derive(Debug, Clone)]
pub struct RunState {
    run_id: String,
    status: RunStatus,
    history: Vec<RunStatus>,
}

impl RunState {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            status: RunStatus::Created,
            history: vec![RunStatus::Created],
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn history(&self) -> &[RunStatus] {
        &self.history
    }

    /// Rejected transitions leave the state unchanged.
    pub fn transition(&mut self, next: RunStatus) -> Result<(), PersistenceError> {
        if !self.status.can_transition_to(next) {
            return Err(PersistenceError::InvalidTransition {
                run_id: self.run_id.clone(),
                message: format!("{} -> {}", self.status, next),
            });
        }
        self.status = next;
        self.history.push(next);
        Ok(())
    }
}
