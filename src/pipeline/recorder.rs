//! Run records and audit log.
//!
//! The orchestrator writes through [`RunRecorder`] at stage boundaries and once per
//! settled asset. Recorder failures never fail a run.

use crate::error::PersistenceError;
use crate::pipeline::{RunStatus, Stage};
use crate::provider::TokenUsage;
use crate::request::GenerationRequest;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

pub const AUDIT_PROMPT_LIMIT: usize = 1000;
pub const AUDIT_RESPONSE_LIMIT: usize = 2000;

static RUN_COUNTER: AtomicU64 = AtomicU64::new(1);

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

pub fn new_run_id() -> String {
    let ts = now_millis();
    let pid = std::process::id();
    let seq = RUN_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("run-{ts}-{pid}-{seq}")
}

/// Keeps at most `limit` chars, never splitting one.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}

/// Provider-reported tokens when available, else a chars/4 estimate.
pub fn estimate_units(usage: Option<TokenUsage>, prompt: &str, response: &str) -> u64 {
    match usage {
        Some(usage) if usage.total_tokens > 0 => u64::from(usage.total_tokens),
        _ => ((prompt.chars().count() + response.chars().count()) / 4) as u64,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub run_id: String,
    pub stage: Stage,
    pub backend_id: String,
    pub model: String,
    pub prompt: String,
    pub response: String,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub estimated_units: u64,
    pub cost: f64,
    pub latency_ms: u64,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        run_id: impl Into<String>,
        stage: Stage,
        backend_id: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            stage,
            backend_id: backend_id.into(),
            model: model.into(),
            prompt: String::new(),
            response: String::new(),
            succeeded: true,
            error: None,
            estimated_units: 0,
            cost: 0.0,
            latency_ms: 0,
            recorded_at: Utc::now(),
        }
    }

    /// Stores the exchange truncated to the audit limits.
    pub fn with_exchange(mut self, prompt: &str, response: &str) -> Self {
        self.prompt = truncate_chars(prompt, AUDIT_PROMPT_LIMIT);
        self.response = truncate_chars(response, AUDIT_RESPONSE_LIMIT);
        self
    }

    pub fn with_units(mut self, units: u64) -> Self {
        self.estimated_units = units;
        self
    }

    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.succeeded = false;
        self.error = Some(error.into());
        self
    }
}

/// Persistence collaborator for run records and audit entries.
#[async_trait]
pub trait RunRecorder: Send + Sync {
    async fn create_run(&self, request: &GenerationRequest) -> Result<String, PersistenceError>;

    async fn update_run(
        &self,
        run_id: &str,
        status: RunStatus,
        artifact: Option<&str>,
        progress: u8,
    ) -> Result<(), PersistenceError>;

    async fn append_audit(&self, entry: AuditEntry) -> Result<(), PersistenceError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub prompt: String,
    pub status: RunStatus,
    pub history: Vec<RunStatus>,
    pub progress: u8,
    pub artifact: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// In-memory recorder. `unavailable()` builds one whose every write fails.
#[derive(Default)]
pub struct MemoryRunRecorder {
    runs: Mutex<HashMap<String, RunRecord>>,
    audit: Mutex<Vec<AuditEntry>>,
    unavailable: bool,
}

impl MemoryRunRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn run(&self, run_id: &str) -> Option<RunRecord> {
        self.runs.lock().get(run_id).cloned()
    }

    pub fn run_count(&self) -> usize {
        self.runs.lock().len()
    }

    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.lock().clone()
    }

    fn check_available(&self) -> Result<(), PersistenceError> {
        if self.unavailable {
            return Err(PersistenceError::Unavailable("memory recorder disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RunRecorder for MemoryRunRecorder {
    async fn create_run(&self, request: &GenerationRequest) -> Result<String, PersistenceError> {
        self.check_available()?;
        let run_id = new_run_id();
        let now = Utc::now();
        let record = RunRecord {
            run_id: run_id.clone(),
            prompt: request.prompt.clone(),
            status: RunStatus::Created,
            history: vec![RunStatus::Created],
            progress: 0,
            artifact: None,
            created_at: now,
            updated_at: now,
        };
        self.runs.lock().insert(run_id.clone(), record);
        Ok(run_id)
    }

    async fn update_run(
        &self,
        run_id: &str,
        status: RunStatus,
        artifact: Option<&str>,
        progress: u8,
    ) -> Result<(), PersistenceError> {
        self.check_available()?;
        let mut runs = self.runs.lock();
        let record = runs
            .get_mut(run_id)
            .ok_or_else(|| PersistenceError::RunNotFound(run_id.to_string()))?;

        if record.status != status {
            if !record.status.can_transition_to(status) {
                return Err(PersistenceError::InvalidTransition {
                    run_id: run_id.to_string(),
                    message: format!("{} -> {}", record.status, status),
                });
            }
            record.status = status;
            record.history.push(status);
        }
        record.progress = record.progress.max(progress);
        if let Some(artifact) = artifact {
            record.artifact = Some(artifact.to_string());
        }
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn append_audit(&self, entry: AuditEntry) -> Result<(), PersistenceError> {
        self.check_available()?;
        self.audit.lock().push(entry);
        Ok(())
    }
}
