//! Error types for the page generation pipeline.
//!
//! Stage-level faults (skeleton, assembly) are fatal and surface to the caller as
//! [`GenerationError`]. Backend attempts inside an image fallback chain fail with
//! [`AttemptError`], which never leaves the chain. Persistence failures are isolated
//! by the orchestrator and only logged.

use crate::pipeline::Stage;
use thiserror::Error;

/// Text backend (skeleton generator) errors
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Provider not supported: {0}")]
    Unsupported(String),

    #[error("Provider request failed: {0}")]
    RequestFailed(String),

    #[error("Provider authentication failed: {0}")]
    AuthFailed(String),

    #[error("Provider rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Provider model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider returned a malformed response: {0}")]
    MalformedResponse(String),

    #[error("Provider returned an empty document")]
    EmptyDocument,

    #[error("Provider error: {0}")]
    Other(String),
}

/// Why a single image backend attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptErrorKind {
    MissingCredential,
    Status(u16),
    Malformed,
    Transport,
    Timeout,
    Unavailable,
    Panicked,
}

/// A failed image backend attempt. Advances the fallback chain; never returned to callers.
#[derive(Debug, Clone, Error)]
#[error("{provider} attempt failed ({kind:?}): {message}")]
pub struct AttemptError {
    pub provider: String,
    pub kind: AttemptErrorKind,
    pub message: String,
}

impl AttemptError {
    pub fn new(provider: impl Into<String>, kind: AttemptErrorKind, message: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            kind,
            message: message.into(),
        }
    }

    pub fn missing_credential(provider: impl Into<String>) -> Self {
        let provider = provider.into();
        let message = format!("no API key configured for {}", provider);
        Self::new(provider, AttemptErrorKind::MissingCredential, message)
    }

    /// Map a transport-level reqwest failure onto an attempt error.
    pub fn from_http(provider: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::new(provider, AttemptErrorKind::Timeout, error.to_string())
        } else if let Some(status) = error.status() {
            Self::new(provider, AttemptErrorKind::Status(status.as_u16()), error.to_string())
        } else if error.is_decode() {
            Self::new(provider, AttemptErrorKind::Malformed, error.to_string())
        } else {
            Self::new(provider, AttemptErrorKind::Transport, error.to_string())
        }
    }
}

/// Persistence collaborator errors (run records and audit log)
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("Invalid status transition for run {run_id}: {message}")]
    InvalidTransition { run_id: String, message: String },

    #[error("Persistence backend unavailable: {0}")]
    Unavailable(String),
}

/// Underlying cause of a fatal stage failure.
#[derive(Debug, Error)]
pub enum StageFault {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Internal fault: {0}")]
    Internal(String),
}

/// A stage-1 or stage-3 failure. Aborts the run.
#[derive(Debug, Error)]
#[error("{stage} stage failed: {cause}")]
pub struct FatalStageError {
    pub stage: Stage,
    #[source]
    pub cause: StageFault,
}

impl FatalStageError {
    pub fn new(stage: Stage, cause: impl Into<StageFault>) -> Self {
        Self {
            stage,
            cause: cause.into(),
        }
    }
}

/// Errors returned from the public `generate` surface.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Stage(#[from] FatalStageError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl GenerationError {
    /// Stage that aborted the run, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            GenerationError::Stage(err) => Some(err.stage),
            GenerationError::InvalidRequest(_) => None,
        }
    }
}

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Invalid(String),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Configuration I/O error: {0}")]
    Io(#[from] std::io::Error),
}
