//! Pagewright: staged web page generation
//!
//! A request is turned into a finished HTML document in three stages: a text model
//! drafts the page skeleton, image backends fill its placeholder assets concurrently
//! (each asset walking its own provider fallback chain), and the assembler splices
//! the results in and repairs the document structure.

pub mod assembly;
pub mod config;
pub mod error;
pub mod image;
pub mod logging;
pub mod pipeline;
pub mod provider;
pub mod request;
pub mod skeleton;
pub mod synthesis;

pub use config::{ConfigLoader, PipelineConfig};
pub use error::{FatalStageError, GenerationError};
pub use pipeline::{GenerationOutcome, ProgressEvent, Stage, StageOrchestrator};
pub use request::GenerationRequest;
