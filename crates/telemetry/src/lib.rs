//! Decision tracing and run artifacts for docsage.
//!
//! Every run produces a [`RunTrace`]: the ordered actions, a snapshot of the
//! routing-relevant state after each one, safety-guard stops and the
//! refinement log. The trace is handed to a [`TraceSink`] after every step.

pub mod artifacts;
pub mod model;
pub mod sink;

pub use artifacts::{AnswerDocument, RunArtifacts};
pub use model::{RunTrace, StateSnapshot, StopEvent, TraceStep};
pub use sink::{JsonFileSink, MemorySink, TraceSink};

/// Errors from the telemetry subsystem.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("i/o error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}
