//! ABOUTME: Error types shared across the civic QA router core
//! ABOUTME: Mirrors the caller-safe-text discipline required by the error handling design

use thiserror::Error;

/// Errors the core surfaces to the HTTP collaborator as an internal failure.
///
/// Every other failure mode (`SchemaMiss`, `ExecutorError`, `IndexUnavailable`,
/// `EmbeddingFailure`, `Timeout`) is recovered locally by the Execution Pipeline
/// via promotion/demotion or degraded-answer text and never reaches this type.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// An LLM Gateway operation returned output that violated its declared
    /// schema after one retry.
    #[error("model contract violated for operation {operation}")]
    ModelContract {
        operation: &'static str,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// The Structured Retriever's drafted query was not read-only.
    #[error("structured retriever drafted a non read-only query")]
    NonReadOnlyQuery { audit_log_ref: String },

    /// A configuration value failed validation at startup.
    #[error("configuration error: {message}")]
    Configuration { message: String },
}

pub type Result<T> = std::result::Result<T, PipelineError>;
