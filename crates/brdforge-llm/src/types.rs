//! Backend trait and error types

use async_trait::async_trait;
use brdforge_utils::types::StageId;
use serde_json::Value;

/// Generation backend errors
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Backend misconfiguration: {0}")]
    Misconfiguration(String),

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Provider returned status {status}: {detail}")]
    Provider { status: u16, detail: String },

    #[error("Provider returned an empty response")]
    EmptyResponse,

    #[error("Could not extract a JSON document from the response: {0}")]
    MalformedResponse(String),
}

/// A generation function for pipeline stages.
///
/// Implementations must be safely callable multiple times with the same
/// input: the stage runner re-invokes on validation failure, and no
/// exactly-once guarantee is offered to the backend (at-least-once per
/// attempt).
///
/// A backend may report an internal failure either as `Err` or as an
/// `Ok` payload carrying the reserved `_error` marker; both count as a
/// failed attempt at the validation gate.
#[async_trait]
pub trait StageBackend: Send + Sync {
    /// Produce the artifact document for `stage` from `input`.
    async fn generate(&self, stage: StageId, input: &Value) -> Result<Value, LlmError>;
}
