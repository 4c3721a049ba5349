//! Generation backend abstraction for brdforge
//!
//! Each pipeline stage is produced by an opaque generation function:
//! one JSON-like input document in, one JSON-like output document out.
//! The orchestrator neither knows nor cares how the output is produced;
//! it only checks the result against the stage's schema.
//!
//! Backends implement [`StageBackend`]. The production backend speaks an
//! OpenAI-compatible chat-completions API over HTTPS; a scripted stub is
//! available behind the `test-utils` feature for deterministic tests.
//!
//! Transport and provider failures surface as payloads carrying the
//! reserved `_error` marker (the fallback skeleton for the stage plus
//! the failure message), so a retry is counted against the stage's
//! attempt budget exactly like a schema miss.

mod fallback;
mod openai_backend;
mod prompts;
mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;

pub use fallback::fallback_skeleton;
pub use openai_backend::OpenAiBackend;
pub use prompts::{PromptLibrary, default_template};
pub use types::{LlmError, StageBackend};

use brdforge_config::Config;

/// Construct the production generation backend from configuration.
///
/// # Errors
/// Returns `LlmError::Misconfiguration` if the HTTP client cannot be
/// built from the configured values.
pub fn backend_from_config(config: &Config) -> Result<Box<dyn StageBackend>, LlmError> {
    Ok(Box::new(OpenAiBackend::new(config)?))
}
