//! brdforge - BRD-to-engineering pipeline with checkpointed, schema-gated stages
//!
//! brdforge turns a business requirements document into five dependent
//! engineering artifacts (engineering plan, schedule estimate, solution
//! architecture, proof-of-concept plan, technology stack recommendation)
//! through a fixed sequence of generation stages. Every stage output is
//! validated against a JSON Schema and retried within a bounded attempt
//! budget; progress is checkpointed atomically after every stage so a
//! crashed run resumes without repeating completed work; concurrent
//! invocations against one store are serialized by an advisory run lock.
//!
//! brdforge can be used in two ways:
//! - **CLI**: `brdforge run --input brd.md --profile team.json`
//! - **Library**: drive [`Pipeline`] directly with your own
//!   [`StageBackend`] implementation
//!
//! # Quick Start (Library)
//!
//! ```rust,no_run
//! use brdforge::{Pipeline, PipelineOptions, backend_from_config, Config};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::discover(None)?;
//! let backend = backend_from_config(&config)?;
//! let options = PipelineOptions::new(config.lock_path(), config.checkpoint_dir());
//!
//! let brd_sections = json!({"schema": "brd_sections_v1", "sections": { /* … */ }});
//! let profile = json!({"team_strengths": {"backend": "Rust"}});
//!
//! let artifacts = Pipeline::new(backend.as_ref())
//!     .execute(&brd_sections, &profile, &options)
//!     .await?;
//! println!("{}", artifacts.tech_stack_recommendations);
//! # Ok(())
//! # }
//! ```
//!
//! # Stable Public API
//!
//! - [`Pipeline`], [`PipelineOptions`], [`RunArtifacts`] - orchestration
//! - [`StageId`] - the fixed stage sequence
//! - [`PipelineError`] - typed failure taxonomy (input / lock /
//!   checkpoint / stage / persistence)
//! - [`Config`] and [`ConfigBuilder`] - configuration
//! - [`StageBackend`] - the generation seam for embedding and testing
//! - [`parse_brd_text`] - BRD free-text parsing

/// Stage pipeline orchestration.
pub use brdforge_engine::{
    Checkpoint, CheckpointManager, Pipeline, PipelineError, PipelineOptions, RunArtifacts,
    RunDebug, RunMetadata, RunStatus, StageRecord, load_profile,
};

/// Stage identifiers in their fixed execution order.
pub use brdforge_utils::types::StageId;

/// Content fingerprinting (JCS canonical form + BLAKE3).
pub use brdforge_utils::{canonical_json, fingerprint};

/// Configuration model and builder.
pub use brdforge_config::{Config, ConfigBuilder, ConfigError};

/// Generation backend seam and the production HTTP backend.
pub use brdforge_llm::{LlmError, OpenAiBackend, StageBackend, backend_from_config};

/// BRD free-text parsing.
pub use brdforge_parser::{ParsedBrd, parse_brd_text};

/// Schema validation gate.
pub use brdforge_schemas::{SchemaError, SchemaId, validate, validate_artifact};

/// Advisory run lock.
pub use brdforge_lock::{LockError, RunLock};

// CLI internals; exposed for white-box testing, not semver-stable.
#[doc(hidden)]
pub mod cli;
