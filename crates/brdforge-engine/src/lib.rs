//! Stage pipeline orchestrator for brdforge
//!
//! The engine owns the part of the system with real invariants: fixed
//! stage sequencing, per-stage input derivation, retry with schema
//! validation, crash-safe checkpointing keyed by content fingerprints,
//! and mutual-exclusion locking across concurrent invocations.
//!
//! Generation itself is a black box behind [`brdforge_llm::StageBackend`]:
//! the engine does not know how a stage produces its output, only that
//! the output either satisfies its schema or the attempt failed.

pub mod checkpoint;
pub mod error;
pub mod pipeline;
pub mod profile;
pub mod runner;
pub mod stage;

pub use checkpoint::{Checkpoint, CheckpointManager, RunStatus, StageRecord};
pub use error::{CheckpointError, PipelineError, StageError};
pub use pipeline::{Pipeline, PipelineOptions, RunArtifacts, RunDebug, RunMetadata};
pub use profile::load_profile;
pub use runner::{StageOutcome, run_stage};
pub use stage::{schema_for, stage_input};

pub use brdforge_utils::types::StageId;
