//! Error taxonomy for the pipeline engine
//!
//! Failures are distinguishable by kind so a caller can decide whether
//! to retry immediately (lock contention), retry later (transient stage
//! failure with durable progress), or treat as permanent (input or
//! checkpoint misuse). Nothing escapes as a bare untyped error.

use brdforge_lock::LockError;
use brdforge_utils::types::StageId;

/// A stage exhausted its attempt budget without producing
/// schema-conformant output.
#[derive(Debug, thiserror::Error)]
#[error("Stage '{stage}' failed after {attempts} attempt(s): {detail}")]
pub struct StageError {
    /// The failing stage.
    pub stage: StageId,
    /// Attempts consumed (equals the budget in effect).
    pub attempts: u32,
    /// Concatenation of every recorded validation failure.
    pub detail: String,
}

/// Checkpoint loading and persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("Checkpoint run_id mismatch: stored checkpoint belongs to '{found}'")]
    RunIdMismatch { found: String },

    #[error("Checkpoint {which} fingerprint mismatch for run_id")]
    FingerprintMismatch { which: &'static str },

    #[error("Checkpoint stage '{stage}' cannot be trusted: {detail}")]
    StaleStage { stage: StageId, detail: String },

    #[error("Checkpoint storage failure: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Top-level pipeline execution failure, tagged with the run it belongs
/// to and the kind of fault.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("run_id={run_id} stage=input detail={detail}")]
    InvalidInput { run_id: String, detail: String },

    #[error("run_id={run_id} stage=lock detail={source}")]
    Lock {
        run_id: String,
        #[source]
        source: LockError,
    },

    #[error("run_id={run_id} stage=checkpoint detail={detail}")]
    CheckpointMismatch { run_id: String, detail: String },

    #[error("run_id={run_id} stage={stage} attempts={attempts} detail={detail}")]
    Stage {
        run_id: String,
        stage: StageId,
        attempts: u32,
        detail: String,
    },

    #[error("run_id={run_id} stage=persistence detail={detail}")]
    Persistence { run_id: String, detail: String },
}

impl PipelineError {
    /// The run this failure belongs to.
    #[must_use]
    pub fn run_id(&self) -> &str {
        match self {
            Self::InvalidInput { run_id, .. }
            | Self::Lock { run_id, .. }
            | Self::CheckpointMismatch { run_id, .. }
            | Self::Stage { run_id, .. }
            | Self::Persistence { run_id, .. } => run_id,
        }
    }

    /// Stable kind tag for exit-code mapping and telemetry.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "input",
            Self::Lock { .. } => "lock",
            Self::CheckpointMismatch { .. } => "checkpoint",
            Self::Stage { .. } => "stage",
            Self::Persistence { .. } => "persistence",
        }
    }
}
