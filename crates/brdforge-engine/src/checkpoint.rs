//! Run state checkpointing
//!
//! One JSON document per run id, written atomically after construction
//! and after every completed stage. A crash loses at most the in-flight
//! stage. On resume the stored fingerprints are reconciled against the
//! current call's documents, and every cached stage payload is
//! re-validated before it is trusted: a record written by an older
//! schema version or corrupted on disk is rejected, never silently
//! accepted.

use anyhow::Context;
use brdforge_schemas::validate_artifact;
use brdforge_utils::types::StageId;
use brdforge_utils::{read_json, write_json_atomic};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::CheckpointError;
use crate::stage::schema_for;

/// Completed-stage record persisted in a checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    /// Attempts consumed (1-based; never exceeds the budget in effect
    /// when the stage ran).
    pub attempts: u32,
    /// Wall time across all attempts, in seconds.
    pub timing_seconds: f64,
    /// Schema-valid stage output.
    pub payload: Value,
    /// Last unvalidated backend output, kept for audit. Identical to
    /// `payload` on the normal path; validation never mutates.
    pub raw: Value,
}

/// Lifecycle status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
}

/// Durable run state, keyed by run id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub run_id: String,
    pub status: RunStatus,
    pub started_at_utc: DateTime<Utc>,
    pub updated_at_utc: DateTime<Utc>,
    /// Fingerprint of the input document; immutable for the life of the
    /// run id.
    pub brd_fingerprint: String,
    /// Fingerprint of the org/team profile; immutable likewise.
    pub profile_fingerprint: String,
    pub max_attempts: u32,
    pub retry_delay_seconds: f64,
    pub stages: BTreeMap<StageId, StageRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at_utc: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<StageId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_detail: Option<String>,
}

impl Checkpoint {
    /// Reject a checkpoint whose identity does not match the current
    /// call. Resuming a run id with different content is caller error,
    /// never an implicit new run.
    pub fn reconcile(
        &self,
        run_id: &str,
        brd_fingerprint: &str,
        profile_fingerprint: &str,
    ) -> Result<(), CheckpointError> {
        if self.run_id != run_id {
            return Err(CheckpointError::RunIdMismatch {
                found: self.run_id.clone(),
            });
        }
        if self.brd_fingerprint != brd_fingerprint {
            return Err(CheckpointError::FingerprintMismatch {
                which: "BRD",
            });
        }
        if self.profile_fingerprint != profile_fingerprint {
            return Err(CheckpointError::FingerprintMismatch {
                which: "org/team profile",
            });
        }
        Ok(())
    }

    /// Fetch a cached stage record, re-validating its payload against
    /// the stage schema before trusting it.
    pub fn resolve_stage(&self, stage: StageId) -> Result<Option<&StageRecord>, CheckpointError> {
        let Some(record) = self.stages.get(&stage) else {
            return Ok(None);
        };
        if record.attempts < 1 {
            return Err(CheckpointError::StaleStage {
                stage,
                detail: format!("recorded attempts {} is below 1", record.attempts),
            });
        }
        validate_artifact(&record.payload, schema_for(stage)).map_err(|e| {
            CheckpointError::StaleStage {
                stage,
                detail: e.to_string(),
            }
        })?;
        Ok(Some(record))
    }

    /// Cached records for the longest completed prefix of the fixed
    /// sequence. Seeding stops at the first gap so the no-gaps invariant
    /// holds in working state even against a hand-edited checkpoint.
    pub fn completed_prefix(
        &self,
    ) -> Result<BTreeMap<StageId, StageRecord>, CheckpointError> {
        let mut prefix = BTreeMap::new();
        for stage in StageId::SEQUENCE {
            match self.resolve_stage(stage)? {
                Some(record) => {
                    prefix.insert(stage, record.clone());
                }
                None => break,
            }
        }
        Ok(prefix)
    }
}

/// Loads and saves checkpoints on the atomic store.
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    dir: Utf8PathBuf,
}

impl CheckpointManager {
    #[must_use]
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            dir: dir.into(),
        }
    }

    /// Checkpoint file path for `run_id`.
    #[must_use]
    pub fn path_for(&self, run_id: &str) -> Utf8PathBuf {
        self.dir.join(format!("{run_id}.json"))
    }

    /// Load the checkpoint for `run_id`, or `None` when no run with
    /// that id has been persisted.
    pub fn load(&self, run_id: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        let path = self.path_for(run_id);
        let Some(document) = read_json(&path)? else {
            return Ok(None);
        };
        let checkpoint: Checkpoint = serde_json::from_value(document)
            .with_context(|| format!("Checkpoint at {path} has an unrecognized layout"))?;
        Ok(Some(checkpoint))
    }

    /// Persist `checkpoint` atomically.
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let path = self.path_for(&checkpoint.run_id);
        let document = serde_json::to_value(checkpoint)
            .with_context(|| "Checkpoint serialization failed")?;
        write_json_atomic(&path, &document)?;
        debug!(run_id = %checkpoint.run_id, status = ?checkpoint.status, "checkpoint persisted");
        Ok(())
    }
}

/// Validate a caller-supplied run id before it becomes a file name.
pub fn validate_run_id(run_id: &str) -> Result<(), String> {
    if run_id.is_empty() {
        return Err("run id must not be empty".to_string());
    }
    if run_id.len() > 128 {
        return Err(format!("run id exceeds 128 characters ({})", run_id.len()));
    }
    if run_id.starts_with('.') {
        return Err("run id must not start with '.'".to_string());
    }
    if let Some(bad) = run_id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(format!("run id contains unsupported character '{bad}'"));
    }
    Ok(())
}
