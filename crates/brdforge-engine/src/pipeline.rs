//! Pipeline orchestration
//!
//! Top-level controller for one run: acquires the run lock, loads or
//! initializes the checkpoint, walks the fixed stage sequence deriving
//! each stage's input from prior outputs, and persists progress after
//! every stage. Stage execution is strictly sequential; stage *k+1*'s
//! input is defined in terms of stage *k*'s output for the dependent
//! stages, so there is no reordering and no parallelism.
//!
//! Durability discipline: one atomic checkpoint write after
//! construction and after every completed stage, never batched. A crash
//! at any point loses at most the in-flight stage; a later invocation
//! with the same run id and identical inputs resumes from the first
//! incomplete stage. A run that already finished replays its cached
//! result with zero generation calls.

use brdforge_llm::StageBackend;
use brdforge_lock::RunLock;
use brdforge_schemas::{SchemaId, validate};
use brdforge_utils::fingerprint;
use brdforge_utils::types::StageId;
use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

use crate::checkpoint::{
    Checkpoint, CheckpointManager, RunStatus, StageRecord, validate_run_id,
};
use crate::error::PipelineError;
use crate::runner::run_stage;
use crate::stage::stage_input;

/// Execution options for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Caller-supplied run id; a fresh UUID is generated when absent.
    pub run_id: Option<String>,
    /// Per-stage attempt budget (must be ≥ 1).
    pub max_attempts: u32,
    /// Delay between retry attempts.
    pub retry_delay: Duration,
    /// Lock file guarding the checkpoint store. One lock path per
    /// logical store; the lock cannot relate two different paths.
    pub lock_path: Utf8PathBuf,
    /// Directory holding one checkpoint document per run id.
    pub checkpoint_dir: Utf8PathBuf,
    /// Bounded wait for the run lock.
    pub lock_timeout: Duration,
    /// Poll interval while waiting for the run lock.
    pub lock_poll: Duration,
    /// Disable locking for single-caller embedding scenarios.
    pub lock_enabled: bool,
    /// Resume from an existing checkpoint when one matches.
    pub resume: bool,
}

impl PipelineOptions {
    /// Options with the default retry and locking policy.
    #[must_use]
    pub fn new(lock_path: impl Into<Utf8PathBuf>, checkpoint_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            run_id: None,
            max_attempts: 2,
            retry_delay: Duration::ZERO,
            lock_path: lock_path.into(),
            checkpoint_dir: checkpoint_dir.into(),
            lock_timeout: Duration::from_secs(30),
            lock_poll: Duration::from_millis(100),
            lock_enabled: true,
            resume: true,
        }
    }
}

/// Run metadata included in the debug bundle.
#[derive(Debug, Clone, Serialize)]
pub struct RunMetadata {
    pub run_id: String,
    pub status: RunStatus,
    pub started_at_utc: DateTime<Utc>,
    pub completed_at_utc: DateTime<Utc>,
    pub max_attempts: u32,
    pub retry_delay_seconds: f64,
}

/// Debug bundle: audit data a presentation layer may surface but never
/// needs for correctness.
#[derive(Debug, Clone, Serialize)]
pub struct RunDebug {
    /// Last raw backend output per stage.
    pub raw: BTreeMap<StageId, Value>,
    /// Wall time per stage, seconds.
    pub timings_seconds: BTreeMap<StageId, f64>,
    /// Attempts consumed per stage.
    pub attempts: BTreeMap<StageId, u32>,
    /// The org/team profile the run consumed.
    pub org_team_profile: Value,
    pub run: RunMetadata,
}

/// Aggregated result of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct RunArtifacts {
    pub brd_sections: Value,
    pub engineering_plan: Value,
    pub schedule_estimate: Value,
    pub solution_architecture: Value,
    pub poc_plan: Value,
    pub tech_stack_recommendations: Value,
    #[serde(rename = "_debug")]
    pub debug: RunDebug,
}

impl RunArtifacts {
    /// Validated payload for `stage`.
    #[must_use]
    pub fn payload(&self, stage: StageId) -> &Value {
        match stage {
            StageId::EngineeringPlan => &self.engineering_plan,
            StageId::ScheduleEstimate => &self.schedule_estimate,
            StageId::SolutionArchitecture => &self.solution_architecture,
            StageId::PocPlan => &self.poc_plan,
            StageId::TechStackRecommendations => &self.tech_stack_recommendations,
        }
    }
}

/// Stage pipeline orchestrator.
///
/// Holds only the generation backend; everything else arrives through
/// [`PipelineOptions`], so tests substitute a scripted backend and a
/// temp-dir store without touching ambient state.
pub struct Pipeline<'a> {
    backend: &'a dyn StageBackend,
}

impl<'a> Pipeline<'a> {
    #[must_use]
    pub const fn new(backend: &'a dyn StageBackend) -> Self {
        Self {
            backend,
        }
    }

    /// Execute (or resume) one pipeline run.
    ///
    /// # Errors
    /// A [`PipelineError`] tagged with the run id and the failing
    /// concern; see the error taxonomy for retryability.
    pub async fn execute(
        &self,
        brd_sections: &Value,
        org_team_profile: &Value,
        options: &PipelineOptions,
    ) -> Result<RunArtifacts, PipelineError> {
        let run_id = options
            .run_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let invalid_input = |detail: String| PipelineError::InvalidInput {
            run_id: run_id.clone(),
            detail,
        };

        if options.max_attempts < 1 {
            return Err(invalid_input("max_attempts must be >= 1".to_string()));
        }
        validate_run_id(&run_id).map_err(&invalid_input)?;
        // Fail fast on malformed input: no lock, no checkpoint, no
        // partial pipeline.
        validate(brd_sections, SchemaId::BrdSections)
            .map_err(|e| invalid_input(e.to_string()))?;
        validate(org_team_profile, SchemaId::OrgTeamProfile)
            .map_err(|e| invalid_input(e.to_string()))?;

        let _lock = if options.lock_enabled {
            Some(
                RunLock::acquire(
                    &options.lock_path,
                    &run_id,
                    options.lock_timeout,
                    options.lock_poll,
                )
                .map_err(|source| PipelineError::Lock {
                    run_id: run_id.clone(),
                    source,
                })?,
            )
        } else {
            None
        };

        let brd_fp = fingerprint(brd_sections).map_err(|e| invalid_input(e.to_string()))?;
        let profile_fp =
            fingerprint(org_team_profile).map_err(|e| invalid_input(e.to_string()))?;

        let manager = CheckpointManager::new(options.checkpoint_dir.clone());
        let mut started_at_utc = Utc::now();
        let mut state: BTreeMap<StageId, StageRecord> = BTreeMap::new();

        if options.resume {
            let loaded = manager.load(&run_id).map_err(|e| {
                PipelineError::CheckpointMismatch {
                    run_id: run_id.clone(),
                    detail: e.to_string(),
                }
            })?;
            if let Some(existing) = loaded {
                existing
                    .reconcile(&run_id, &brd_fp, &profile_fp)
                    .and_then(|()| existing.completed_prefix())
                    .map_err(|e| PipelineError::CheckpointMismatch {
                        run_id: run_id.clone(),
                        detail: e.to_string(),
                    })
                    .map(|prefix| {
                        started_at_utc = existing.started_at_utc;
                        state = prefix;
                    })?;
                info!(
                    %run_id,
                    cached_stages = state.len(),
                    "resuming from checkpoint"
                );
            }
        }

        let mut checkpoint = Checkpoint {
            run_id: run_id.clone(),
            status: RunStatus::Running,
            started_at_utc,
            updated_at_utc: Utc::now(),
            brd_fingerprint: brd_fp,
            profile_fingerprint: profile_fp,
            max_attempts: options.max_attempts,
            retry_delay_seconds: options.retry_delay.as_secs_f64(),
            stages: state,
            completed_at_utc: None,
            failed_stage: None,
            failed_attempts: None,
            failure_detail: None,
        };
        // A crash between here and the first stage still leaves a
        // recoverable `running` checkpoint behind.
        Self::persist(&manager, &checkpoint, &run_id)?;

        for stage in StageId::SEQUENCE {
            if checkpoint.stages.contains_key(&stage) {
                debug!(%run_id, %stage, "stage already completed; skipping");
                continue;
            }

            let input = stage_input(stage, &checkpoint.stages, brd_sections, org_team_profile)
                .ok_or_else(|| PipelineError::CheckpointMismatch {
                    run_id: run_id.clone(),
                    detail: format!("stage '{stage}' is missing its dependency record"),
                })?;

            match run_stage(
                stage,
                self.backend,
                &input,
                options.max_attempts,
                options.retry_delay,
            )
            .await
            {
                Ok(outcome) => {
                    checkpoint.stages.insert(
                        stage,
                        StageRecord {
                            attempts: outcome.attempts,
                            timing_seconds: outcome.timing_seconds,
                            payload: outcome.payload,
                            raw: outcome.raw,
                        },
                    );
                    checkpoint.updated_at_utc = Utc::now();
                    Self::persist(&manager, &checkpoint, &run_id)?;
                    info!(
                        %run_id,
                        %stage,
                        attempts = outcome.attempts,
                        seconds = outcome.timing_seconds,
                        "stage completed"
                    );
                }
                Err(stage_error) => {
                    checkpoint.status = RunStatus::Failed;
                    checkpoint.failed_stage = Some(stage_error.stage);
                    checkpoint.failed_attempts = Some(stage_error.attempts);
                    checkpoint.failure_detail = Some(stage_error.detail.clone());
                    checkpoint.updated_at_utc = Utc::now();
                    Self::persist(&manager, &checkpoint, &run_id)?;
                    return Err(PipelineError::Stage {
                        run_id,
                        stage: stage_error.stage,
                        attempts: stage_error.attempts,
                        detail: stage_error.detail,
                    });
                }
            }
        }

        let completed_at_utc = Utc::now();
        checkpoint.status = RunStatus::Success;
        checkpoint.completed_at_utc = Some(completed_at_utc);
        checkpoint.updated_at_utc = completed_at_utc;
        Self::persist(&manager, &checkpoint, &run_id)?;

        Ok(Self::assemble(
            brd_sections,
            org_team_profile,
            &checkpoint,
            completed_at_utc,
            options,
        ))
    }

    fn persist(
        manager: &CheckpointManager,
        checkpoint: &Checkpoint,
        run_id: &str,
    ) -> Result<(), PipelineError> {
        manager
            .save(checkpoint)
            .map_err(|e| PipelineError::Persistence {
                run_id: run_id.to_string(),
                detail: e.to_string(),
            })
    }

    fn assemble(
        brd_sections: &Value,
        org_team_profile: &Value,
        checkpoint: &Checkpoint,
        completed_at_utc: DateTime<Utc>,
        options: &PipelineOptions,
    ) -> RunArtifacts {
        let payload =
            |stage: StageId| checkpoint.stages[&stage].payload.clone();
        let mut raw = BTreeMap::new();
        let mut timings_seconds = BTreeMap::new();
        let mut attempts = BTreeMap::new();
        for stage in StageId::SEQUENCE {
            let record = &checkpoint.stages[&stage];
            raw.insert(stage, record.raw.clone());
            timings_seconds.insert(stage, record.timing_seconds);
            attempts.insert(stage, record.attempts);
        }

        RunArtifacts {
            brd_sections: brd_sections.clone(),
            engineering_plan: payload(StageId::EngineeringPlan),
            schedule_estimate: payload(StageId::ScheduleEstimate),
            solution_architecture: payload(StageId::SolutionArchitecture),
            poc_plan: payload(StageId::PocPlan),
            tech_stack_recommendations: payload(StageId::TechStackRecommendations),
            debug: RunDebug {
                raw,
                timings_seconds,
                attempts,
                org_team_profile: org_team_profile.clone(),
                run: RunMetadata {
                    run_id: checkpoint.run_id.clone(),
                    status: RunStatus::Success,
                    started_at_utc: checkpoint.started_at_utc,
                    completed_at_utc,
                    max_attempts: options.max_attempts,
                    retry_delay_seconds: options.retry_delay.as_secs_f64(),
                },
            },
        }
    }
}
