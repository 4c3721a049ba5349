//! Exit code table
//!
//! Failure kinds map to distinct exit codes so callers can decide
//! whether to retry immediately (lock contention), retry later (stage
//! failure with durable progress), or treat as permanent (input or
//! checkpoint misuse).

use brdforge_engine::PipelineError;

pub const SUCCESS: i32 = 0;
/// Unclassified failure (I/O, parse, configuration).
pub const GENERAL: i32 = 1;
/// The input document or options were rejected before any stage ran.
pub const INPUT: i32 = 2;
/// A checkpoint exists but does not match this call's content.
pub const CHECKPOINT: i32 = 3;
/// A stage exhausted its attempt budget; progress is durable.
pub const STAGE: i32 = 4;
/// A durable write failed; in-memory and on-disk state may disagree.
pub const PERSISTENCE: i32 = 5;
/// Another execution holds the run lock.
pub const LOCK: i32 = 9;

/// Exit code for a pipeline failure.
#[must_use]
pub fn for_pipeline_error(error: &PipelineError) -> i32 {
    match error {
        PipelineError::InvalidInput { .. } => INPUT,
        PipelineError::Lock { .. } => LOCK,
        PipelineError::CheckpointMismatch { .. } => CHECKPOINT,
        PipelineError::Stage { .. } => STAGE,
        PipelineError::Persistence { .. } => PERSISTENCE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brdforge_engine::StageId;

    #[test]
    fn kinds_map_to_distinct_codes() {
        let errors = [
            PipelineError::InvalidInput {
                run_id: "r".into(),
                detail: String::new(),
            },
            PipelineError::CheckpointMismatch {
                run_id: "r".into(),
                detail: String::new(),
            },
            PipelineError::Stage {
                run_id: "r".into(),
                stage: StageId::PocPlan,
                attempts: 1,
                detail: String::new(),
            },
            PipelineError::Persistence {
                run_id: "r".into(),
                detail: String::new(),
            },
        ];
        let mut codes: Vec<i32> = errors.iter().map(for_pipeline_error).collect();
        codes.push(LOCK);
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), 5);
        assert!(!codes.contains(&SUCCESS));
    }
}
