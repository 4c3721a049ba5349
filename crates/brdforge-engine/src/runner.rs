//! Single-stage execution with retry and validation
//!
//! One stage run is a bounded loop: invoke the generation backend,
//! measure wall time, gate the result through the stage's schema.
//! Retries re-invoke with the same input (no exactly-once guarantee is
//! offered to the backend). Timing accumulates across all attempts, not
//! just the winning one.

use brdforge_llm::StageBackend;
use brdforge_schemas::validate_artifact;
use brdforge_utils::types::StageId;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::error::StageError;
use crate::stage::schema_for;

/// Successful stage execution.
#[derive(Debug, Clone)]
pub struct StageOutcome {
    /// Schema-valid stage output.
    pub payload: Value,
    /// Last raw backend output (audit trail).
    pub raw: Value,
    /// Wall time across all attempts, seconds, rounded to milliseconds.
    pub timing_seconds: f64,
    /// Attempts consumed, 1-based.
    pub attempts: u32,
}

/// Execute one stage with the given attempt budget.
///
/// # Errors
/// [`StageError`] when `max_attempts` invocations all fail the gate;
/// `detail` concatenates every recorded failure for diagnosis.
pub async fn run_stage(
    stage: StageId,
    backend: &dyn StageBackend,
    input: &Value,
    max_attempts: u32,
    retry_delay: Duration,
) -> Result<StageOutcome, StageError> {
    let mut errors: Vec<String> = Vec::new();
    let mut total_seconds = 0.0_f64;
    let mut attempt = 0_u32;

    while attempt < max_attempts {
        attempt += 1;
        let started = Instant::now();
        let generated = backend.generate(stage, input).await;
        total_seconds += started.elapsed().as_secs_f64();

        match generated {
            Ok(raw) => match validate_artifact(&raw, schema_for(stage)) {
                Ok(()) => {
                    info!(%stage, attempt, "stage output accepted");
                    return Ok(StageOutcome {
                        payload: raw.clone(),
                        raw,
                        timing_seconds: round_ms(total_seconds),
                        attempts: attempt,
                    });
                }
                Err(e) => {
                    warn!(%stage, attempt, error = %e, "stage output rejected");
                    errors.push(e.to_string());
                }
            },
            Err(e) => {
                warn!(%stage, attempt, error = %e, "generation call failed");
                errors.push(e.to_string());
            }
        }

        if attempt < max_attempts && !retry_delay.is_zero() {
            tokio::time::sleep(retry_delay).await;
        }
    }

    Err(StageError {
        stage,
        attempts: attempt,
        detail: errors.join(" | "),
    })
}

fn round_ms(seconds: f64) -> f64 {
    (seconds * 1000.0).round() / 1000.0
}
