//! Command implementations

use brdforge_engine::{
    CheckpointManager, Pipeline, PipelineError, PipelineOptions, load_profile,
};
use brdforge_lock::RunLock;
use brdforge_utils::canonical_json;
use camino::Utf8PathBuf;
use serde_json::json;
use std::fs;
use std::time::Duration;
use tracing::warn;

use super::exit_codes;

pub struct RunArgs {
    pub input: Utf8PathBuf,
    pub output: Utf8PathBuf,
    pub profile: Utf8PathBuf,
    pub run_id: Option<String>,
    pub max_attempts: Option<u32>,
    pub retry_delay: Option<f64>,
    pub no_lock: bool,
    pub no_resume: bool,
}

/// `brdforge run`: parse the BRD, execute the pipeline, write the
/// aggregated artifacts.
pub fn run_pipeline(config: &brdforge_config::Config, args: &RunArgs) -> Result<(), i32> {
    let text = fs::read_to_string(args.input.as_std_path()).map_err(|e| {
        eprintln!("Error: failed to read BRD input {}: {e}", args.input);
        exit_codes::GENERAL
    })?;

    let parsed = brdforge_parser::parse_brd_text(&text);
    if parsed.needs_fallback {
        warn!(
            input = %args.input,
            "BRD text looks unstructured; fewer than two sections were populated"
        );
    }

    let profile = load_profile(&args.profile).map_err(|e| {
        eprintln!("Error: {e:#}");
        exit_codes::GENERAL
    })?;

    let backend = brdforge_llm::backend_from_config(config).map_err(|e| {
        eprintln!("Error: {e}");
        exit_codes::GENERAL
    })?;

    let mut options = PipelineOptions::new(config.lock_path(), config.checkpoint_dir());
    options.run_id = args.run_id.clone();
    options.max_attempts = args.max_attempts.unwrap_or(config.max_attempts);
    options.retry_delay = Duration::from_secs_f64(
        args.retry_delay.unwrap_or(config.retry_delay_seconds).max(0.0),
    );
    options.lock_timeout = Duration::from_secs_f64(config.lock_timeout_seconds.max(0.0));
    options.lock_poll = Duration::from_secs_f64(config.lock_poll_seconds.max(0.001));
    options.lock_enabled = !args.no_lock;
    options.resume = !args.no_resume;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| {
            eprintln!("Error: failed to start async runtime: {e}");
            exit_codes::GENERAL
        })?;

    let artifacts = runtime
        .block_on(Pipeline::new(backend.as_ref()).execute(&parsed.document, &profile, &options))
        .map_err(|e| report_pipeline_error(&e))?;

    let rendered = serde_json::to_string_pretty(&artifacts).map_err(|e| {
        eprintln!("Error: failed to serialize artifacts: {e}");
        exit_codes::GENERAL
    })?;
    fs::write(args.output.as_std_path(), rendered).map_err(|e| {
        eprintln!("Error: failed to write {}: {e}", args.output);
        exit_codes::GENERAL
    })?;

    println!("Wrote output to {}", args.output);
    Ok(())
}

fn report_pipeline_error(error: &PipelineError) -> i32 {
    eprintln!("Error: pipeline execution failed: {error}");
    match error {
        PipelineError::Lock { .. } => {
            eprintln!("Another execution holds the lock; retry once it finishes.");
        }
        PipelineError::Stage { run_id, .. } => {
            eprintln!("Completed stages are checkpointed; rerun with --run-id {run_id} to resume.");
        }
        PipelineError::CheckpointMismatch { run_id, .. } => {
            eprintln!(
                "Run id '{run_id}' was already used with different content; pick a new run id."
            );
        }
        _ => {}
    }
    exit_codes::for_pipeline_error(error)
}

/// `brdforge status`: print a checkpoint summary as canonical JSON.
pub fn status(config: &brdforge_config::Config, run_id: &str) -> Result<(), i32> {
    let manager = CheckpointManager::new(config.checkpoint_dir());
    let checkpoint = manager
        .load(run_id)
        .map_err(|e| {
            eprintln!("Error: {e}");
            exit_codes::GENERAL
        })?
        .ok_or_else(|| {
            eprintln!("Error: no checkpoint found for run '{run_id}'");
            exit_codes::GENERAL
        })?;

    let stages: serde_json::Map<String, serde_json::Value> = checkpoint
        .stages
        .iter()
        .map(|(stage, record)| {
            (
                stage.to_string(),
                json!({
                    "attempts": record.attempts,
                    "timing_seconds": record.timing_seconds,
                }),
            )
        })
        .collect();

    let summary = json!({
        "run_id": checkpoint.run_id,
        "status": checkpoint.status,
        "started_at_utc": checkpoint.started_at_utc,
        "updated_at_utc": checkpoint.updated_at_utc,
        "completed_at_utc": checkpoint.completed_at_utc,
        "max_attempts": checkpoint.max_attempts,
        "retry_delay_seconds": checkpoint.retry_delay_seconds,
        "stages": stages,
        "failed_stage": checkpoint.failed_stage,
        "failed_attempts": checkpoint.failed_attempts,
        "failure_detail": checkpoint.failure_detail,
    });

    let rendered = canonical_json(&summary).map_err(|e| {
        eprintln!("Error: {e}");
        exit_codes::GENERAL
    })?;
    println!("{rendered}");
    Ok(())
}

/// `brdforge clean`: remove a checkpoint and/or the lock marker.
pub fn clean(
    config: &brdforge_config::Config,
    run_id: Option<&str>,
    lock: bool,
    force: bool,
) -> Result<(), i32> {
    if run_id.is_none() && !lock {
        eprintln!("Error: nothing to clean; pass --run-id and/or --lock");
        return Err(exit_codes::GENERAL);
    }

    let lock_path = config.lock_path();
    // Removing state out from under a live run corrupts it; refuse
    // unless forced.
    RunLock::can_clean(&lock_path, force).map_err(|e| {
        eprintln!("Error: {e}");
        exit_codes::LOCK
    })?;

    if let Some(run_id) = run_id {
        let manager = CheckpointManager::new(config.checkpoint_dir());
        let path = manager.path_for(run_id);
        match fs::remove_file(path.as_std_path()) {
            Ok(()) => println!("Removed checkpoint for run '{run_id}'"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                println!("No checkpoint for run '{run_id}'");
            }
            Err(e) => {
                eprintln!("Error: failed to remove checkpoint for run '{run_id}': {e}");
                return Err(exit_codes::GENERAL);
            }
        }
    }

    if lock {
        RunLock::force_remove(&lock_path).map_err(|e| {
            eprintln!("Error: {e}");
            exit_codes::GENERAL
        })?;
        println!("Removed lock marker at {lock_path}");
    }

    Ok(())
}
