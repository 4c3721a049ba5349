//! Pipeline hardening properties exercised through the library surface.

use brdforge::{
    CheckpointManager, Pipeline, PipelineError, PipelineOptions, RunStatus, SchemaId, StageId,
    fingerprint, validate,
};
use brdforge_llm::test_support::{StubBackend, fixtures};
use camino::Utf8PathBuf;
use serde_json::json;
use tempfile::TempDir;

struct Store {
    _dir: TempDir,
    options: PipelineOptions,
}

fn store(run_id: &str) -> Store {
    let dir = TempDir::new().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    let mut options = PipelineOptions::new(root.join("pipeline.lock"), root.join("checkpoints"));
    options.run_id = Some(run_id.to_string());
    Store {
        _dir: dir,
        options,
    }
}

#[tokio::test]
async fn successful_run_yields_one_conformant_record_per_stage() {
    let backend = StubBackend::with_valid_fixtures();
    let st = store("shape-1");
    let artifacts = Pipeline::new(&backend)
        .execute(
            &fixtures::valid_brd_sections(),
            &fixtures::valid_profile(),
            &st.options,
        )
        .await
        .unwrap();

    let bindings = [
        (StageId::EngineeringPlan, SchemaId::EngineeringPlan),
        (StageId::ScheduleEstimate, SchemaId::ScheduleEstimate),
        (StageId::SolutionArchitecture, SchemaId::SolutionArchitecture),
        (StageId::PocPlan, SchemaId::PocPlan),
        (StageId::TechStackRecommendations, SchemaId::TechStack),
    ];
    for (stage, schema) in bindings {
        validate(artifacts.payload(stage), schema)
            .unwrap_or_else(|e| panic!("{stage} payload violates its schema: {e}"));
        assert!(artifacts.debug.attempts[&stage] >= 1);
        assert!(artifacts.debug.timings_seconds[&stage] >= 0.0);
    }

    let checkpoint = CheckpointManager::new(st.options.checkpoint_dir.clone())
        .load("shape-1")
        .unwrap()
        .unwrap();
    assert_eq!(checkpoint.status, RunStatus::Success);
    assert_eq!(
        checkpoint.stages.keys().copied().collect::<Vec<_>>(),
        StageId::SEQUENCE.to_vec()
    );
}

#[tokio::test]
async fn replay_after_success_makes_zero_generation_calls() {
    let st = store("idempotent-1");
    let first = StubBackend::with_valid_fixtures();
    let pipeline_result = Pipeline::new(&first)
        .execute(
            &fixtures::valid_brd_sections(),
            &fixtures::valid_profile(),
            &st.options,
        )
        .await
        .unwrap();
    assert_eq!(first.total_calls(), 5);

    let second = StubBackend::new();
    let replayed = Pipeline::new(&second)
        .execute(
            &fixtures::valid_brd_sections(),
            &fixtures::valid_profile(),
            &st.options,
        )
        .await
        .unwrap();

    assert_eq!(second.total_calls(), 0);
    assert_eq!(replayed.engineering_plan, pipeline_result.engineering_plan);
    assert_eq!(
        replayed.tech_stack_recommendations,
        pipeline_result.tech_stack_recommendations
    );
}

#[tokio::test]
async fn crash_resume_executes_only_the_remaining_stages() {
    let st = store("crash-1");

    // First process dies at the poc_plan stage: its backend never
    // produces a valid PoC document.
    let dying = StubBackend::with_valid_fixtures().script(StageId::PocPlan, vec![json!({})]);
    let err = Pipeline::new(&dying)
        .execute(
            &fixtures::valid_brd_sections(),
            &fixtures::valid_profile(),
            &st.options,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Stage { .. }));

    let checkpoint = CheckpointManager::new(st.options.checkpoint_dir.clone())
        .load("crash-1")
        .unwrap()
        .unwrap();
    assert_eq!(checkpoint.status, RunStatus::Failed);
    assert_eq!(checkpoint.stages.len(), 3);

    // Restarted process with a healthy backend: stages 1-3 must not be
    // re-invoked.
    let healthy = StubBackend::with_valid_fixtures();
    Pipeline::new(&healthy)
        .execute(
            &fixtures::valid_brd_sections(),
            &fixtures::valid_profile(),
            &st.options,
        )
        .await
        .unwrap();

    for stage in [
        StageId::EngineeringPlan,
        StageId::ScheduleEstimate,
        StageId::SolutionArchitecture,
    ] {
        assert_eq!(healthy.calls(stage), 0, "{stage} was re-invoked on resume");
    }
    assert_eq!(healthy.calls(StageId::PocPlan), 1);
    assert_eq!(healthy.calls(StageId::TechStackRecommendations), 1);
}

#[tokio::test]
async fn fingerprints_are_sensitive_to_any_leaf_change() {
    let original = fixtures::valid_brd_sections();
    let mut changed = original.clone();
    changed["sections"]["objectives"][0] = json!("Reduce triage time by half");
    assert_ne!(fingerprint(&original).unwrap(), fingerprint(&changed).unwrap());

    let st = store("drift-1");
    let backend = StubBackend::with_valid_fixtures();
    Pipeline::new(&backend)
        .execute(&original, &fixtures::valid_profile(), &st.options)
        .await
        .unwrap();

    let err = Pipeline::new(&backend)
        .execute(&changed, &fixtures::valid_profile(), &st.options)
        .await
        .unwrap_err();
    assert!(
        matches!(err, PipelineError::CheckpointMismatch { .. }),
        "changed input must never silently merge into an existing run"
    );
}

#[tokio::test]
async fn retry_budget_is_exact_at_the_boundary() {
    // Conformant output arrives exactly on the last allowed attempt.
    let st = store("budget-1");
    let mut options = st.options.clone();
    options.max_attempts = 3;
    let backend = StubBackend::with_valid_fixtures().script(
        StageId::ScheduleEstimate,
        vec![json!({}), json!({}), fixtures::valid_schedule()],
    );
    let artifacts = Pipeline::new(&backend)
        .execute(
            &fixtures::valid_brd_sections(),
            &fixtures::valid_profile(),
            &options,
        )
        .await
        .unwrap();
    assert_eq!(artifacts.debug.attempts[&StageId::ScheduleEstimate], 3);

    // Never-conformant output fails with attempts == max_attempts.
    let st2 = store("budget-2");
    let mut options = st2.options.clone();
    options.max_attempts = 3;
    let backend = StubBackend::with_valid_fixtures().script(StageId::ScheduleEstimate, vec![json!({})]);
    let err = Pipeline::new(&backend)
        .execute(
            &fixtures::valid_brd_sections(),
            &fixtures::valid_profile(),
            &options,
        )
        .await
        .unwrap_err();
    match err {
        PipelineError::Stage {
            stage, attempts, ..
        } => {
            assert_eq!(stage, StageId::ScheduleEstimate);
            assert_eq!(attempts, 3);
        }
        other => panic!("expected stage failure, got {other:?}"),
    }
}

#[tokio::test]
async fn checkpoint_file_layout_matches_the_contract() {
    let st = store("layout-1");
    let backend = StubBackend::with_valid_fixtures();
    Pipeline::new(&backend)
        .execute(
            &fixtures::valid_brd_sections(),
            &fixtures::valid_profile(),
            &st.options,
        )
        .await
        .unwrap();

    let path = CheckpointManager::new(st.options.checkpoint_dir.clone()).path_for("layout-1");
    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(path.as_std_path()).unwrap()).unwrap();

    for key in [
        "run_id",
        "status",
        "started_at_utc",
        "updated_at_utc",
        "brd_fingerprint",
        "profile_fingerprint",
        "max_attempts",
        "retry_delay_seconds",
        "stages",
    ] {
        assert!(raw.get(key).is_some(), "checkpoint missing '{key}'");
    }
    assert_eq!(raw["status"], "success");
    let plan = &raw["stages"]["engineering_plan"];
    for key in ["attempts", "timing_seconds", "payload", "raw"] {
        assert!(plan.get(key).is_some(), "stage record missing '{key}'");
    }
    assert_eq!(
        raw["brd_fingerprint"].as_str().unwrap(),
        fingerprint(&fixtures::valid_brd_sections()).unwrap()
    );
}
