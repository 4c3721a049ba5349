//! End-to-end flows: BRD text through the parser into the pipeline, and
//! concurrent executions against one store.

use brdforge::{Pipeline, PipelineOptions, RunStatus, StageId, parse_brd_text};
use brdforge_engine::CheckpointManager;
use brdforge_llm::test_support::{StubBackend, fixtures};
use camino::Utf8PathBuf;
use tempfile::TempDir;

const BRD_TEXT: &str = "\
# Problem

Manual ticket triage is slow and error prone.

# Objectives

- Reduce triage time
- Improve routing accuracy

# Functional Requirements

- Classify ticket severity
- Route tickets to the right queue

# Non-Functional Requirements

- 99.9% uptime

# Constraints

- Deploy on AWS
";

fn options_in(dir: &TempDir, run_id: &str) -> PipelineOptions {
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    let mut options = PipelineOptions::new(root.join("pipeline.lock"), root.join("checkpoints"));
    options.run_id = Some(run_id.to_string());
    options
}

#[tokio::test]
async fn parsed_brd_flows_through_all_five_stages() {
    let dir = TempDir::new().unwrap();
    let parsed = parse_brd_text(BRD_TEXT);
    assert!(!parsed.needs_fallback);

    let backend = StubBackend::with_valid_fixtures();
    let artifacts = Pipeline::new(&backend)
        .execute(
            &parsed.document,
            &fixtures::valid_profile(),
            &options_in(&dir, "e2e-1"),
        )
        .await
        .unwrap();

    // The result carries the original input document untouched.
    assert_eq!(
        artifacts.brd_sections["sections"]["problem"],
        serde_json::json!("Manual ticket triage is slow and error prone.")
    );

    // The plan and architecture stages saw the parsed sections; the
    // tech-stack stage saw the sections plus the profile strengths.
    assert_eq!(backend.inputs(StageId::EngineeringPlan), vec![parsed.document.clone()]);
    let tech_input = &backend.inputs(StageId::TechStackRecommendations)[0];
    assert_eq!(tech_input["brd_sections"], parsed.document);
    assert_eq!(
        tech_input["org_team_profile"]["team_strengths"]["frontend"],
        serde_json::json!("React")
    );
    assert_eq!(
        tech_input["org_team_profile"]["team_strengths"]["backend"],
        serde_json::json!("Python/FastAPI")
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_executions_serialize_on_the_lock() {
    let dir = TempDir::new().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();

    // Two runs with distinct ids share one lock path. The loser must
    // wait for the winner's release and then complete normally.
    let mut tasks = Vec::new();
    for i in 0..2 {
        let root = root.clone();
        tasks.push(tokio::task::spawn_blocking(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async move {
                let mut options = PipelineOptions::new(
                    root.join("pipeline.lock"),
                    root.join("checkpoints"),
                );
                options.run_id = Some(format!("concurrent-{i}"));
                options.lock_timeout = std::time::Duration::from_secs(10);
                options.lock_poll = std::time::Duration::from_millis(5);

                let backend = StubBackend::with_valid_fixtures();
                Pipeline::new(&backend)
                    .execute(
                        &fixtures::valid_brd_sections(),
                        &fixtures::valid_profile(),
                        &options,
                    )
                    .await
                    .map(|artifacts| artifacts.debug.run.run_id)
            })
        }));
    }

    let mut completed = Vec::new();
    for task in tasks {
        completed.push(task.await.unwrap().expect("both executions should finish"));
    }
    completed.sort();
    assert_eq!(completed, vec!["concurrent-0", "concurrent-1"]);

    // Both checkpoints are durable and uncorrupted.
    let manager = CheckpointManager::new(root.join("checkpoints"));
    for i in 0..2 {
        let checkpoint = manager
            .load(&format!("concurrent-{i}"))
            .unwrap()
            .expect("checkpoint exists");
        assert_eq!(checkpoint.status, RunStatus::Success);
        assert_eq!(checkpoint.stages.len(), 5);
    }
}

#[tokio::test]
async fn profile_strengths_reach_the_tech_stack_stage() {
    // Five populated sections, the canonical profile, fixed valid
    // fixtures everywhere: the tech-stack stage input must carry the
    // profile's strengths verbatim.
    let dir = TempDir::new().unwrap();
    let backend = StubBackend::with_valid_fixtures();
    let artifacts = Pipeline::new(&backend)
        .execute(
            &fixtures::valid_brd_sections(),
            &fixtures::valid_profile(),
            &options_in(&dir, "brief-1"),
        )
        .await
        .unwrap();

    let strengths =
        &backend.inputs(StageId::TechStackRecommendations)[0]["org_team_profile"]["team_strengths"];
    assert!(strengths["frontend"].as_str().unwrap().contains("React"));
    assert!(strengths["backend"].as_str().unwrap().contains("Python/FastAPI"));

    assert_eq!(artifacts.tech_stack_recommendations["recommendation"], "Option A");
    assert_eq!(artifacts.debug.org_team_profile, fixtures::valid_profile());
}
