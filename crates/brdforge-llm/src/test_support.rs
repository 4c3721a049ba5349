//! Scripted stub backend and artifact fixtures
//!
//! Deterministic substitute for the HTTP backend: each stage is given a
//! script of responses played back in order (the last entry repeats once
//! the script is exhausted). Invocations and their inputs are recorded
//! so tests can assert call counts and input routing.

use async_trait::async_trait;
use brdforge_utils::types::StageId;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::types::{LlmError, StageBackend};

#[derive(Default)]
struct StubState {
    scripts: HashMap<StageId, Vec<Value>>,
    calls: HashMap<StageId, u32>,
    inputs: HashMap<StageId, Vec<Value>>,
}

/// Scripted generation backend for tests and dry runs.
pub struct StubBackend {
    state: Mutex<StubState>,
}

impl StubBackend {
    /// Backend with no scripts; every call returns an error-marker
    /// payload.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StubState::default()),
        }
    }

    /// Backend scripted with one valid fixture per stage.
    #[must_use]
    pub fn with_valid_fixtures() -> Self {
        Self::new()
            .script(StageId::EngineeringPlan, vec![fixtures::valid_plan()])
            .script(StageId::ScheduleEstimate, vec![fixtures::valid_schedule()])
            .script(StageId::SolutionArchitecture, vec![fixtures::valid_architecture()])
            .script(StageId::PocPlan, vec![fixtures::valid_poc()])
            .script(
                StageId::TechStackRecommendations,
                vec![fixtures::valid_tech_stack()],
            )
    }

    /// Replace the response script for one stage.
    #[must_use]
    pub fn script(self, stage: StageId, responses: Vec<Value>) -> Self {
        self.state
            .lock()
            .expect("stub state poisoned")
            .scripts
            .insert(stage, responses);
        self
    }

    /// Number of invocations recorded for `stage`.
    #[must_use]
    pub fn calls(&self, stage: StageId) -> u32 {
        *self
            .state
            .lock()
            .expect("stub state poisoned")
            .calls
            .get(&stage)
            .unwrap_or(&0)
    }

    /// Total invocations across all stages.
    #[must_use]
    pub fn total_calls(&self) -> u32 {
        self.state
            .lock()
            .expect("stub state poisoned")
            .calls
            .values()
            .sum()
    }

    /// Inputs recorded for `stage`, in invocation order.
    #[must_use]
    pub fn inputs(&self, stage: StageId) -> Vec<Value> {
        self.state
            .lock()
            .expect("stub state poisoned")
            .inputs
            .get(&stage)
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StageBackend for StubBackend {
    async fn generate(&self, stage: StageId, input: &Value) -> Result<Value, LlmError> {
        let mut state = self.state.lock().expect("stub state poisoned");
        let call_index = *state.calls.get(&stage).unwrap_or(&0);
        state.calls.insert(stage, call_index + 1);
        state.inputs.entry(stage).or_default().push(input.clone());

        let response = state.scripts.get(&stage).and_then(|script| {
            if script.is_empty() {
                None
            } else {
                Some(script[(call_index as usize).min(script.len() - 1)].clone())
            }
        });

        Ok(response.unwrap_or_else(|| {
            let mut payload = crate::fallback::fallback_skeleton(stage);
            if let Some(map) = payload.as_object_mut() {
                map.insert(
                    "_error".to_string(),
                    Value::String(format!("no scripted response for stage '{stage}'")),
                );
            }
            payload
        }))
    }
}

/// Known-good artifact documents used across the test suites.
pub mod fixtures {
    use super::{Value, json};

    #[must_use]
    pub fn valid_brd_sections() -> Value {
        json!({
            "schema": "brd_sections_v1",
            "sections": {
                "problem": "Manual ticket triage is slow.",
                "objectives": ["Reduce triage time"],
                "functional_requirements": ["Classify severity"],
                "non_functional_requirements": ["99.9% uptime"],
                "constraints": ["Deploy on AWS"],
                "dependencies": [],
                "assumptions": []
            }
        })
    }

    #[must_use]
    pub fn valid_plan() -> Value {
        json!({
            "project_overview": "Automate ticket triage.",
            "phases": [{
                "name": "Phase 1",
                "objectives": ["Ship MVP"],
                "key_deliverables": ["Prototype"],
                "dependencies": [],
                "acceptance_criteria": ["Reviewed"]
            }],
            "team_composition": [{"role": "Engineer", "count": 1, "notes": "Builds MVP"}],
            "risks": [{"risk": "API outage", "impact": "Delay", "mitigation": "Retries"}],
            "assumptions": []
        })
    }

    #[must_use]
    pub fn valid_schedule() -> Value {
        json!({
            "timeline_weeks": 4,
            "phases": [{"name": "Phase 1", "duration_weeks": 4, "key_activities": ["Build"]}],
            "resource_matrix": [{"role": "Engineer", "count": 1, "allocation_percent": 100}],
            "assumptions": [],
            "notes": []
        })
    }

    #[must_use]
    pub fn valid_architecture() -> Value {
        json!({
            "summary": "Simple service architecture.",
            "components": [{
                "name": "Classifier",
                "responsibility": "Classify tickets",
                "interfaces": ["API"]
            }],
            "data_flows": [{"from": "Input", "to": "Classifier", "description": "Forward ticket"}],
            "non_functional_considerations": ["99.9% uptime"],
            "open_questions": []
        })
    }

    #[must_use]
    pub fn valid_poc() -> Value {
        json!({
            "poc_goal": "Validate basic ticket routing.",
            "in_scope_components": ["Classifier"],
            "out_of_scope": [],
            "success_criteria": ["Routes tickets correctly"],
            "timeline_weeks": 2,
            "risks": ["Limited sample size"]
        })
    }

    #[must_use]
    pub fn valid_tech_stack() -> Value {
        json!({
            "options": [{
                "name": "Option A",
                "stack": {
                    "frontend": "React",
                    "backend": "FastAPI",
                    "database": "PostgreSQL",
                    "infra": "AWS",
                    "observability": "CloudWatch"
                },
                "pros": ["Fast"],
                "cons": ["Learning curve"],
                "fit_notes": "Good default."
            }],
            "recommendation": "Option A"
        })
    }

    #[must_use]
    pub fn valid_profile() -> Value {
        json!({
            "team_strengths": {
                "frontend": "React",
                "backend": "Python/FastAPI"
            }
        })
    }
}
