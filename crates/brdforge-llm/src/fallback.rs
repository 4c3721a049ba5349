//! Fallback artifact skeletons
//!
//! When a generation call fails in transport the backend returns the
//! stage's empty skeleton with the `_error` marker attached. The
//! skeletons are deliberately too sparse to satisfy any artifact
//! schema, so a failed call can never complete a stage.

use brdforge_utils::types::StageId;
use serde_json::{Value, json};

/// Empty-shaped artifact document for `stage`.
#[must_use]
pub fn fallback_skeleton(stage: StageId) -> Value {
    match stage {
        StageId::EngineeringPlan => json!({
            "project_overview": "",
            "phases": [],
            "team_composition": [],
            "risks": [],
            "assumptions": [],
        }),
        StageId::ScheduleEstimate => json!({
            "timeline_weeks": 0,
            "phases": [],
            "resource_matrix": [],
            "assumptions": [],
            "notes": [],
        }),
        StageId::SolutionArchitecture => json!({
            "summary": "",
            "components": [],
            "data_flows": [],
            "non_functional_considerations": [],
            "open_questions": [],
        }),
        StageId::PocPlan => json!({
            "poc_goal": "",
            "in_scope_components": [],
            "out_of_scope": [],
            "success_criteria": [],
            "timeline_weeks": 0,
            "risks": [],
        }),
        StageId::TechStackRecommendations => json!({
            "options": [],
            "recommendation": "",
        }),
    }
}
