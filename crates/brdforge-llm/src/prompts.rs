//! Prompt templates for the generation stages
//!
//! Each stage has a built-in template describing the exact JSON shape
//! the model must return. A template directory may override any of them
//! with a `<stage>.prompt.md` file; the stage input is serialized as
//! JSON and appended below the template.

use brdforge_utils::types::StageId;
use camino::Utf8PathBuf;
use serde_json::Value;
use std::fs;
use tracing::debug;

/// Built-in template for `stage`.
#[must_use]
pub fn default_template(stage: StageId) -> &'static str {
    match stage {
        StageId::EngineeringPlan => {
            "You are an engineering planning assistant.\n\
             From the BRD sections below, produce an engineering plan.\n\
             Return JSON only with this structure:\n\
             {\n  \"project_overview\": \"\",\n  \"phases\": [{\"name\": \"\", \"objectives\": [], \"key_deliverables\": [], \"dependencies\": [], \"acceptance_criteria\": []}],\n  \"team_composition\": [{\"role\": \"\", \"count\": 1, \"notes\": \"\"}],\n  \"risks\": [{\"risk\": \"\", \"impact\": \"\", \"mitigation\": \"\"}],\n  \"assumptions\": []\n}\n\
             Rules:\n- At least one phase.\n- Keep strings concise.\n- Do not add extra keys."
        }
        StageId::ScheduleEstimate => {
            "You are a delivery schedule estimator.\n\
             From the engineering plan below, produce a schedule estimate.\n\
             Return JSON only with this structure:\n\
             {\n  \"timeline_weeks\": 1,\n  \"phases\": [{\"name\": \"\", \"duration_weeks\": 1, \"key_activities\": []}],\n  \"resource_matrix\": [{\"role\": \"\", \"count\": 1, \"allocation_percent\": 100}],\n  \"assumptions\": [],\n  \"notes\": []\n}\n\
             Rules:\n- timeline_weeks is the total across phases.\n- Do not add extra keys."
        }
        StageId::SolutionArchitecture => {
            "You are a solution architect.\n\
             From the BRD sections below, produce a solution architecture.\n\
             Return JSON only with this structure:\n\
             {\n  \"summary\": \"\",\n  \"components\": [{\"name\": \"\", \"responsibility\": \"\", \"interfaces\": []}],\n  \"data_flows\": [{\"from\": \"\", \"to\": \"\", \"description\": \"\"}],\n  \"non_functional_considerations\": [],\n  \"open_questions\": []\n}\n\
             Rules:\n- At least one component.\n- Do not add extra keys."
        }
        StageId::PocPlan => {
            "You are a proof-of-concept planner.\n\
             From the solution architecture below, produce a PoC plan.\n\
             Return JSON only with this structure:\n\
             {\n  \"poc_goal\": \"\",\n  \"in_scope_components\": [],\n  \"out_of_scope\": [],\n  \"success_criteria\": [],\n  \"timeline_weeks\": 1,\n  \"risks\": []\n}\n\
             Rules:\n- Scope to the riskiest components.\n- Do not add extra keys."
        }
        StageId::TechStackRecommendations => {
            "You are a technology stack advisor.\n\
             From the BRD sections and the org/team profile below, recommend stacks that fit the team's strengths.\n\
             Return JSON only with this structure:\n\
             {\n  \"options\": [{\"name\": \"\", \"stack\": {\"frontend\": \"\", \"backend\": \"\", \"database\": \"\", \"infra\": \"\", \"observability\": \"\"}, \"pros\": [], \"cons\": [], \"fit_notes\": \"\"}],\n  \"recommendation\": \"\"\n}\n\
             Rules:\n- Prefer technologies named in team_strengths.\n- recommendation names one option.\n- Do not add extra keys."
        }
    }
}

/// Label describing the input document in the user prompt.
const fn input_label(stage: StageId) -> &'static str {
    match stage {
        StageId::EngineeringPlan => "Input BRD sections (JSON)",
        StageId::ScheduleEstimate => "Input engineering plan JSON",
        StageId::SolutionArchitecture => "Input BRD sections",
        StageId::PocPlan => "Input architecture JSON",
        StageId::TechStackRecommendations => "Input BRD sections and org/team profile",
    }
}

/// Template resolution with optional directory overrides.
#[derive(Debug, Clone, Default)]
pub struct PromptLibrary {
    overrides_dir: Option<Utf8PathBuf>,
}

impl PromptLibrary {
    /// Library using only the built-in templates.
    #[must_use]
    pub const fn builtin() -> Self {
        Self {
            overrides_dir: None,
        }
    }

    /// Library that prefers `<dir>/<stage>.prompt.md` when present.
    #[must_use]
    pub const fn with_overrides(dir: Utf8PathBuf) -> Self {
        Self {
            overrides_dir: Some(dir),
        }
    }

    /// Resolve the template text for `stage`.
    #[must_use]
    pub fn template(&self, stage: StageId) -> String {
        if let Some(dir) = &self.overrides_dir {
            let path = dir.join(format!("{stage}.prompt.md"));
            if let Ok(content) = fs::read_to_string(path.as_std_path()) {
                debug!(%stage, path = %path, "using prompt template override");
                return content;
            }
        }
        default_template(stage).to_string()
    }

    /// Assemble the full user prompt for one generation call.
    #[must_use]
    pub fn user_prompt(&self, stage: StageId, input: &Value) -> String {
        format!(
            "{}\n\n{}: {}",
            self.template(stage),
            input_label(stage),
            input
        )
    }
}
