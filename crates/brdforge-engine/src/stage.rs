//! Stage registry: schema bindings and input selectors
//!
//! The five stages form a fixed table. Each stage knows which schema
//! gates its output and how its input is derived from the accumulated
//! stage state, the original input document, and the org/team profile.
//! Input selectors are pure; retries re-invoke with an identical input.

use brdforge_schemas::SchemaId;
use brdforge_utils::types::StageId;
use serde_json::{Value, json};
use std::collections::BTreeMap;

use crate::checkpoint::StageRecord;

/// Schema that gates `stage`'s output.
#[must_use]
pub const fn schema_for(stage: StageId) -> SchemaId {
    match stage {
        StageId::EngineeringPlan => SchemaId::EngineeringPlan,
        StageId::ScheduleEstimate => SchemaId::ScheduleEstimate,
        StageId::SolutionArchitecture => SchemaId::SolutionArchitecture,
        StageId::PocPlan => SchemaId::PocPlan,
        StageId::TechStackRecommendations => SchemaId::TechStack,
    }
}

/// Derive the input document for `stage`.
///
/// Returns `None` when a dependent stage's record is missing from
/// `state`; callers enforce the no-gaps invariant, so this only fires
/// on a corrupted resume.
#[must_use]
pub fn stage_input(
    stage: StageId,
    state: &BTreeMap<StageId, StageRecord>,
    brd_sections: &Value,
    org_team_profile: &Value,
) -> Option<Value> {
    match stage {
        StageId::EngineeringPlan | StageId::SolutionArchitecture => Some(brd_sections.clone()),
        StageId::ScheduleEstimate => state
            .get(&StageId::EngineeringPlan)
            .map(|record| record.payload.clone()),
        StageId::PocPlan => state
            .get(&StageId::SolutionArchitecture)
            .map(|record| record.payload.clone()),
        StageId::TechStackRecommendations => Some(json!({
            "brd_sections": brd_sections,
            "org_team_profile": org_team_profile,
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(payload: Value) -> StageRecord {
        StageRecord {
            attempts: 1,
            timing_seconds: 0.0,
            payload,
            raw: Value::Null,
        }
    }

    #[test]
    fn independent_stages_receive_the_input_document() {
        let brd = json!({"schema": "brd_sections_v1"});
        let state = BTreeMap::new();
        assert_eq!(
            stage_input(StageId::EngineeringPlan, &state, &brd, &json!({})),
            Some(brd.clone())
        );
        assert_eq!(
            stage_input(StageId::SolutionArchitecture, &state, &brd, &json!({})),
            Some(brd)
        );
    }

    #[test]
    fn dependent_stages_consume_prior_payloads() {
        let mut state = BTreeMap::new();
        state.insert(StageId::EngineeringPlan, record(json!({"phases": ["p1"]})));
        state.insert(
            StageId::SolutionArchitecture,
            record(json!({"components": ["c1"]})),
        );

        assert_eq!(
            stage_input(StageId::ScheduleEstimate, &state, &json!({}), &json!({})),
            Some(json!({"phases": ["p1"]}))
        );
        assert_eq!(
            stage_input(StageId::PocPlan, &state, &json!({}), &json!({})),
            Some(json!({"components": ["c1"]}))
        );
    }

    #[test]
    fn missing_dependency_yields_none() {
        let state = BTreeMap::new();
        assert_eq!(
            stage_input(StageId::ScheduleEstimate, &state, &json!({}), &json!({})),
            None
        );
    }

    #[test]
    fn tech_stack_merges_profile_with_input_document() {
        let brd = json!({"sections": {}});
        let profile = json!({"team_strengths": {"backend": "Rust"}});
        let input =
            stage_input(StageId::TechStackRecommendations, &BTreeMap::new(), &brd, &profile)
                .unwrap();
        assert_eq!(input["brd_sections"], brd);
        assert_eq!(input["org_team_profile"], profile);
    }

    #[test]
    fn every_stage_has_a_schema_binding() {
        for stage in StageId::SEQUENCE {
            // Exercise the mapping; a missing arm would not compile, a
            // wrong one shows up in validation tests downstream.
            let _ = schema_for(stage);
        }
    }
}
