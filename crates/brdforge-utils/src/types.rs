//! Core identifiers shared across the workspace

use serde::{Deserialize, Serialize};

/// Stage identifiers for the artifact generation pipeline.
///
/// Stages execute in a fixed total order; the dependent stages consume
/// the previous stage's output, the rest derive from the input document:
///
/// ```text
/// EngineeringPlan → ScheduleEstimate → SolutionArchitecture → PocPlan → TechStackRecommendations
/// ```
///
/// - `ScheduleEstimate` consumes the engineering plan payload
/// - `PocPlan` consumes the solution architecture payload
/// - `TechStackRecommendations` additionally merges the org/team profile
///
/// Serializes to its wire name (e.g. `"engineering_plan"`), which is
/// also the key used in checkpoints and results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    /// Engineering plan derived from the BRD sections.
    EngineeringPlan,
    /// Schedule estimate derived from the engineering plan.
    ScheduleEstimate,
    /// Solution architecture derived from the BRD sections.
    SolutionArchitecture,
    /// Proof-of-concept plan derived from the architecture.
    PocPlan,
    /// Technology stack recommendation derived from the BRD sections
    /// and the org/team profile.
    TechStackRecommendations,
}

impl StageId {
    /// The fixed execution order. Stage *k+1* may depend on stage *k*'s
    /// output, so this sequence is total and never reordered.
    pub const SEQUENCE: [Self; 5] = [
        Self::EngineeringPlan,
        Self::ScheduleEstimate,
        Self::SolutionArchitecture,
        Self::PocPlan,
        Self::TechStackRecommendations,
    ];

    /// Canonical wire name used in checkpoints, results, and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::EngineeringPlan => "engineering_plan",
            Self::ScheduleEstimate => "schedule_estimate",
            Self::SolutionArchitecture => "solution_architecture",
            Self::PocPlan => "poc_plan",
            Self::TechStackRecommendations => "tech_stack_recommendations",
        }
    }
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StageId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::SEQUENCE
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| format!("unknown stage name '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_total_and_ordered() {
        assert_eq!(StageId::SEQUENCE.len(), 5);
        assert_eq!(StageId::SEQUENCE[0], StageId::EngineeringPlan);
        assert_eq!(StageId::SEQUENCE[4], StageId::TechStackRecommendations);
    }

    #[test]
    fn wire_names_round_trip() {
        for stage in StageId::SEQUENCE {
            assert_eq!(stage.as_str().parse::<StageId>().unwrap(), stage);
        }
        assert!("not_a_stage".parse::<StageId>().is_err());
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&StageId::TechStackRecommendations).unwrap();
        assert_eq!(json, "\"tech_stack_recommendations\"");
        let parsed: StageId = serde_json::from_str("\"poc_plan\"").unwrap();
        assert_eq!(parsed, StageId::PocPlan);
    }

    #[test]
    fn stage_ids_work_as_json_map_keys() {
        use std::collections::BTreeMap;
        let map: BTreeMap<StageId, u32> = [(StageId::EngineeringPlan, 1)].into();
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"engineering_plan":1}"#);
    }
}
