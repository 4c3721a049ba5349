//! Artifact JSON Schemas and the conformance gate
//!
//! Every document that crosses a pipeline boundary is validated here:
//! the input BRD sections before any stage runs, each stage's output
//! before it is recorded, and checkpointed payloads before they are
//! trusted on resume. Schemas are embedded at compile time and compiled
//! once per process.
//!
//! Validation fails closed: a document carrying the reserved error
//! marker is rejected before schema evaluation, and a payload is either
//! schema-valid or the stage failed. There is no defaulting path that
//! lets a malformed document through.

use jsonschema::{Draft, Validator};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Reserved key a generation backend uses to signal an internal error.
pub const ERROR_MARKER_KEY: &str = "_error";

/// Identifiers for the embedded schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SchemaId {
    /// Parsed BRD sections (pipeline input)
    BrdSections,
    /// Engineering plan artifact
    EngineeringPlan,
    /// Schedule estimate artifact
    ScheduleEstimate,
    /// Solution architecture artifact
    SolutionArchitecture,
    /// Proof-of-concept plan artifact
    PocPlan,
    /// Technology stack recommendation artifact
    TechStack,
    /// Org/team capability profile (auxiliary input)
    OrgTeamProfile,
}

impl SchemaId {
    /// Canonical schema file name, as recorded in diagnostics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BrdSections => "brd_sections.schema.json",
            Self::EngineeringPlan => "engineering_plan.schema.json",
            Self::ScheduleEstimate => "schedule_estimate.schema.json",
            Self::SolutionArchitecture => "solution_architecture.schema.json",
            Self::PocPlan => "poc_plan.schema.json",
            Self::TechStack => "tech_stack.schema.json",
            Self::OrgTeamProfile => "org_team_profile.schema.json",
        }
    }

    const fn source(&self) -> &'static str {
        match self {
            Self::BrdSections => include_str!("../schemas/brd_sections.schema.json"),
            Self::EngineeringPlan => include_str!("../schemas/engineering_plan.schema.json"),
            Self::ScheduleEstimate => include_str!("../schemas/schedule_estimate.schema.json"),
            Self::SolutionArchitecture => {
                include_str!("../schemas/solution_architecture.schema.json")
            }
            Self::PocPlan => include_str!("../schemas/poc_plan.schema.json"),
            Self::TechStack => include_str!("../schemas/tech_stack.schema.json"),
            Self::OrgTeamProfile => include_str!("../schemas/org_team_profile.schema.json"),
        }
    }

    const ALL: [Self; 7] = [
        Self::BrdSections,
        Self::EngineeringPlan,
        Self::ScheduleEstimate,
        Self::SolutionArchitecture,
        Self::PocPlan,
        Self::TechStack,
        Self::OrgTeamProfile,
    ];
}

/// Validation errors raised by the conformance gate.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Document does not conform to {schema}: {detail}")]
    Nonconformant {
        schema: &'static str,
        detail: String,
    },

    #[error("Generation reported an internal error: {detail}")]
    ErrorMarker { detail: String },
}

// Embedded schemas are compile-time constants; a parse failure here is a
// build defect, so the panic in initialization is acceptable.
static VALIDATORS: LazyLock<BTreeMap<SchemaId, Validator>> = LazyLock::new(|| {
    SchemaId::ALL
        .into_iter()
        .map(|id| {
            let schema: Value = serde_json::from_str(id.source())
                .unwrap_or_else(|e| panic!("embedded schema {} is invalid JSON: {e}", id.as_str()));
            let validator = jsonschema::options()
                .with_draft(Draft::Draft202012)
                .build(&schema)
                .unwrap_or_else(|e| panic!("embedded schema {} failed to compile: {e}", id.as_str()));
            (id, validator)
        })
        .collect()
});

/// Validate `document` against the schema identified by `schema_id`.
///
/// # Errors
/// [`SchemaError::Nonconformant`] with every violation (instance path
/// plus message) joined into one diagnostic string.
pub fn validate(document: &Value, schema_id: SchemaId) -> Result<(), SchemaError> {
    let validator = &VALIDATORS[&schema_id];
    let detail: Vec<String> = validator
        .iter_errors(document)
        .map(|err| format!("{}: {}", err.instance_path(), err))
        .collect();
    if detail.is_empty() {
        Ok(())
    } else {
        Err(SchemaError::Nonconformant {
            schema: schema_id.as_str(),
            detail: detail.join("; "),
        })
    }
}

/// Validate a generated artifact, rejecting error-marker payloads first.
///
/// Backends signal transport or provider failures by returning a payload
/// carrying [`ERROR_MARKER_KEY`]; such a payload must never pass the
/// gate even if it happens to satisfy the schema.
pub fn validate_artifact(document: &Value, schema_id: SchemaId) -> Result<(), SchemaError> {
    if let Some(detail) = error_marker(document) {
        return Err(SchemaError::ErrorMarker {
            detail: detail.to_string(),
        });
    }
    validate(document, schema_id)
}

/// Return the error-marker message if `document` carries one.
#[must_use]
pub fn error_marker(document: &Value) -> Option<&str> {
    document.get(ERROR_MARKER_KEY).and_then(Value::as_str)
}
