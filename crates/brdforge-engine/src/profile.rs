//! Org/team profile loading
//!
//! The profile is a second immutable input: a JSON object of named
//! capability strengths, consumed only by the tech-stack stage. Loaded
//! once per run and fingerprinted like the input document.

use anyhow::{Context, Result};
use brdforge_schemas::{SchemaId, validate};
use camino::Utf8Path;
use serde_json::Value;
use std::fs;

/// Load and validate an org/team profile document from disk.
///
/// # Errors
/// Fails when the file is missing or unreadable, or when the document
/// does not carry a `team_strengths` object.
pub fn load_profile(path: &Utf8Path) -> Result<Value> {
    let content = fs::read_to_string(path.as_std_path())
        .with_context(|| format!("Org/team profile not found: {path}"))?;
    let profile: Value = serde_json::from_str(&content)
        .with_context(|| format!("Org/team profile at {path} is not valid JSON"))?;
    validate(&profile, SchemaId::OrgTeamProfile)
        .with_context(|| format!("Org/team profile at {path} is not usable"))?;
    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_profile(dir: &TempDir, content: &str) -> Utf8PathBuf {
        let path = Utf8PathBuf::from_path_buf(dir.path().join("profile.json")).unwrap();
        fs::write(path.as_std_path(), content).unwrap();
        path
    }

    #[test]
    fn valid_profile_loads() {
        let dir = TempDir::new().unwrap();
        let path = write_profile(
            &dir,
            r#"{"team_strengths": {"frontend": "React", "backend": "Python/FastAPI"}}"#,
        );
        let profile = load_profile(&path).unwrap();
        assert_eq!(profile["team_strengths"]["frontend"], json!("React"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let path = Utf8PathBuf::from("/nonexistent/profile.json");
        assert!(load_profile(&path).is_err());
    }

    #[test]
    fn profile_without_team_strengths_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_profile(&dir, r#"{"team": "alpha"}"#);
        assert!(load_profile(&path).is_err());
    }

    #[test]
    fn non_object_profile_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_profile(&dir, r#"["not", "an", "object"]"#);
        assert!(load_profile(&path).is_err());
    }
}
