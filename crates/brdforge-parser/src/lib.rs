//! BRD free-text parser
//!
//! Turns a raw BRD (plain text or markdown) into the structured
//! `brd_sections` document the pipeline consumes. Two strategies, tried
//! in order:
//!
//! 1. Markdown headings: `#`-style headings are matched against the
//!    known section names; when any heading maps, each section's body is
//!    the text up to the next mapped heading.
//! 2. Plain-text scan: the first word-boundary occurrence of each known
//!    heading splits the document positionally.
//!
//! List-like sections are split on bullets and newlines. A result with
//! fewer than two populated sections is flagged so the caller can route
//! the raw text to an LLM-based parse instead.

use regex::Regex;
use serde_json::{Value, json};
use std::sync::LazyLock;

/// Section keys in their canonical order.
pub const SECTION_ORDER: [&str; 7] = [
    "problem",
    "objectives",
    "functional_requirements",
    "non_functional_requirements",
    "constraints",
    "dependencies",
    "assumptions",
];

/// Accepted heading spellings per section key.
const HEADING_MAP: [(&str, &[&str]); 7] = [
    ("problem", &["problem"]),
    ("objectives", &["objectives", "goals"]),
    ("functional_requirements", &["functional requirements", "functional requirements:"]),
    (
        "non_functional_requirements",
        &["non-functional requirements", "non functional requirements"],
    ),
    ("constraints", &["constraints"]),
    ("dependencies", &["dependencies"]),
    ("assumptions", &["assumptions"]),
];

static MARKDOWN_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(#{1,6})\s+(.+)$").expect("static pattern compiles"));
static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static pattern compiles"));
static LIST_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[•\n]").expect("static pattern compiles"));

/// Outcome of a rule-based parse.
#[derive(Debug, Clone)]
pub struct ParsedBrd {
    /// The `brd_sections` document, including parse-debug metadata.
    pub document: Value,
    /// True when fewer than two sections came back populated; the text
    /// is probably unstructured and worth an LLM parse instead.
    pub needs_fallback: bool,
}

#[derive(Debug, Default)]
struct ParseDebug {
    markdown_detected: bool,
    mapped_headings: Vec<&'static str>,
}

/// Parse raw BRD text into the structured sections document.
///
/// Section bodies are kept raw until shaping: the prose section is
/// whitespace-normalized, list sections are split on bullets and
/// newlines first (normalizing earlier would erase the line structure
/// the split relies on).
#[must_use]
pub fn parse_brd_text(text: &str) -> ParsedBrd {
    let (sections, debug) = split_sections(text);

    let get = |key: &str| sections.iter().find(|(k, _)| *k == key).map_or("", |(_, v)| v.as_str());
    let document = json!({
        "schema": "brd_sections_v1",
        "sections": {
            "problem": normalize(get("problem")),
            "objectives": to_list(get("objectives")),
            "functional_requirements": to_list(get("functional_requirements")),
            "non_functional_requirements": to_list(get("non_functional_requirements")),
            "constraints": to_list(get("constraints")),
            "dependencies": to_list(get("dependencies")),
            "assumptions": to_list(get("assumptions")),
        },
        "_llm_fallback_used": false,
        "_debug": {
            "markdown_detected": debug.markdown_detected,
            "mapped_headings": debug.mapped_headings,
            "strategy": "rule_based",
        },
    });

    let needs_fallback = populated_section_count(&document) < 2;
    ParsedBrd {
        document,
        needs_fallback,
    }
}

type Sections = Vec<(&'static str, String)>;

fn empty_sections() -> Sections {
    SECTION_ORDER.iter().map(|key| (*key, String::new())).collect()
}

fn split_sections(text: &str) -> (Sections, ParseDebug) {
    let (markdown_sections, debug) = split_markdown_sections(text);
    if let Some(sections) = markdown_sections {
        return (sections, debug);
    }

    let mut sections = empty_sections();

    // First match per key; later keys' headings bound the earlier
    // key's slice. Content starts after the matched heading text.
    let mut indices: Vec<(usize, usize, &'static str)> = Vec::new();
    for (key, headings) in HEADING_MAP {
        for heading in headings {
            let pattern = format!(r"(?i)\b{}\b", regex::escape(heading));
            let matcher = Regex::new(&pattern).expect("escaped heading pattern compiles");
            if let Some(found) = matcher.find(text) {
                indices.push((found.start(), found.end(), key));
                break;
            }
        }
    }
    indices.sort_unstable();
    if indices.is_empty() {
        return (sections, debug);
    }

    for (i, (_, content_start, key)) in indices.iter().enumerate() {
        let end = indices.get(i + 1).map_or(text.len(), |(next, _, _)| *next);
        if let Some(slot) = sections.iter_mut().find(|(k, _)| k == key) {
            slot.1 = text[*content_start..end].trim().to_string();
        }
    }
    (sections, debug)
}

fn split_markdown_sections(text: &str) -> (Option<Sections>, ParseDebug) {
    let matches: Vec<_> = MARKDOWN_HEADING.captures_iter(text).collect();
    if matches.is_empty() {
        return (None, ParseDebug::default());
    }

    let mut mapped: Vec<(usize, usize, &'static str)> = Vec::new();
    for capture in &matches {
        let (Some(whole), Some(text_group)) = (capture.get(0), capture.get(2)) else {
            continue;
        };
        let heading = text_group.as_str().trim().to_lowercase();
        for (key, headings) in HEADING_MAP {
            if headings.iter().any(|h| heading == *h) {
                mapped.push((whole.start(), whole.end(), key));
                break;
            }
        }
    }

    let debug = ParseDebug {
        markdown_detected: true,
        mapped_headings: mapped.iter().map(|(_, _, key)| *key).collect(),
    };
    if mapped.is_empty() {
        return (None, debug);
    }

    mapped.sort_unstable();
    let mut sections = empty_sections();
    for (i, (_, end_heading, key)) in mapped.iter().enumerate() {
        let end = mapped.get(i + 1).map_or(text.len(), |(next, _, _)| *next);
        if let Some(slot) = sections.iter_mut().find(|(k, _)| k == key) {
            slot.1 = text[*end_heading..end].trim().to_string();
        }
    }
    (Some(sections), debug)
}

fn normalize(text: &str) -> String {
    WHITESPACE_RUN.replace_all(text.trim(), " ").into_owned()
}

fn to_list(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    LIST_SPLIT
        .split(text)
        .map(|line| line.trim_matches(|c: char| c == '-' || c == '•' || c.is_whitespace()))
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn populated_section_count(document: &Value) -> usize {
    document["sections"]
        .as_object()
        .map_or(0, |sections| {
            sections
                .values()
                .filter(|value| match value {
                    Value::String(s) => !s.trim().is_empty(),
                    Value::Array(items) => !items.is_empty(),
                    _ => false,
                })
                .count()
        })
}
