//! Tag normalization (spec §4.4): lowercase, trim, and apply a canonical
//! alias table so that `"Back-end"`, `"backend"`, and `"back end"` all
//! collapse to the same tag.

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Mirrors job_board/portals/parser.py's STANDARD_TAGS_MAPPING: free-text
/// variants a source might emit, keyed lower-case, mapped to the canonical
/// tag this crate stores.
static STANDARD_TAGS_MAPPING: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("back-end", "backend"),
        ("back end", "backend"),
        ("backend development", "backend"),
        ("front-end", "frontend"),
        ("front end", "frontend"),
        ("frontend development", "frontend"),
        ("full-stack", "fullstack"),
        ("full stack", "fullstack"),
        ("node js", "node.js"),
        ("nodejs", "node.js"),
        ("node.js", "node.js"),
        ("react js", "react"),
        ("reactjs", "react"),
        ("react.js", "react"),
        ("vue js", "vue"),
        ("vuejs", "vue"),
        ("golang", "go"),
        ("py", "python"),
        ("js", "javascript"),
        ("ts", "typescript"),
        ("ml", "machine-learning"),
        ("machine learning", "machine-learning"),
        ("ai", "artificial-intelligence"),
        ("devops engineer", "devops"),
        ("sre", "site-reliability-engineering"),
        ("k8s", "kubernetes"),
        ("postgres", "postgresql"),
        ("ci/cd", "cicd"),
        ("remote work", "remote"),
        ("part time", "part-time"),
        ("full time", "full-time"),
    ])
});

/// Normalize a single free-text tag. Idempotent: normalizing an already
/// normalized tag returns the same value.
pub fn normalize(tag: &str) -> String {
    let lowered = tag.trim().to_lowercase();
    STANDARD_TAGS_MAPPING
        .get(lowered.as_str())
        .map(|canonical| canonical.to_string())
        .unwrap_or(lowered)
}

/// Normalize a batch of tags, deduplicating the result while preserving
/// first-seen order.
pub fn normalize_all(tags: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tags.iter()
        .map(|t| normalize(t))
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect()
}
