//! Description normalization: the matching key used by every classifier.
//!
//! `normalize("Starbucks  #123 ")` -> `"STARBUCKS 123"`

use regex::Regex;
use std::sync::LazyLock;

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static whitespace regex"));

static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Z0-9 &/.\-]").expect("static allow-set regex"));

/// Canonicalize free text: uppercase, collapse whitespace, keep only
/// `A-Z 0-9 space & / . -`, trim.
///
/// Stripping can leave two spaces side by side (`"A é B"`), so whitespace is
/// collapsed a second time; this keeps `normalize(normalize(s)) == normalize(s)`.
pub fn normalize(text: &str) -> String {
    let upper = text.to_uppercase();
    let collapsed = WHITESPACE_RUN.replace_all(&upper, " ");
    let kept = DISALLOWED.replace_all(&collapsed, "");
    let collapsed = WHITESPACE_RUN.replace_all(&kept, " ");
    collapsed.trim().to_string()
}

/// Missing text normalizes to the empty string.
pub fn normalize_opt(text: Option<&str>) -> String {
    text.map(normalize).unwrap_or_default()
}
