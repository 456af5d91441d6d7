//! Text patterns used by the output normalizer.
//!
//! Citation ids and decision keywords are matched here so that the
//! structured and heuristic parse paths agree on what a citation is.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;

lazy_static! {
    /// A policy citation anywhere in free text.
    pub static ref CITATION_PATTERN: Regex = Regex::new(r"POL-\d+").unwrap();

    /// A string that is exactly one policy citation.
    pub static ref CITATION_EXACT: Regex = Regex::new(r"^POL-\d+$").unwrap();
}

/// Markers for an approval, English and Portuguese stems. Checked first.
pub const APPROVAL_MARKERS: &[&str] = &["approved", "aprovad"];

/// Markers for an incomplete case. Checked second.
pub const INCOMPLETE_MARKERS: &[&str] = &["incomplete", "incomplet"];

/// Markers for a rejection. Checked last.
pub const REJECTION_MARKERS: &[&str] = &["rejected", "rejeitad", "recusad"];

/// Outputs that carry no content at all (stray fences and emphasis).
pub const DEGENERATE_OUTPUTS: &[&str] = &["```", "``", "`", "```json", "**", "*", "__", "_"];

/// Check if a string is exactly one well-formed citation.
pub fn is_citation(candidate: &str) -> bool {
    CITATION_EXACT.is_match(candidate)
}

/// Extract every citation in `text`, de-duplicated and sorted lexicographically.
pub fn extract_citations(text: &str) -> Vec<String> {
    collect_citations(std::iter::once(text))
}

/// Extract citations from several fragments into one sorted set.
pub(crate) fn collect_citations<'a>(fragments: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let set: BTreeSet<String> = fragments
        .into_iter()
        .flat_map(|fragment| CITATION_PATTERN.find_iter(fragment))
        .map(|m| m.as_str().to_string())
        .collect();
    set.into_iter().collect()
}

/// Check if lower-cased text contains any of the markers.
pub(crate) fn contains_any(lowered: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| lowered.contains(m))
}
