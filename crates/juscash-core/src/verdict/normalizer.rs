//! Output normalization.
//!
//! The generator is free-text and unreliable. [`normalize`] turns whatever it
//! produced into a well-typed [`Verdict`] and never fails.
//!
//! Strategies are tried in order; each either yields a verdict or passes:
//! 1. Strict: the trimmed text decodes as a JSON object from its first byte
//! 2. Scavenged: a JSON object decodes from the first `{` onward
//! 3. Heuristic: keyword classification plus citation scan (total)
//!
//! Empty or degenerate output skips straight to the manual-review verdict.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use super::patterns::{
    collect_citations, contains_any, extract_citations, APPROVAL_MARKERS, DEGENERATE_OUTPUTS,
    INCOMPLETE_MARKERS, REJECTION_MARKERS,
};
use super::{Decision, Verdict};

/// Rationale used when the generator produced nothing usable.
pub const MANUAL_REVIEW_RATIONALE: &str = "Não foi possível obter uma análise confiável do modelo para este caso. O processo deve ser revisado manualmente.";

/// Which strategy produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationPath {
    /// Output was empty or degenerate
    Empty,
    Strict,
    Scavenged,
    Heuristic,
}

impl NormalizationPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            NormalizationPath::Empty => "empty",
            NormalizationPath::Strict => "strict",
            NormalizationPath::Scavenged => "scavenged",
            NormalizationPath::Heuristic => "heuristic",
        }
    }
}

impl fmt::Display for NormalizationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured strategy locates where a JSON object should start.
type Locator = fn(&str) -> Option<&str>;

/// Structured strategies, in order. The heuristic terminates the chain.
const STRUCTURED_STRATEGIES: &[(NormalizationPath, Locator)] = &[
    (NormalizationPath::Strict, locate_strict),
    (NormalizationPath::Scavenged, locate_scavenged),
];

fn locate_strict(text: &str) -> Option<&str> {
    Some(text)
}

fn locate_scavenged(text: &str) -> Option<&str> {
    // Position 0 is already covered by the strict strategy.
    match text.find('{') {
        Some(0) | None => None,
        Some(start) => Some(&text[start..]),
    }
}

/// Normalize raw generator output into a verdict.
pub fn normalize(raw_text: &str) -> Verdict {
    normalize_with_path(raw_text).0
}

/// Normalize raw generator output, also reporting which strategy succeeded.
pub fn normalize_with_path(raw_text: &str) -> (Verdict, NormalizationPath) {
    let text = raw_text.trim();

    if text.is_empty() || DEGENERATE_OUTPUTS.contains(&text) {
        tracing::warn!("Generator output empty or degenerate, requesting manual review");
        return (manual_review(), NormalizationPath::Empty);
    }

    for (path, locate) in STRUCTURED_STRATEGIES {
        if let Some(object) = locate(text).and_then(decode_leading_object) {
            tracing::debug!(path = %path, "Generator output decoded as JSON");
            return (verdict_from_object(&object, text), *path);
        }
    }

    tracing::warn!("Generator output is not JSON, falling back to heuristic classification");
    (heuristic_verdict(text), NormalizationPath::Heuristic)
}

fn manual_review() -> Verdict {
    Verdict {
        decision: Decision::Incomplete,
        rationale: MANUAL_REVIEW_RATIONALE.to_string(),
        citations: Vec::new(),
    }
}

/// Decode the first JSON value of `text` if it is an object.
///
/// Anything after the object is ignored.
fn decode_leading_object(text: &str) -> Option<Map<String, Value>> {
    let mut values = serde_json::Deserializer::from_str(text).into_iter::<Value>();
    match values.next() {
        Some(Ok(Value::Object(object))) => Some(object),
        _ => None,
    }
}

/// Build a verdict from a decoded object.
///
/// The decision is checked against the closed set here; unknown or missing
/// values become `incomplete`.
fn verdict_from_object(object: &Map<String, Value>, text: &str) -> Verdict {
    let decision = match object.get("decision") {
        Some(Value::String(label)) => Decision::from_label(label).unwrap_or_else(|| {
            tracing::warn!(decision = %label, "Unrecognized decision value, coercing to incomplete");
            Decision::Incomplete
        }),
        other => {
            tracing::warn!(decision = ?other, "Missing or non-string decision, coercing to incomplete");
            Decision::Incomplete
        }
    };

    let rationale = match object.get("rationale") {
        Some(Value::String(r)) if !r.trim().is_empty() => r.clone(),
        _ => {
            tracing::warn!("Decoded output has no rationale, keeping raw output as rationale");
            text.to_string()
        }
    };

    let citations = match object.get("citacoes") {
        Some(Value::Array(items)) => collect_citations(items.iter().filter_map(Value::as_str)),
        Some(Value::String(s)) => extract_citations(s),
        _ => Vec::new(),
    };

    Verdict {
        decision,
        rationale,
        citations,
    }
}

/// Keyword classification. Precedence: approved, incomplete, rejected, and
/// `incomplete` when nothing matches.
fn heuristic_verdict(text: &str) -> Verdict {
    let lowered = text.to_lowercase();

    let decision = if contains_any(&lowered, APPROVAL_MARKERS) {
        Decision::Approved
    } else if contains_any(&lowered, INCOMPLETE_MARKERS) {
        Decision::Incomplete
    } else if contains_any(&lowered, REJECTION_MARKERS) {
        Decision::Rejected
    } else {
        Decision::Incomplete
    };

    Verdict {
        decision,
        rationale: text.to_string(),
        citations: extract_citations(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verdict::is_citation;
    use proptest::prelude::*;

    #[test]
    fn test_strict_json() {
        let raw = r#"{"decision":"rejected","rationale":"Esfera trabalhista.","citacoes":["POL-4"]}"#;
        let (verdict, path) = normalize_with_path(raw);
        assert_eq!(path, NormalizationPath::Strict);
        assert_eq!(verdict.decision, Decision::Rejected);
        assert_eq!(verdict.rationale, "Esfera trabalhista.");
        assert_eq!(verdict.citations, vec!["POL-4"]);
    }

    #[test]
    fn test_strict_ignores_trailing_text() {
        let raw = "  {\"decision\":\"approved\",\"rationale\":\"ok\",\"citacoes\":[]}\nEspero ter ajudado!";
        let (verdict, path) = normalize_with_path(raw);
        assert_eq!(path, NormalizationPath::Strict);
        assert_eq!(verdict.decision, Decision::Approved);
    }

    #[test]
    fn test_scavenged_after_prose() {
        let raw = "Explicação...\n{\"decision\":\"approved\",\"rationale\":\"ok\",\"citacoes\":[\"POL-1\"]}";
        let (verdict, path) = normalize_with_path(raw);
        assert_eq!(path, NormalizationPath::Scavenged);
        assert_eq!(verdict.decision, Decision::Approved);
        assert_eq!(verdict.rationale, "ok");
        assert_eq!(verdict.citations, vec!["POL-1"]);
    }

    #[test]
    fn test_scavenged_inside_code_fence() {
        let raw = "```json\n{\"decision\": \"incomplete\", \"rationale\": \"Falta certidão.\", \"citacoes\": [\"POL-8\"]}\n```";
        let (verdict, path) = normalize_with_path(raw);
        assert_eq!(path, NormalizationPath::Scavenged);
        assert_eq!(verdict.decision, Decision::Incomplete);
        assert_eq!(verdict.citations, vec!["POL-8"]);
    }

    #[test]
    fn test_heuristic_rejection_dedups_citations() {
        let raw = "O processo foi rejeitado conforme POL-4 e POL-4.";
        let (verdict, path) = normalize_with_path(raw);
        assert_eq!(path, NormalizationPath::Heuristic);
        assert_eq!(verdict.decision, Decision::Rejected);
        assert_eq!(verdict.citations, vec!["POL-4"]);
        assert_eq!(verdict.rationale, raw);
    }

    #[test]
    fn test_heuristic_precedence() {
        assert_eq!(
            normalize("Crédito aprovado, mas documentação incompleta.").decision,
            Decision::Approved
        );
        assert_eq!(
            normalize("Documentação incompleta; pedido recusado.").decision,
            Decision::Incomplete
        );
        assert_eq!(normalize("Pedido RECUSADO.").decision, Decision::Rejected);
    }

    #[test]
    fn test_heuristic_defaults_to_incomplete() {
        let verdict = normalize("Não tenho certeza sobre este caso.");
        assert_eq!(verdict.decision, Decision::Incomplete);
        assert!(verdict.citations.is_empty());
    }

    #[test]
    fn test_empty_and_degenerate_outputs() {
        for raw in ["", "   ", "```", "**", "`", "\n``\n"] {
            let (verdict, path) = normalize_with_path(raw);
            assert_eq!(path, NormalizationPath::Empty, "input {:?}", raw);
            assert_eq!(verdict.decision, Decision::Incomplete);
            assert_eq!(verdict.rationale, MANUAL_REVIEW_RATIONALE);
            assert!(verdict.citations.is_empty());
        }
    }

    #[test]
    fn test_malformed_json_citations_sorted_lexicographically() {
        let raw = r#"{"decision": "approved", "rationale": "ver POL-2 e POL-10"#;
        let (verdict, path) = normalize_with_path(raw);
        assert_eq!(path, NormalizationPath::Heuristic);
        assert_eq!(verdict.decision, Decision::Approved);
        assert_eq!(verdict.citations, vec!["POL-10", "POL-2"]);
    }

    #[test]
    fn test_missing_citations_defaults_empty() {
        let verdict = normalize(r#"{"decision":"approved","rationale":"ok"}"#);
        assert_eq!(verdict.decision, Decision::Approved);
        assert!(verdict.citations.is_empty());
    }

    #[test]
    fn test_unknown_decision_coerced() {
        let verdict = normalize(r#"{"decision":"maybe","rationale":"hmm","citacoes":["POL-1"]}"#);
        assert_eq!(verdict.decision, Decision::Incomplete);
        assert_eq!(verdict.citations, vec!["POL-1"]);

        let verdict = normalize(r#"{"decision":7,"rationale":"hmm"}"#);
        assert_eq!(verdict.decision, Decision::Incomplete);
    }

    #[test]
    fn test_missing_rationale_keeps_raw_output() {
        let raw = r#"{"decision":"rejected","citacoes":["POL-3"]}"#;
        let verdict = normalize(raw);
        assert_eq!(verdict.decision, Decision::Rejected);
        assert_eq!(verdict.rationale, raw);
    }

    #[test]
    fn test_malformed_citation_entries_filtered() {
        let verdict = normalize(
            r#"{"decision":"rejected","rationale":"x","citacoes":["POL-3","pol-4","regra 5",12,"POL-3","POL-1: título"]}"#,
        );
        assert_eq!(verdict.citations, vec!["POL-1", "POL-3"]);
    }

    #[test]
    fn test_citations_as_string() {
        let verdict = normalize(r#"{"decision":"rejected","rationale":"x","citacoes":"POL-6, POL-5"}"#);
        assert_eq!(verdict.citations, vec!["POL-5", "POL-6"]);
    }

    #[test]
    fn test_non_object_json_falls_through() {
        let (verdict, path) = normalize_with_path(r#"["approved", "POL-1"]"#);
        assert_eq!(path, NormalizationPath::Heuristic);
        assert_eq!(verdict.decision, Decision::Approved);
        assert_eq!(verdict.citations, vec!["POL-1"]);
    }

    fn decision_strategy() -> impl Strategy<Value = Decision> {
        prop_oneof![
            Just(Decision::Approved),
            Just(Decision::Rejected),
            Just(Decision::Incomplete),
        ]
    }

    proptest! {
        #[test]
        fn prop_round_trip(
            decision in decision_strategy(),
            rationale in "[a-zA-Z0-9áéíóúãõç ,.;:-]{0,60}[a-zA-Z]",
            ids in proptest::collection::btree_set("POL-[0-9]{1,3}", 0..6),
        ) {
            let verdict = Verdict {
                decision,
                rationale,
                citations: ids.into_iter().collect(),
            };
            let raw = serde_json::to_string(&verdict).unwrap();
            prop_assert_eq!(normalize(&raw), verdict);
        }

        #[test]
        fn prop_never_panics_and_upholds_invariants(raw in "\\PC{0,200}") {
            let verdict = normalize(&raw);
            prop_assert!(!verdict.rationale.trim().is_empty());
            prop_assert!(verdict.citations.iter().all(|c| is_citation(c)));
            let mut sorted = verdict.citations.clone();
            sorted.sort();
            sorted.dedup();
            prop_assert_eq!(sorted, verdict.citations);
        }
    }
}
