//! Verdicts and decision results.
//!
//! A [`Verdict`] is the normalized three-way decision with its rationale and
//! policy citations. A [`DecisionResult`] is a verdict with the audit metadata
//! of the model, prompt template and policy corpus that produced it.

mod normalizer;
mod patterns;

pub use normalizer::{normalize, normalize_with_path, NormalizationPath, MANUAL_REVIEW_RATIONALE};
pub use patterns::{extract_citations, is_citation};

use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approved,
    Rejected,
    Incomplete,
}

impl Decision {
    /// Parse a decision label, case-insensitively.
    ///
    /// Returns `None` for anything outside the closed set.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "approved" => Some(Decision::Approved),
            "rejected" => Some(Decision::Rejected),
            "incomplete" => Some(Decision::Incomplete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approved => "approved",
            Decision::Rejected => "rejected",
            Decision::Incomplete => "incomplete",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The normalized decision, before audit metadata is attached.
///
/// Invariants (upheld by [`normalize`]):
/// - `rationale` is non-empty
/// - `citations` holds only `POL-<digits>` ids, de-duplicated, sorted
///   lexicographically
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub decision: Decision,

    pub rationale: String,

    #[serde(rename = "citacoes")]
    pub citations: Vec<String>,
}

/// Audit metadata attached to every decision.
///
/// These values are process-wide constants, not computed per call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionMetadata {
    /// Generating model identifier
    pub model_name: String,

    pub prompt_version: String,

    #[serde(rename = "policy_kb_version")]
    pub policy_version: String,
}

impl DecisionMetadata {
    /// Metadata for the given model with the built-in prompt and corpus versions.
    pub fn for_model(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            prompt_version: crate::prompt::PROMPT_VERSION.to_string(),
            policy_version: crate::policy::POLICY_KB_VERSION.to_string(),
        }
    }
}

/// The auditable result returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionResult {
    pub decision: Decision,

    pub rationale: String,

    #[serde(rename = "citacoes")]
    pub citations: Vec<String>,

    #[serde(flatten)]
    pub metadata: DecisionMetadata,
}

impl DecisionResult {
    /// Attach audit metadata to a verdict.
    pub fn new(verdict: Verdict, metadata: DecisionMetadata) -> Self {
        Self {
            decision: verdict.decision,
            rationale: verdict.rationale,
            citations: verdict.citations,
            metadata,
        }
    }
}
