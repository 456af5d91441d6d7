//! Internal policy corpus.
//!
//! The corpus is a small, fixed set of eligibility rules, each independently
//! citable as `POL-<n>`. The reference corpus is embedded at compile time from
//! policies/reference.yaml and versioned as a unit by [`POLICY_KB_VERSION`].

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;
use thiserror::Error;

/// Version of the reference policy corpus. Audit metadata.
pub const POLICY_KB_VERSION: &str = "2025-01";

/// Embedded reference corpus.
const REFERENCE_CORPUS_YAML: &str = include_str!("../../../policies/reference.yaml");

static REFERENCE_CORPUS: OnceLock<Result<PolicyCorpus, String>> = OnceLock::new();

lazy_static! {
    static ref RULE_ID_PATTERN: Regex = Regex::new(r"^POL-\d+$").unwrap();
}

/// Errors that can occur when loading a policy corpus.
#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid rule ID '{0}': expected POL-<number>")]
    InvalidRuleId(String),

    #[error("Duplicate rule ID: {0}")]
    DuplicateRuleId(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Policy corpus is empty")]
    Empty,

    #[error("Corpus version {found} does not match expected {expected}")]
    VersionMismatch { expected: String, found: String },

    #[error("Failed to load reference corpus: {0}")]
    Reference(String),
}

/// A single policy rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyRule {
    /// Stable identifier (e.g., "POL-3")
    pub id: String,

    pub title: String,

    /// Rule body
    pub text: String,
}

/// A policy rule as returned by retrieval, with its rank (0 = most similar).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievedPassage {
    pub rule: PolicyRule,
    pub rank: usize,
}

/// The full, ordered policy corpus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyCorpus {
    /// Corpus version (matches [`POLICY_KB_VERSION`] for the reference corpus)
    pub version: String,

    pub rules: Vec<PolicyRule>,
}

impl PolicyCorpus {
    /// The process-wide reference corpus.
    ///
    /// Parsed and validated once; every later call returns the same instance.
    pub fn reference() -> Result<&'static PolicyCorpus, CorpusError> {
        let result = REFERENCE_CORPUS.get_or_init(|| {
            let corpus = Self::from_yaml(REFERENCE_CORPUS_YAML).map_err(|e| e.to_string())?;
            if corpus.version != POLICY_KB_VERSION {
                return Err(CorpusError::VersionMismatch {
                    expected: POLICY_KB_VERSION.to_string(),
                    found: corpus.version,
                }
                .to_string());
            }
            Ok(corpus)
        });

        match result {
            Ok(corpus) => Ok(corpus),
            Err(e) => Err(CorpusError::Reference(e.clone())),
        }
    }

    /// Parse a corpus from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, CorpusError> {
        let corpus: PolicyCorpus = serde_yaml::from_str(yaml)?;
        corpus.validate()?;
        Ok(corpus)
    }

    /// Validate the corpus structure.
    fn validate(&self) -> Result<(), CorpusError> {
        if self.version.trim().is_empty() {
            return Err(CorpusError::MissingField("version".to_string()));
        }

        if self.rules.is_empty() {
            return Err(CorpusError::Empty);
        }

        let mut seen = HashSet::new();
        for rule in &self.rules {
            if !RULE_ID_PATTERN.is_match(&rule.id) {
                return Err(CorpusError::InvalidRuleId(rule.id.clone()));
            }
            if !seen.insert(&rule.id) {
                return Err(CorpusError::DuplicateRuleId(rule.id.clone()));
            }
            if rule.title.trim().is_empty() {
                return Err(CorpusError::MissingField(format!("{}.title", rule.id)));
            }
            if rule.text.trim().is_empty() {
                return Err(CorpusError::MissingField(format!("{}.text", rule.id)));
            }
        }

        Ok(())
    }

    /// Look up a rule by identifier.
    pub fn get(&self, id: &str) -> Option<&PolicyRule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Every rule in corpus order, ranked by position.
    pub fn passages(&self) -> Vec<RetrievedPassage> {
        self.rules
            .iter()
            .enumerate()
            .map(|(rank, rule)| RetrievedPassage {
                rule: rule.clone(),
                rank,
            })
            .collect()
    }
}
