//! # juscash-core
//!
//! Deterministic decision machinery for JusCash credit validation.
//!
//! This crate holds everything in the decision path that does not talk to a
//! model:
//! - Case records and their schema validation
//! - The internal policy corpus
//! - Case summarization (retrieval query and prompt payload)
//! - Prompt construction
//! - Normalization of raw generator output into a typed [`Verdict`]
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same input always produces same output
//! 2. **No model calls**: Embedding and generation live in `juscash-runtime`
//! 3. **Total normalization**: [`normalize`] never fails, whatever the
//!    generator produced
//! 4. **Auditable**: Every verdict carries sorted, de-duplicated `POL-<n>`
//!    citations
//!
//! ## Example
//!
//! ```rust,ignore
//! use juscash_core::{build_prompt, normalize, summarize, CaseRecord, PolicyCorpus};
//!
//! let case = CaseRecord::from_json(&payload)?;
//! let summary = summarize(&case);
//! let passages = PolicyCorpus::reference()?.passages();
//! let prompt = build_prompt(&passages, &summary);
//!
//! let raw = generator_output_for(&prompt);
//! let verdict = normalize(&raw);
//! println!("{}: {:?}", verdict.decision, verdict.citations);
//! ```

pub mod case;
pub mod policy;
pub mod prompt;
pub mod summary;
pub mod verdict;

// Re-export main types at crate root
pub use case::{parse_timestamp, validate_case_schema, CaseError, CaseRecord, Document, Movement};
pub use policy::{CorpusError, PolicyCorpus, PolicyRule, RetrievedPassage, POLICY_KB_VERSION};
pub use prompt::{build_prompt, render_policy_context, DECISION_PROMPT, PROMPT_VERSION};
pub use summary::summarize;
pub use verdict::{
    normalize, normalize_with_path, Decision, DecisionMetadata, DecisionResult,
    NormalizationPath, Verdict, MANUAL_REVIEW_RATIONALE,
};
