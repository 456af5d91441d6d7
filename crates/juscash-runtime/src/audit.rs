//! Decision audit trail.
//!
//! The pipeline hands every completed decision to an [`AuditSink`] after the
//! result is built. Recording is fire-and-forget: a sink cannot fail or
//! alter the decision.

use juscash_core::{Decision, DecisionResult, NormalizationPath};
use serde::Serialize;
use tracing::info;

/// One audited decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRecord {
    pub case_number: String,
    pub decision: Decision,
    pub citations: Vec<String>,
    pub model_name: String,
    pub prompt_version: String,
    pub policy_version: String,
    pub latency_ms: u64,
    /// Which normalizer tier produced the verdict
    pub normalization_path: NormalizationPath,
}

impl AuditRecord {
    pub fn from_result(
        case_number: &str,
        result: &DecisionResult,
        latency_ms: u64,
        normalization_path: NormalizationPath,
    ) -> Self {
        Self {
            case_number: case_number.to_string(),
            decision: result.decision,
            citations: result.citations.clone(),
            model_name: result.metadata.model_name.clone(),
            prompt_version: result.metadata.prompt_version.clone(),
            policy_version: result.metadata.policy_version.clone(),
            latency_ms,
            normalization_path,
        }
    }
}

/// Receiver of audit records.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: &AuditRecord);
}

/// Emits each record as a structured `tracing` event on `juscash::audit`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: &AuditRecord) {
        info!(
            target: "juscash::audit",
            case_number = %record.case_number,
            decision = %record.decision,
            citations = ?record.citations,
            model_name = %record.model_name,
            prompt_version = %record.prompt_version,
            policy_kb_version = %record.policy_version,
            latency_ms = record.latency_ms,
            normalization_path = %record.normalization_path,
            "decision_made"
        );
    }
}

/// Discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _record: &AuditRecord) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use juscash_core::{DecisionMetadata, Verdict};

    fn result() -> DecisionResult {
        DecisionResult::new(
            Verdict {
                decision: Decision::Approved,
                rationale: "ok".to_string(),
                citations: vec!["POL-1".to_string(), "POL-3".to_string()],
            },
            DecisionMetadata::for_model("google/gemma-2b-it"),
        )
    }

    #[test]
    fn test_record_copies_result_metadata() {
        let record = AuditRecord::from_result("0001", &result(), 42, NormalizationPath::Strict);

        assert_eq!(record.case_number, "0001");
        assert_eq!(record.decision, Decision::Approved);
        assert_eq!(record.citations, vec!["POL-1", "POL-3"]);
        assert_eq!(record.model_name, "google/gemma-2b-it");
        assert_eq!(record.prompt_version, "v1.0.0");
        assert_eq!(record.policy_version, "2025-01");
        assert_eq!(record.latency_ms, 42);
    }

    #[test]
    fn test_record_serializes_path() {
        let record = AuditRecord::from_result("0001", &result(), 1, NormalizationPath::Scavenged);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["normalization_path"], "scavenged");
        assert_eq!(json["decision"], "approved");
    }

    #[test]
    fn test_sinks_accept_records() {
        let record = AuditRecord::from_result("0001", &result(), 1, NormalizationPath::Heuristic);
        TracingAuditSink.record(&record);
        NoopAuditSink.record(&record);
    }
}
