//! Confidence guardrail: decline to answer when the best evidence is too weak.

use serde::Serialize;

use crate::error::AuditError;
use crate::evidence;
use crate::types::EvidenceItem;

pub const DEFAULT_THRESHOLD: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateDecision {
  Proceed,
  Insufficient,
}

/// Gate outcome plus the similarity it was decided on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateOutcome {
  pub decision: GateDecision,
  pub max_similarity: f64,
}

/// Decide whether the evidence supports an answer.
///
/// Empty evidence is always insufficient, whatever the threshold.
pub fn gate(evidence: &[EvidenceItem], threshold: f64) -> Result<GateOutcome, AuditError> {
  if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
    return Err(AuditError::configuration("threshold", "must lie in [0, 1]"));
  }
  let max_similarity = evidence::max_similarity(evidence);
  let decision = if evidence.is_empty() || max_similarity < threshold {
    GateDecision::Insufficient
  } else {
    GateDecision::Proceed
  };
  Ok(GateOutcome {
    decision,
    max_similarity,
  })
}
