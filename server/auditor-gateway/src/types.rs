//! Request/response types for the gateway.

use auditor_core::types::{AnalysisResult, AnalyzeRequest, EvidenceItem};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body of `POST /v1/analyze`. Evidence may be supplied inline; otherwise it is
/// fetched from the configured vector store.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzePayload {
  #[serde(flatten)]
  pub request: AnalyzeRequest,
  #[serde(default)]
  pub evidence: Option<Vec<EvidenceItem>>,
}

/// The Analysis Result at top level, plus request metadata.
#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
  pub request_id: Uuid,
  pub received_at: DateTime<Utc>,
  #[serde(flatten)]
  pub result: AnalysisResult,
}

/// Vector-store request: `{query, top_k}`.
#[derive(Debug, Serialize)]
pub struct RetrievalQuery<'a> {
  pub query: &'a str,
  pub top_k: usize,
}

/// Vector-store response: `{items: [...]}`.
#[derive(Debug, Deserialize)]
pub struct RetrievalResponse {
  #[serde(default)]
  pub items: Vec<EvidenceItem>,
}
