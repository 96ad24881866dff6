//! Vector-store client. Fetches ranked excerpts before the core runs; the core
//! then sees them through a `SnapshotRetriever`.

use std::time::Duration;

use auditor_core::types::{EvidenceItem, Query};
use auditor_core::{AuditError, SnapshotRetriever};
use reqwest::Client;
use tracing::warn;

use crate::types::{RetrievalQuery, RetrievalResponse};

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct HttpRetriever {
  client: Client,
  url: String,
}

impl HttpRetriever {
  pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, AuditError> {
    let url = url.into();
    if url.trim().is_empty() {
      return Err(AuditError::configuration("RETRIEVER_URL", "must not be empty"));
    }
    let client = Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| AuditError::configuration("RETRIEVER_URL", &e.to_string()))?;
    Ok(Self { client, url })
  }

  pub fn url(&self) -> &str {
    &self.url
  }

  /// POST `{query, top_k}`; any transport, status or decode failure is `RetrieverUnavailable`.
  pub async fn fetch(&self, query: &Query, top_k: usize) -> Result<Vec<EvidenceItem>, AuditError> {
    let body = RetrievalQuery {
      query: query.as_str(),
      top_k,
    };
    let response = self
      .client
      .post(&self.url)
      .json(&body)
      .send()
      .await
      .map_err(|e| AuditError::unavailable(e.to_string()))?;
    let response = response
      .error_for_status()
      .map_err(|e| AuditError::unavailable(e.to_string()))?;
    let parsed: RetrievalResponse = response
      .json()
      .await
      .map_err(|e| AuditError::unavailable(format!("decode: {}", e)))?;
    Ok(parsed.items)
  }

  /// Snapshot for the core. A failed fetch becomes a snapshot that reports the
  /// backend as unavailable, which the core degrades to INSUFFICIENT_EVIDENCE.
  pub async fn snapshot(&self, query: &Query, top_k: usize) -> SnapshotRetriever {
    match self.fetch(query, top_k).await {
      Ok(items) => SnapshotRetriever::new(items),
      Err(e) => {
        warn!(url = %self.url, error = %e, "vector store fetch failed");
        SnapshotRetriever::failed(e.to_string())
      }
    }
  }
}
