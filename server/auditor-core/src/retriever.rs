//! Retriever boundary. The vector store lives outside the core; it is only ever
//! asked for ranked excerpts.

use crate::error::AuditError;
use crate::evidence;
use crate::safety::Access;
use crate::types::{EvidenceItem, Query};

pub trait Retriever: Send + Sync {
  /// Ranked excerpts for `query`. Empty on no match; `RetrieverUnavailable` on
  /// backend failure.
  fn retrieve(&self, query: &Query, top_k: usize) -> Result<Vec<EvidenceItem>, AuditError>;

  fn access(&self) -> Access {
    Access::ReadOnly
  }

  fn name(&self) -> &str {
    "retriever"
  }
}

/// Evidence already fetched by the caller (subprocess input, gateway prefetch, tests).
#[derive(Debug, Clone, Default)]
pub struct SnapshotRetriever {
  items: Vec<EvidenceItem>,
  failure: Option<String>,
}

impl SnapshotRetriever {
  pub fn new(items: Vec<EvidenceItem>) -> Self {
    Self {
      items,
      failure: None,
    }
  }

  /// A snapshot of a failed fetch; every `retrieve` reports the backend as unavailable.
  pub fn failed(reason: impl Into<String>) -> Self {
    Self {
      items: Vec::new(),
      failure: Some(reason.into()),
    }
  }
}

impl Retriever for SnapshotRetriever {
  fn retrieve(&self, _query: &Query, top_k: usize) -> Result<Vec<EvidenceItem>, AuditError> {
    if let Some(reason) = &self.failure {
      return Err(AuditError::unavailable(reason.clone()));
    }
    let mut items = self.items.clone();
    evidence::sort(&mut items);
    items.truncate(top_k);
    Ok(items)
  }

  fn name(&self) -> &str {
    "snapshot"
  }
}
