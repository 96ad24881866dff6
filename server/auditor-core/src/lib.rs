//! Repository Auditor decision core: deterministic retrieval guardrails.
//!
//! Given a query and evidence retrieved by an external vector store, decides
//! whether there is enough support to answer, runs read-only analysis tools over
//! the retrieved text and assembles cited findings.
//!
//! No embeddings, no DB, no network; pure computation over already-retrieved text.

pub mod assemble;
pub mod config;
pub mod error;
pub mod evidence;
pub mod gate;
pub mod metrics;
pub mod pipeline;
pub mod retriever;
pub mod safety;
pub mod tools;
pub mod types;

use std::sync::Arc;

pub use config::Config;
pub use error::AuditError;
pub use gate::{gate, GateDecision};
pub use metrics::{CoreMetrics, MetricsSnapshot};
pub use pipeline::{answer, Auditor, CancelToken};
pub use retriever::{Retriever, SnapshotRetriever};
pub use tools::Dispatcher;
pub use types::{AnalysisResult, AnalyzeRequest, EvidenceItem, Finding, Input, Query, Status};

/// Run the auditor on one subprocess input (no I/O).
pub fn run(input: &Input, config: &Config) -> Result<AnalysisResult, AuditError> {
  let query = input.request.validate()?;
  let config = match input.request.threshold {
    Some(t) => config.with_threshold(t)?,
    None => config.clone(),
  };
  let retriever = Arc::new(SnapshotRetriever::new(input.evidence.clone()));
  let auditor = Auditor::new(config, retriever, Dispatcher::with_builtin()?)?;
  auditor.answer_planned(
    &query,
    input.request.top_k,
    input.request.plan.as_deref(),
    &CancelToken::new(),
  )
}
