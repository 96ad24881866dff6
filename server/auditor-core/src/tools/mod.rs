//! Tool dispatcher: maps a requested capability to a pure analysis function.
//!
//! Every tool only pattern-matches over already-retrieved excerpt text. None of
//! them touch the filesystem, spawn processes or evaluate code.

mod code_search;
mod dep_check;
mod static_analyzer;

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

pub use code_search::{query_terms, CodeSearch};
pub use dep_check::{is_manifest, version_lt, DepCheck, DependencyEntry};
pub use static_analyzer::StaticAnalyzer;

use crate::config::Config;
use crate::error::AuditError;
use crate::safety::{self, Access};
use crate::types::{EvidenceItem, Query, RawSignal, ToolKind};

/// Read-only inputs shared by every tool invocation of one request.
#[derive(Debug, Clone, Copy)]
pub struct ToolContext<'a> {
  pub query: &'a Query,
  pub config: &'a Config,
}

/// A pure analysis function over evidence text.
pub trait AnalysisTool: Send + Sync {
  fn kind(&self) -> ToolKind;

  fn access(&self) -> Access {
    Access::ReadOnly
  }

  fn run(&self, ctx: &ToolContext<'_>, evidence: &[EvidenceItem]) -> Vec<RawSignal>;
}

/// Registry of tools keyed by kind.
#[derive(Clone, Default)]
pub struct Dispatcher {
  tools: BTreeMap<ToolKind, Arc<dyn AnalysisTool>>,
}

impl Dispatcher {
  pub fn new() -> Self {
    Self::default()
  }

  /// Dispatcher with CODE_SEARCH, STATIC_ANALYZER and DEP_CHECK registered.
  pub fn with_builtin() -> Result<Self, AuditError> {
    let mut d = Self::new();
    d.register(Arc::new(CodeSearch))?;
    d.register(Arc::new(StaticAnalyzer::new()?))?;
    d.register(Arc::new(DepCheck::new()?))?;
    Ok(d)
  }

  /// Register a tool; refuses any tool that declares more than read-only access.
  pub fn register(&mut self, tool: Arc<dyn AnalysisTool>) -> Result<(), AuditError> {
    safety::ensure_read_only(tool.kind().as_str(), tool.access())?;
    self.tools.insert(tool.kind(), tool);
    Ok(())
  }

  pub fn registered(&self) -> Vec<ToolKind> {
    self.tools.keys().copied().collect()
  }

  pub(crate) fn tools(&self) -> impl Iterator<Item = &Arc<dyn AnalysisTool>> {
    self.tools.values()
  }

  /// Run the named tool over `evidence`.
  pub fn dispatch(
    &self,
    tool_name: &str,
    ctx: &ToolContext<'_>,
    evidence: &[EvidenceItem],
  ) -> Result<Vec<RawSignal>, AuditError> {
    let kind = ToolKind::parse(tool_name)?;
    let tool = self
      .tools
      .get(&kind)
      .ok_or_else(|| AuditError::UnknownTool(tool_name.to_string()))?;
    let signals = tool.run(ctx, evidence);
    debug!(tool = %kind, items = evidence.len(), signals = signals.len(), "tool dispatched");
    Ok(signals)
  }
}

/// Split an excerpt into lines with their starting byte offsets (newline excluded).
pub(crate) fn lines_with_offsets(text: &str) -> impl Iterator<Item = (usize, &str)> {
  let mut offset = 0usize;
  text.split_inclusive('\n').map(move |raw| {
    let start = offset;
    offset += raw.len();
    (start, raw.trim_end_matches(['\n', '\r']))
  })
}

/// Signal located at a byte range of one evidence item.
pub(crate) struct SignalSpec<'a> {
  pub tool: ToolKind,
  pub category: &'a str,
  pub subject: String,
  pub description: String,
  pub severity: crate::types::Severity,
}

pub(crate) fn signal_at(item: &EvidenceItem, start: usize, end: usize, signal: SignalSpec<'_>) -> RawSignal {
  RawSignal {
    tool: signal.tool,
    category: signal.category.to_string(),
    subject: signal.subject,
    description: signal.description,
    severity: signal.severity,
    path: item.path.clone(),
    line_start: item.line_at(start),
    line_end: item.line_at(end.saturating_sub(1).max(start)),
    offset_start: start,
    offset_end: end,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  struct Patcher;

  impl AnalysisTool for Patcher {
    fn kind(&self) -> ToolKind {
      ToolKind::CodeSearch
    }

    fn access(&self) -> Access {
      Access::Writes
    }

    fn run(&self, _ctx: &ToolContext<'_>, _evidence: &[EvidenceItem]) -> Vec<RawSignal> {
      Vec::new()
    }
  }

  #[test]
  fn builtin_registers_all_three() {
    let d = Dispatcher::with_builtin().unwrap();
    assert_eq!(d.registered(), ToolKind::ALL.to_vec());
  }

  #[test]
  fn unknown_tool_name_fails() {
    let d = Dispatcher::with_builtin().unwrap();
    let config = Config::default();
    let query = Query::new("anything").unwrap();
    let ctx = ToolContext {
      query: &query,
      config: &config,
    };
    let err = d.dispatch("RUN_SHELL", &ctx, &[]).unwrap_err();
    assert!(matches!(err, AuditError::UnknownTool(_)));
  }

  #[test]
  fn unregistered_kind_is_unknown() {
    let d = Dispatcher::new();
    let config = Config::default();
    let query = Query::new("anything").unwrap();
    let ctx = ToolContext {
      query: &query,
      config: &config,
    };
    assert!(matches!(
      d.dispatch("DEP_CHECK", &ctx, &[]),
      Err(AuditError::UnknownTool(_))
    ));
  }

  #[test]
  fn writing_tool_is_refused() {
    let mut d = Dispatcher::new();
    let err = d.register(Arc::new(Patcher)).unwrap_err();
    assert!(matches!(err, AuditError::CapabilityRejected { .. }));
    assert!(d.registered().is_empty());
  }

  #[test]
  fn lines_with_offsets_tracks_bytes() {
    let lines: Vec<_> = lines_with_offsets("ab\r\ncd\n\nef").collect();
    assert_eq!(lines, vec![(0, "ab"), (4, "cd"), (7, ""), (8, "ef")]);
  }
}
