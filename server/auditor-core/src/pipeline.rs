//! The auditor: retrieval, gate, dispatch and assembly behind one read-only entry point.

use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{info, warn};

use crate::assemble;
use crate::config::Config;
use crate::error::AuditError;
use crate::evidence;
use crate::gate::{self, GateDecision};
use crate::metrics::CoreMetrics;
use crate::retriever::Retriever;
use crate::safety::{self, Lifecycle, Stage};
use crate::tools::{Dispatcher, ToolContext};
use crate::types::{AnalysisResult, EvidenceItem, PlanStep, Query, RawSignal};

/// Cooperative cancellation for one request. Clones share the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn cancel(&self) {
    self.0.store(true, Ordering::SeqCst);
  }

  pub fn is_cancelled(&self) -> bool {
    self.0.load(Ordering::SeqCst)
  }
}

/// Request pipeline. Holds only immutable configuration, read-only collaborators
/// and shared counters, so one instance can serve concurrent requests.
pub struct Auditor {
  config: Config,
  retriever: Arc<dyn Retriever>,
  dispatcher: Dispatcher,
  metrics: Arc<CoreMetrics>,
}

impl Auditor {
  /// Validate configuration and refuse any collaborator that is not read-only.
  pub fn new(
    config: Config,
    retriever: Arc<dyn Retriever>,
    dispatcher: Dispatcher,
  ) -> Result<Self, AuditError> {
    config.validate()?;
    safety::ensure_read_only(retriever.name(), retriever.access())?;
    for tool in dispatcher.tools() {
      safety::ensure_read_only(tool.kind().as_str(), tool.access())?;
    }
    Ok(Self {
      config,
      retriever,
      dispatcher,
      metrics: Arc::new(CoreMetrics::new()),
    })
  }

  /// Default configuration and the built-in tools.
  pub fn with_defaults(retriever: Arc<dyn Retriever>) -> Result<Self, AuditError> {
    Self::new(Config::default(), retriever, Dispatcher::with_builtin()?)
  }

  /// Share counters with other auditors (e.g. one per request in the gateway).
  pub fn with_metrics(mut self, metrics: Arc<CoreMetrics>) -> Self {
    self.metrics = metrics;
    self
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn metrics(&self) -> &Arc<CoreMetrics> {
    &self.metrics
  }

  /// Run every registered tool over all retrieved evidence.
  pub fn answer(&self, query: &Query, top_k: usize) -> Result<AnalysisResult, AuditError> {
    self.run(query, top_k, None, &CancelToken::new())
  }

  /// Run an externally planned sequence of tool requests. Cancelling `cancel`
  /// abandons the request; no partial result is returned.
  pub fn answer_planned(
    &self,
    query: &Query,
    top_k: usize,
    plan: Option<&[PlanStep]>,
    cancel: &CancelToken,
  ) -> Result<AnalysisResult, AuditError> {
    self.run(query, top_k, plan, cancel)
  }

  fn run(
    &self,
    query: &Query,
    top_k: usize,
    plan: Option<&[PlanStep]>,
    cancel: &CancelToken,
  ) -> Result<AnalysisResult, AuditError> {
    self.metrics.record_request();
    self.check_cancelled(cancel)?;
    let mut lifecycle = Lifecycle::new();
    let mut warnings = Vec::new();
    let threshold = self.config.threshold;

    let raw = match self.retriever.retrieve(query, top_k) {
      Ok(items) => items,
      Err(e) => {
        warn!(retriever = self.retriever.name(), error = %e, "retrieval failed; treating as insufficient evidence");
        self.metrics.record_retriever_failure();
        warnings.push(e.to_string());
        Vec::new()
      }
    };
    let evidence = evidence::prepare(raw, &self.config);

    let outcome = gate::gate(&evidence, threshold)?;
    lifecycle.advance(Stage::Gated)?;
    info!(
      query = %query,
      items = evidence.len(),
      max_similarity = outcome.max_similarity,
      threshold,
      decision = ?outcome.decision,
      "evidence gated"
    );

    if outcome.decision == GateDecision::Insufficient {
      lifecycle.advance(Stage::ShortCircuited)?;
      lifecycle.advance(Stage::Returned)?;
      self.metrics.record_short_circuit();
      return Ok(AnalysisResult::insufficient(
        query,
        outcome.max_similarity,
        threshold,
        warnings,
      ));
    }

    self.check_cancelled(cancel)?;
    lifecycle.advance(Stage::Dispatched)?;

    let default_plan: Vec<PlanStep>;
    let steps: &[PlanStep] = match plan {
      Some(steps) => steps,
      None => {
        default_plan = self
          .dispatcher
          .registered()
          .into_iter()
          .map(|kind| PlanStep::new(kind.as_str()))
          .collect();
        &default_plan
      }
    };

    let ctx = ToolContext {
      query,
      config: &self.config,
    };
    let outputs: Vec<Result<Vec<RawSignal>, AuditError>> = steps
      .par_iter()
      .map(|step| {
        if cancel.is_cancelled() {
          return Err(AuditError::Cancelled);
        }
        let subset = select(&evidence, &step.paths);
        self.dispatcher.dispatch(&step.tool, &ctx, &subset)
      })
      .collect();
    self.check_cancelled(cancel)?;

    let mut signals = Vec::new();
    for output in outputs {
      match output {
        Ok(s) => signals.extend(s),
        Err(AuditError::UnknownTool(name)) => {
          warn!(tool = %name, "plan step names an unregistered tool; skipped");
          self.metrics.record_unknown_tool();
          warnings.push(format!("unknown tool: {}", name));
        }
        Err(AuditError::Cancelled) => {
          self.metrics.record_cancelled();
          return Err(AuditError::Cancelled);
        }
        Err(e) => return Err(e),
      }
    }

    let assembly = assemble::assemble(&signals, &evidence, &self.config);
    if assembly.dropped > 0 {
      self.metrics.record_dropped_signals(assembly.dropped);
    }
    lifecycle.advance(Stage::Assembled)?;
    self.check_cancelled(cancel)?;

    lifecycle.advance(Stage::Returned)?;
    self.metrics.record_findings(assembly.findings.len());
    info!(
      signals = signals.len(),
      findings = assembly.findings.len(),
      dropped = assembly.dropped,
      "findings assembled"
    );
    Ok(AnalysisResult::sufficient(
      query,
      outcome.max_similarity,
      threshold,
      assembly.findings,
      evidence.len(),
      warnings,
    ))
  }

  fn check_cancelled(&self, cancel: &CancelToken) -> Result<(), AuditError> {
    if cancel.is_cancelled() {
      self.metrics.record_cancelled();
      return Err(AuditError::Cancelled);
    }
    Ok(())
  }
}

/// Evidence subset named by a plan step; every item when `paths` is empty.
fn select<'a>(evidence: &'a [EvidenceItem], paths: &[String]) -> Cow<'a, [EvidenceItem]> {
  if paths.is_empty() {
    return Cow::Borrowed(evidence);
  }
  let wanted: Vec<String> = paths.iter().map(|p| evidence::normalize_path(p)).collect();
  Cow::Owned(
    evidence
      .iter()
      .filter(|item| wanted.iter().any(|w| *w == item.path))
      .cloned()
      .collect(),
  )
}

/// One-shot form of [`Auditor::answer`].
pub fn answer(
  query: &Query,
  top_k: usize,
  retriever: Arc<dyn Retriever>,
  tools: Dispatcher,
  config: Config,
) -> Result<AnalysisResult, AuditError> {
  Auditor::new(config, retriever, tools)?.answer(query, top_k)
}
