//! Process-wide counters for the auditor. Monotonic, lock-free.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

pub const METRIC_SUBSYSTEM: &str = "auditor";

#[derive(Debug, Default)]
pub struct CoreMetrics {
  requests: AtomicU64,
  short_circuited: AtomicU64,
  findings: AtomicU64,
  dropped_signals: AtomicU64,
  retriever_failures: AtomicU64,
  unknown_tools: AtomicU64,
  cancelled: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
  pub requests_total: u64,
  pub short_circuited_total: u64,
  pub findings_total: u64,
  pub dropped_signals_total: u64,
  pub retriever_failures_total: u64,
  pub unknown_tool_total: u64,
  pub cancelled_total: u64,
}

impl CoreMetrics {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn record_request(&self) {
    self.requests.fetch_add(1, Ordering::Relaxed);
  }

  pub fn record_short_circuit(&self) {
    self.short_circuited.fetch_add(1, Ordering::Relaxed);
  }

  pub fn record_findings(&self, n: usize) {
    self.findings.fetch_add(n as u64, Ordering::Relaxed);
  }

  /// Signals that could not be traced to any evidence item.
  pub fn record_dropped_signals(&self, n: usize) {
    self.dropped_signals.fetch_add(n as u64, Ordering::Relaxed);
  }

  pub fn record_retriever_failure(&self) {
    self.retriever_failures.fetch_add(1, Ordering::Relaxed);
  }

  pub fn record_unknown_tool(&self) {
    self.unknown_tools.fetch_add(1, Ordering::Relaxed);
  }

  pub fn record_cancelled(&self) {
    self.cancelled.fetch_add(1, Ordering::Relaxed);
  }

  pub fn snapshot(&self) -> MetricsSnapshot {
    MetricsSnapshot {
      requests_total: self.requests.load(Ordering::Relaxed),
      short_circuited_total: self.short_circuited.load(Ordering::Relaxed),
      findings_total: self.findings.load(Ordering::Relaxed),
      dropped_signals_total: self.dropped_signals.load(Ordering::Relaxed),
      retriever_failures_total: self.retriever_failures.load(Ordering::Relaxed),
      unknown_tool_total: self.unknown_tools.load(Ordering::Relaxed),
      cancelled_total: self.cancelled.load(Ordering::Relaxed),
    }
  }
}

impl MetricsSnapshot {
  /// Prometheus text exposition.
  pub fn render_prometheus(&self) -> String {
    let rows: [(&str, &str, u64); 7] = [
      ("requests_total", "Analysis requests received", self.requests_total),
      ("short_circuited_total", "Requests answered INSUFFICIENT_EVIDENCE", self.short_circuited_total),
      ("findings_total", "Findings emitted", self.findings_total),
      ("dropped_signals_total", "Tool signals dropped for lack of a citation", self.dropped_signals_total),
      ("retriever_failures_total", "Retriever backend failures", self.retriever_failures_total),
      ("unknown_tool_total", "Plan steps naming an unregistered tool", self.unknown_tool_total),
      ("cancelled_total", "Requests cancelled before completion", self.cancelled_total),
    ];
    let mut body = String::new();
    for (name, help, value) in rows {
      body.push_str(&format!("# HELP {METRIC_SUBSYSTEM}_{name} {help}\n"));
      body.push_str(&format!("# TYPE {METRIC_SUBSYSTEM}_{name} counter\n"));
      body.push_str(&format!("{METRIC_SUBSYSTEM}_{name} {value}\n"));
    }
    body
  }
}
