//! Finding assembly: trace raw signals to evidence, group, score and order.
//!
//! This is where the explainability guardrail is enforced. A signal that does not
//! overlap any evidence item is dropped and counted; it never becomes a Finding.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::config::Config;
use crate::evidence::normalize_path;
use crate::types::{EvidenceItem, Finding, RawSignal, Severity, ToolKind};

/// Findings plus the number of untraceable signals that were dropped.
#[derive(Debug, Clone, Default)]
pub struct Assembly {
  pub findings: Vec<Finding>,
  pub dropped: usize,
}

struct Group<'a> {
  description: &'a str,
  severity: Severity,
  cited: BTreeSet<usize>,
}

/// Build cited findings from `raw_signals` over `evidence` (already in ranking order).
///
/// Signals group on (category, subject, tool), not category alone: two `eval`
/// hits merge into one finding, while an `eval` hit and a `pickle` hit stay
/// separate findings, and two tools flagging the same excerpt give two findings.
pub fn assemble(raw_signals: &[RawSignal], evidence: &[EvidenceItem], config: &Config) -> Assembly {
  let mut groups: BTreeMap<(&str, &str, ToolKind), Group<'_>> = BTreeMap::new();
  let mut dropped = 0usize;

  for signal in raw_signals {
    let path = normalize_path(&signal.path);
    let (lo, hi) = if signal.line_start <= signal.line_end {
      (signal.line_start, signal.line_end)
    } else {
      (signal.line_end, signal.line_start)
    };
    let cited: Vec<usize> = evidence
      .iter()
      .enumerate()
      .filter(|(_, item)| item.overlaps(&path, lo, hi))
      .map(|(i, _)| i)
      .collect();

    if cited.is_empty() {
      dropped += 1;
      debug!(
        tool = %signal.tool,
        category = %signal.category,
        path = %signal.path,
        line = signal.line_start,
        "dropping signal with no overlapping evidence"
      );
      continue;
    }

    let group = groups
      .entry((signal.category.as_str(), signal.subject.as_str(), signal.tool))
      .or_insert_with(|| Group {
        description: signal.description.as_str(),
        severity: signal.severity,
        cited: BTreeSet::new(),
      });
    group.severity = group.severity.max(signal.severity);
    group.cited.extend(cited);
  }

  let mut findings: Vec<Finding> = groups
    .into_iter()
    .filter_map(|((category, subject, tool), group)| {
      let citations: Vec<_> = group.cited.iter().map(|&i| evidence[i].citation()).collect();
      if citations.is_empty() {
        return None;
      }
      let similarity = group
        .cited
        .iter()
        .map(|&i| evidence[i].similarity)
        .fold(0.0, f64::max);
      let confidence = confidence(similarity, config.certainty(tool), config.similarity_weight);
      Some(Finding {
        id: finding_id(category, subject, tool, &citations),
        category: category.to_string(),
        severity: group.severity,
        description: group.description.to_string(),
        confidence,
        citations,
      })
    })
    .collect();

  findings.sort_by(compare_findings);
  Assembly { findings, dropped }
}

/// Weighted average of evidence similarity and tool certainty, clamped to [0, 1]
/// and rounded to 4 decimals. Monotonic in both inputs.
pub fn confidence(similarity: f64, certainty: f64, similarity_weight: f64) -> f64 {
  let s = sanitize(similarity);
  let c = sanitize(certainty);
  let w = sanitize(similarity_weight);
  let combined = (w * s + (1.0 - w) * c).clamp(0.0, 1.0);
  (combined * 10_000.0).round() / 10_000.0
}

fn sanitize(v: f64) -> f64 {
  if v.is_nan() {
    0.0
  } else {
    v.clamp(0.0, 1.0)
  }
}

/// Stable id: blake3 over category, subject, tool and citations.
fn finding_id(category: &str, subject: &str, tool: ToolKind, citations: &[crate::types::Citation]) -> String {
  let mut hasher = blake3::Hasher::new();
  hasher.update(category.as_bytes());
  hasher.update(b"|");
  hasher.update(subject.as_bytes());
  hasher.update(b"|");
  hasher.update(tool.as_str().as_bytes());
  for c in citations {
    hasher.update(b"|");
    hasher.update(format!("{}:{}-{}", c.path, c.line_start, c.line_end).as_bytes());
  }
  let hex = hasher.finalize().to_hex();
  format!("fnd-{}", &hex[..16])
}

/// Confidence desc, then category, first citation path and line, then id.
fn compare_findings(a: &Finding, b: &Finding) -> Ordering {
  b.confidence
    .partial_cmp(&a.confidence)
    .unwrap_or(Ordering::Equal)
    .then_with(|| a.category.cmp(&b.category))
    .then_with(|| first_citation(a).cmp(&first_citation(b)))
    .then_with(|| a.id.cmp(&b.id))
}

fn first_citation(f: &Finding) -> (&str, u32) {
  f.citations
    .first()
    .map(|c| (c.path.as_str(), c.line_start))
    .unwrap_or(("", 0))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::category;

  fn signal(tool: ToolKind, cat: &str, subject: &str, path: &str, line: u32) -> RawSignal {
    RawSignal {
      tool,
      category: cat.into(),
      subject: subject.into(),
      description: format!("{} in {}", subject, path),
      severity: Severity::Low,
      path: path.into(),
      line_start: line,
      line_end: line,
      offset_start: 0,
      offset_end: 1,
    }
  }

  fn ev(path: &str, start: u32, end: u32, sim: f64) -> EvidenceItem {
    EvidenceItem::new(path, start, end, "text", sim)
  }

  #[test]
  fn confidence_boundaries() {
    assert_eq!(confidence(0.0, 0.0, 0.5), 0.0);
    assert_eq!(confidence(1.0, 1.0, 0.5), 1.0);
    assert_eq!(confidence(1.0, 0.0, 1.0), 1.0);
    assert_eq!(confidence(0.0, 1.0, 1.0), 0.0);
    assert_eq!(confidence(0.9, 0.8, 0.5), 0.85);
    assert_eq!(confidence(2.0, 5.0, 0.5), 1.0);
  }

  #[test]
  fn confidence_is_monotonic() {
    assert!(confidence(0.6, 0.5, 0.5) < confidence(0.7, 0.5, 0.5));
    assert!(confidence(0.6, 0.5, 0.5) < confidence(0.6, 0.9, 0.5));
  }

  #[test]
  fn untraceable_signals_are_dropped() {
    let evidence = vec![ev("a.py", 10, 20, 0.9)];
    let signals = vec![
      signal(ToolKind::StaticAnalyzer, category::CODE_SMELL, "TODO", "a.py", 30),
      signal(ToolKind::StaticAnalyzer, category::CODE_SMELL, "TODO", "b.py", 15),
    ];
    let out = assemble(&signals, &evidence, &Config::default());
    assert!(out.findings.is_empty());
    assert_eq!(out.dropped, 2);
  }

  #[test]
  fn same_subject_merges_citations_in_evidence_order() {
    let evidence = vec![ev("b.py", 1, 5, 0.95), ev("a.py", 1, 5, 0.8)];
    let signals = vec![
      signal(ToolKind::StaticAnalyzer, category::CODE_SMELL, "TODO", "a.py", 2),
      signal(ToolKind::StaticAnalyzer, category::CODE_SMELL, "TODO", "b.py", 3),
      signal(ToolKind::StaticAnalyzer, category::CODE_SMELL, "TODO", "./b.py", 4),
    ];
    let out = assemble(&signals, &evidence, &Config::default());
    assert_eq!(out.findings.len(), 1);
    let f = &out.findings[0];
    assert_eq!(f.citations.len(), 2);
    assert_eq!(f.citations[0].path, "b.py");
    assert_eq!(f.description, "TODO in a.py");
    // similarity of the best cited item (0.95) with STATIC_ANALYZER certainty 0.6
    assert_eq!(f.confidence, 0.775);
  }

  #[test]
  fn ordering_is_confidence_then_category() {
    let evidence = vec![ev("a.py", 1, 10, 0.9)];
    let signals = vec![
      signal(ToolKind::CodeSearch, category::QUERY_MATCH, "auth", "a.py", 1),
      signal(ToolKind::StaticAnalyzer, category::SECURITY_KEYWORD, "eval", "a.py", 2),
      signal(ToolKind::StaticAnalyzer, category::CODE_SMELL, "TODO", "a.py", 3),
    ];
    let out = assemble(&signals, &evidence, &Config::default());
    let cats: Vec<_> = out.findings.iter().map(|f| f.category.as_str()).collect();
    assert_eq!(cats, vec!["code-smell", "security-keyword", "query-match"]);
    assert!(out.findings[0].id.starts_with("fnd-"));
    assert_eq!(out.findings[0].id.len(), 20);
  }

  #[test]
  fn group_severity_is_maximum() {
    let evidence = vec![ev("a.py", 1, 10, 0.9)];
    let mut high = signal(ToolKind::StaticAnalyzer, category::SECURITY_KEYWORD, "eval", "a.py", 2);
    high.severity = Severity::High;
    let low = signal(ToolKind::StaticAnalyzer, category::SECURITY_KEYWORD, "eval", "a.py", 3);
    let out = assemble(&[low, high], &evidence, &Config::default());
    assert_eq!(out.findings[0].severity, Severity::High);
  }

  #[test]
  fn distinct_subjects_and_tools_stay_separate() {
    let evidence = vec![ev("a.py", 1, 10, 0.9)];
    let signals = vec![
      signal(ToolKind::StaticAnalyzer, category::SECURITY_KEYWORD, "eval", "a.py", 2),
      signal(ToolKind::StaticAnalyzer, category::SECURITY_KEYWORD, "eval", "a.py", 6),
      signal(ToolKind::StaticAnalyzer, category::SECURITY_KEYWORD, "pickle", "a.py", 4),
      signal(ToolKind::CodeSearch, category::SECURITY_KEYWORD, "eval", "a.py", 2),
    ];
    let out = assemble(&signals, &evidence, &Config::default());
    assert_eq!(out.findings.len(), 3);
    let eval_groups = out
      .findings
      .iter()
      .filter(|f| f.description == "eval in a.py")
      .count();
    assert_eq!(eval_groups, 2);
  }
}
