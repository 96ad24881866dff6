//! Property tests for gating, citation tracing and confidence bounds.

use auditor_core::assemble::{assemble, confidence};
use auditor_core::types::{RawSignal, Severity, ToolKind};
use auditor_core::{gate, Config, EvidenceItem, GateDecision};
use proptest::prelude::*;

fn tool_strategy() -> impl Strategy<Value = ToolKind> {
  prop_oneof![
    Just(ToolKind::CodeSearch),
    Just(ToolKind::StaticAnalyzer),
    Just(ToolKind::DepCheck),
  ]
}

fn evidence_strategy() -> impl Strategy<Value = Vec<EvidenceItem>> {
  prop::collection::vec(
    (0usize..3, 1u32..50, 0u32..10, 0.0f64..=1.0),
    0..8,
  )
  .prop_map(|items| {
    items
      .into_iter()
      .map(|(file, start, len, sim)| {
        EvidenceItem::new(&format!("src/f{}.py", file), start, start + len, "x", sim)
      })
      .collect()
  })
}

fn signal(tool: ToolKind, path: &str, line_start: u32, line_end: u32, subject: &str) -> RawSignal {
  RawSignal {
    tool,
    category: "code-smell".into(),
    subject: subject.into(),
    description: "marker".into(),
    severity: Severity::Low,
    path: path.into(),
    line_start,
    line_end,
    offset_start: 0,
    offset_end: 0,
  }
}

proptest! {
  #[test]
  fn gate_is_insufficient_below_threshold(
    sims in prop::collection::vec(0.0f64..=1.0, 0..10),
    threshold in 0.0f64..=1.0,
  ) {
    let evidence: Vec<EvidenceItem> = sims
      .iter()
      .enumerate()
      .map(|(i, s)| EvidenceItem::new(&format!("f{}.py", i), 1, 1, "", *s))
      .collect();
    let outcome = gate(&evidence, threshold).unwrap();
    let max = sims.iter().cloned().fold(0.0, f64::max);
    if evidence.is_empty() || max < threshold {
      prop_assert_eq!(outcome.decision, GateDecision::Insufficient);
    } else {
      prop_assert_eq!(outcome.decision, GateDecision::Proceed);
    }
  }

  #[test]
  fn confidence_stays_in_unit_interval(
    s in -2.0f64..3.0,
    c in -2.0f64..3.0,
    w in 0.0f64..=1.0,
  ) {
    let v = confidence(s, c, w);
    prop_assert!((0.0..=1.0).contains(&v));
  }

  #[test]
  fn confidence_is_monotonic_in_similarity(
    a in 0.0f64..=1.0,
    b in 0.0f64..=1.0,
    c in 0.0f64..=1.0,
  ) {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    prop_assert!(confidence(lo, c, 0.5) <= confidence(hi, c, 0.5));
  }

  #[test]
  fn signals_outside_evidence_never_surface(
    evidence in evidence_strategy(),
    tools in prop::collection::vec(tool_strategy(), 1..6),
  ) {
    // Lines 1000+ never intersect the generated evidence ranges.
    let signals: Vec<RawSignal> = tools
      .iter()
      .enumerate()
      .map(|(i, t)| signal(*t, "src/f0.py", 1000 + i as u32, 1001 + i as u32, "TODO"))
      .collect();
    let out = assemble(&signals, &evidence, &Config::default());
    prop_assert!(out.findings.is_empty());
    prop_assert_eq!(out.dropped, signals.len());
  }

  #[test]
  fn every_finding_is_cited_and_bounded(
    evidence in evidence_strategy(),
    raw in prop::collection::vec((tool_strategy(), 0usize..3, 1u32..70, 0u32..5), 0..12),
  ) {
    let signals: Vec<RawSignal> = raw
      .iter()
      .map(|(t, file, start, len)| {
        signal(*t, &format!("src/f{}.py", file), *start, start + len, "TODO")
      })
      .collect();
    let out = assemble(&signals, &evidence, &Config::default());
    prop_assert!(out.findings.len() <= signals.len());
    prop_assert!(out.dropped <= signals.len());
    for f in &out.findings {
      prop_assert!(!f.citations.is_empty());
      prop_assert!((0.0..=1.0).contains(&f.confidence));
      for c in &f.citations {
        prop_assert!(evidence
          .iter()
          .any(|e| e.path == c.path && e.line_start == c.line_start && e.line_end == c.line_end));
      }
    }
    for pair in out.findings.windows(2) {
      prop_assert!(pair[0].confidence >= pair[1].confidence);
    }
  }
}
