//! Core types for the auditor (JSON contracts + internal models).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::AuditError;

// ---------------------------------------------------------------------------
// Inbound types (JSON contract: what the caller sends)
// ---------------------------------------------------------------------------

/// Request parameters accepted at the boundary. Unknown fields are silently ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
  pub query: String,
  pub top_k: usize,
  #[serde(default)]
  pub threshold: Option<f64>,
  /// Ordered tool requests from an external planner. `None` runs every tool.
  #[serde(default)]
  pub plan: Option<Vec<PlanStep>>,
}

impl AnalyzeRequest {
  /// Validate boundary fields before the core is invoked.
  pub fn validate(&self) -> Result<Query, AuditError> {
    if self.top_k == 0 {
      return Err(AuditError::validation("top_k", "must be greater than 0"));
    }
    if let Some(t) = self.threshold {
      if !t.is_finite() || !(0.0..=1.0).contains(&t) {
        return Err(AuditError::validation("threshold", "must lie in [0, 1]"));
      }
    }
    if let Some(plan) = &self.plan {
      if plan.iter().any(|s| s.tool.trim().is_empty()) {
        return Err(AuditError::validation("plan[].tool", "must not be empty"));
      }
    }
    Query::new(&self.query)
  }
}

/// Subprocess input: request parameters plus the evidence already retrieved for them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Input {
  #[serde(flatten)]
  pub request: AnalyzeRequest,
  #[serde(default)]
  pub evidence: Vec<EvidenceItem>,
}

/// One planner step: which tool to run and over which evidence paths (empty = all).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
  pub tool: String,
  #[serde(default)]
  pub paths: Vec<String>,
}

impl PlanStep {
  pub fn new(tool: impl Into<String>) -> Self {
    Self {
      tool: tool.into(),
      paths: Vec::new(),
    }
  }

  pub fn with_paths(mut self, paths: &[&str]) -> Self {
    self.paths = paths.iter().map(|p| p.to_string()).collect();
    self
  }
}

/// Free-text user request. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Query(String);

impl Query {
  pub fn new(text: &str) -> Result<Self, AuditError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
      return Err(AuditError::validation("query", "must not be empty"));
    }
    Ok(Self(trimmed.to_string()))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for Query {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

// ---------------------------------------------------------------------------
// Evidence
// ---------------------------------------------------------------------------

/// A retrieved excerpt with its similarity score. Lines are 1-based and inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
  pub path: String,
  pub line_start: u32,
  pub line_end: u32,
  pub text: String,
  pub similarity: f64,
}

impl EvidenceItem {
  pub fn new(path: &str, line_start: u32, line_end: u32, text: &str, similarity: f64) -> Self {
    Self {
      path: path.to_string(),
      line_start,
      line_end,
      text: text.to_string(),
      similarity,
    }
  }

  /// Same path and intersecting line ranges.
  pub fn overlaps(&self, path: &str, line_start: u32, line_end: u32) -> bool {
    self.path == path && self.line_start <= line_end && line_start <= self.line_end
  }

  /// Absolute line number of a byte offset inside `text`.
  pub fn line_at(&self, offset: usize) -> u32 {
    let end = offset.min(self.text.len());
    let newlines = self.text.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count();
    self.line_start.saturating_add(newlines as u32)
  }

  pub fn citation(&self) -> Citation {
    Citation {
      path: self.path.clone(),
      line_start: self.line_start,
      line_end: self.line_end,
    }
  }
}

// ---------------------------------------------------------------------------
// Tools and raw signals
// ---------------------------------------------------------------------------

/// Registered analysis capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToolKind {
  CodeSearch,
  StaticAnalyzer,
  DepCheck,
}

impl ToolKind {
  pub const ALL: [ToolKind; 3] = [Self::CodeSearch, Self::StaticAnalyzer, Self::DepCheck];

  /// Parse a planner-supplied tool name; accepts `CODE_SEARCH`, `code-search`, `codesearch`.
  pub fn parse(name: &str) -> Result<Self, AuditError> {
    let key: String = name
      .trim()
      .chars()
      .filter(|c| *c != '_' && *c != '-' && !c.is_whitespace())
      .collect::<String>()
      .to_ascii_lowercase();
    match key.as_str() {
      "codesearch" => Ok(Self::CodeSearch),
      "staticanalyzer" | "staticanalysis" => Ok(Self::StaticAnalyzer),
      "depcheck" | "dependencycheck" => Ok(Self::DepCheck),
      _ => Err(AuditError::UnknownTool(name.to_string())),
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::CodeSearch => "CODE_SEARCH",
      Self::StaticAnalyzer => "STATIC_ANALYZER",
      Self::DepCheck => "DEP_CHECK",
    }
  }
}

impl fmt::Display for ToolKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
  Low,
  Medium,
  High,
}

/// Finding categories emitted by the built-in tools.
pub mod category {
  pub const QUERY_MATCH: &str = "query-match";
  pub const CODE_SMELL: &str = "code-smell";
  pub const SECURITY_KEYWORD: &str = "security-keyword";
  pub const DOCUMENTATION_GAP: &str = "documentation-gap";
  pub const RISKY_DEPENDENCY: &str = "risky-dependency";
  pub const PERFORMANCE: &str = "performance";
}

/// Uncited tool output. Becomes a Finding only if it can be traced to evidence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawSignal {
  pub tool: ToolKind,
  pub category: String,
  /// Grouping key within a category (keyword, dependency name, ...).
  pub subject: String,
  pub description: String,
  pub severity: Severity,
  pub path: String,
  pub line_start: u32,
  pub line_end: u32,
  /// Byte offsets of the match inside the originating excerpt.
  pub offset_start: usize,
  pub offset_end: usize,
}

// ---------------------------------------------------------------------------
// Output types (JSON contract: what we emit)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Citation {
  pub path: String,
  pub line_start: u32,
  pub line_end: u32,
}

/// A single structured, cited claim. `citations` is never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
  pub id: String,
  pub category: String,
  pub severity: Severity,
  pub description: String,
  pub confidence: f64,
  pub citations: Vec<Citation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
  Sufficient,
  InsufficientEvidence,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
  pub total_findings: usize,
  pub high_severity: usize,
  pub by_category: BTreeMap<String, usize>,
  /// Evidence items the tools ran over (0 when the gate short-circuits).
  pub evidence_analyzed: usize,
}

impl Summary {
  pub fn from_findings(findings: &[Finding], evidence_analyzed: usize) -> Self {
    let mut by_category = BTreeMap::new();
    for f in findings {
      *by_category.entry(f.category.clone()).or_insert(0) += 1;
    }
    Self {
      total_findings: findings.len(),
      high_severity: findings.iter().filter(|f| f.severity == Severity::High).count(),
      by_category,
      evidence_analyzed,
    }
  }
}

/// Terminal output of one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
  pub status: Status,
  pub query: String,
  pub max_similarity: f64,
  pub threshold: f64,
  pub findings: Vec<Finding>,
  pub summary: Summary,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub warnings: Vec<String>,
}

impl AnalysisResult {
  pub fn insufficient(query: &Query, max_similarity: f64, threshold: f64, warnings: Vec<String>) -> Self {
    Self {
      status: Status::InsufficientEvidence,
      query: query.as_str().to_string(),
      max_similarity,
      threshold,
      findings: Vec::new(),
      summary: Summary::default(),
      warnings,
    }
  }

  pub fn sufficient(
    query: &Query,
    max_similarity: f64,
    threshold: f64,
    findings: Vec<Finding>,
    evidence_analyzed: usize,
    warnings: Vec<String>,
  ) -> Self {
    let summary = Summary::from_findings(&findings, evidence_analyzed);
    Self {
      status: Status::Sufficient,
      query: query.as_str().to_string(),
      max_similarity,
      threshold,
      findings,
      summary,
      warnings,
    }
  }
}

// ---------------------------------------------------------------------------
// CLI stream wrappers
// ---------------------------------------------------------------------------

/// Structured error output for rejected requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorOutput {
  pub error: bool,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub field: Option<String>,
}

impl ErrorOutput {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      error: true,
      message: message.into(),
      field: None,
    }
  }

  pub fn with_field(mut self, field: impl Into<String>) -> Self {
    self.field = Some(field.into());
    self
  }

  /// Map an error to its wire form, keeping the field name for validation failures.
  pub fn from_error(err: &AuditError) -> Self {
    match err {
      AuditError::Validation { field, reason } | AuditError::Configuration { field, reason } => {
        Self::new(reason.clone()).with_field(field.clone())
      }
      _ => Self::new(err.to_string()),
    }
  }
}
