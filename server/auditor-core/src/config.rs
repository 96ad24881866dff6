//! Auditor configuration with sane defaults.
//!
//! A `Config` is an immutable value handed to the pipeline constructor. It can be
//! loaded from TOML (every field optional) and is validated before use; an invalid
//! threshold or weight is a startup failure.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::AuditError;
use crate::types::{Severity, ToolKind};

pub const CONFIG_PATH_ENV: &str = "AUDITOR_CONFIG";
pub const THRESHOLD_ENV: &str = "AUDITOR_THRESHOLD";

/// Tunable guardrails and tool settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Minimum best-evidence similarity required to answer (0..1).
  pub threshold: f64,
  /// Weight of evidence similarity vs. tool certainty in finding confidence (0..1).
  pub similarity_weight: f64,
  pub tool_certainty: ToolCertainty,
  /// Evidence budget: highest-ranked items kept after filtering.
  pub max_evidence_items: usize,
  /// Evidence budget: total excerpt characters kept.
  pub max_evidence_chars: usize,
  pub analyzable_extensions: Vec<String>,
  /// File names analyzed regardless of extension (dependency manifests).
  pub manifest_names: Vec<String>,
  pub ignored_dirs: Vec<String>,
  /// Extra literal keywords for CODE_SEARCH besides the query terms.
  pub search_patterns: Vec<String>,
  pub risky_dependencies: Vec<RiskyDependency>,
}

/// Intrinsic certainty per tool (0..1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolCertainty {
  pub code_search: f64,
  pub static_analyzer: f64,
  pub dep_check: f64,
}

impl Default for ToolCertainty {
  fn default() -> Self {
    Self {
      code_search: 0.5,
      static_analyzer: 0.6,
      dep_check: 0.8,
    }
  }
}

/// One entry of the risky/outdated dependency list.
///
/// With neither `exact` nor `below` set, every version of `name` is flagged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskyDependency {
  pub name: String,
  #[serde(default)]
  pub exact: Option<String>,
  #[serde(default)]
  pub below: Option<String>,
  pub reason: String,
  #[serde(default = "default_dependency_severity")]
  pub severity: Severity,
}

fn default_dependency_severity() -> Severity {
  Severity::Medium
}

impl RiskyDependency {
  fn below(name: &str, version: &str, reason: &str, severity: Severity) -> Self {
    Self {
      name: name.into(),
      exact: None,
      below: Some(version.into()),
      reason: reason.into(),
      severity,
    }
  }

  fn exact(name: &str, version: &str, reason: &str, severity: Severity) -> Self {
    Self {
      name: name.into(),
      exact: Some(version.into()),
      below: None,
      reason: reason.into(),
      severity,
    }
  }

  fn any(name: &str, reason: &str, severity: Severity) -> Self {
    Self {
      name: name.into(),
      exact: None,
      below: None,
      reason: reason.into(),
      severity,
    }
  }
}

fn strings(items: &[&str]) -> Vec<String> {
  items.iter().map(|s| s.to_string()).collect()
}

impl Default for Config {
  fn default() -> Self {
    Self {
      threshold: 0.7,
      similarity_weight: 0.5,
      tool_certainty: ToolCertainty::default(),
      max_evidence_items: 30,
      max_evidence_chars: 200_000,
      analyzable_extensions: strings(&[
        ".py", ".js", ".ts", ".jsx", ".tsx", ".java", ".cpp", ".c", ".h", ".cs", ".rb", ".go",
        ".rs", ".php", ".md", ".txt", ".json", ".yaml", ".yml", ".toml", ".lock", ".cfg", ".ini",
      ]),
      manifest_names: strings(&[
        "requirements.txt",
        "package.json",
        "cargo.toml",
        "pyproject.toml",
        "go.mod",
        "gemfile",
        "pipfile",
      ]),
      ignored_dirs: strings(&[".git", "node_modules", "venv", "__pycache__", ".next", "target"]),
      search_patterns: Vec::new(),
      risky_dependencies: vec![
        RiskyDependency::below("requests", "2.20.0", "outdated: leaks credentials on redirect (CVE-2018-18074)", Severity::Medium),
        RiskyDependency::below("urllib3", "1.26.5", "outdated: ReDoS in URL authority parsing", Severity::Medium),
        RiskyDependency::below("pyyaml", "5.4", "outdated: arbitrary code execution via full_load", Severity::High),
        RiskyDependency::below("jinja2", "2.11.3", "outdated: ReDoS in urlize filter", Severity::Low),
        RiskyDependency::below("django", "3.2", "unsupported release line", Severity::Medium),
        RiskyDependency::below("flask", "1.0", "unsupported release line", Severity::Low),
        RiskyDependency::below("lodash", "4.17.21", "outdated: prototype pollution", Severity::High),
        RiskyDependency::below("minimist", "1.2.6", "outdated: prototype pollution", Severity::Medium),
        RiskyDependency::exact("event-stream", "3.3.6", "compromised release (flatmap-stream backdoor)", Severity::High),
        RiskyDependency::any("left-pad", "unpublished package; pin or vendor", Severity::Low),
        RiskyDependency::below("openssl", "0.10.55", "outdated: memory safety advisories", Severity::Medium),
      ],
    }
  }
}

impl Config {
  /// Reject out-of-range thresholds, weights and budgets.
  pub fn validate(&self) -> Result<(), AuditError> {
    unit_interval("threshold", self.threshold)?;
    unit_interval("similarity_weight", self.similarity_weight)?;
    unit_interval("tool_certainty.code_search", self.tool_certainty.code_search)?;
    unit_interval("tool_certainty.static_analyzer", self.tool_certainty.static_analyzer)?;
    unit_interval("tool_certainty.dep_check", self.tool_certainty.dep_check)?;
    if self.max_evidence_items == 0 {
      return Err(AuditError::configuration("max_evidence_items", "must be greater than 0"));
    }
    if self.max_evidence_chars == 0 {
      return Err(AuditError::configuration("max_evidence_chars", "must be greater than 0"));
    }
    if self.risky_dependencies.iter().any(|d| d.name.trim().is_empty()) {
      return Err(AuditError::configuration("risky_dependencies[].name", "must not be empty"));
    }
    Ok(())
  }

  /// Copy with a per-request threshold, re-validated.
  pub fn with_threshold(&self, threshold: f64) -> Result<Self, AuditError> {
    let config = Self {
      threshold,
      ..self.clone()
    };
    config.validate()?;
    Ok(config)
  }

  pub fn from_toml_str(raw: &str) -> Result<Self, AuditError> {
    let config: Config = toml::from_str(raw)?;
    config.validate()?;
    Ok(config)
  }

  pub fn load(path: impl AsRef<Path>) -> Result<Self, AuditError> {
    let raw = std::fs::read_to_string(path)?;
    Self::from_toml_str(&raw)
  }

  /// Defaults, or the file named by `AUDITOR_CONFIG`, then `AUDITOR_THRESHOLD` on top.
  pub fn from_env() -> Result<Self, AuditError> {
    let mut config = match std::env::var(CONFIG_PATH_ENV) {
      Ok(path) if !path.is_empty() => Self::load(path)?,
      _ => Self::default(),
    };
    if let Ok(raw) = std::env::var(THRESHOLD_ENV) {
      config.threshold = raw
        .trim()
        .parse()
        .map_err(|_| AuditError::configuration("threshold", "AUDITOR_THRESHOLD is not a number"))?;
    }
    config.validate()?;
    Ok(config)
  }

  pub fn certainty(&self, tool: ToolKind) -> f64 {
    match tool {
      ToolKind::CodeSearch => self.tool_certainty.code_search,
      ToolKind::StaticAnalyzer => self.tool_certainty.static_analyzer,
      ToolKind::DepCheck => self.tool_certainty.dep_check,
    }
  }
}

fn unit_interval(field: &str, value: f64) -> Result<(), AuditError> {
  if value.is_finite() && (0.0..=1.0).contains(&value) {
    Ok(())
  } else {
    Err(AuditError::configuration(field, "must lie in [0, 1]"))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_are_valid() {
    let config = Config::default();
    config.validate().unwrap();
    assert!((config.threshold - 0.7).abs() < f64::EPSILON);
    assert!((config.certainty(ToolKind::DepCheck) - 0.8).abs() < f64::EPSILON);
  }

  #[test]
  fn threshold_out_of_range_fails_fast() {
    let err = Config::default().with_threshold(1.2).unwrap_err();
    assert!(matches!(err, AuditError::Configuration { ref field, .. } if field == "threshold"));
    assert!(Config::default().with_threshold(f64::NAN).is_err());
    assert!(Config::default().with_threshold(-0.01).is_err());
    assert!(Config::default().with_threshold(0.0).is_ok());
    assert!(Config::default().with_threshold(1.0).is_ok());
  }

  #[test]
  fn partial_toml_keeps_defaults() {
    let config = Config::from_toml_str(
      r#"
      threshold = 0.55

      [tool_certainty]
      dep_check = 0.9

      [[risky_dependencies]]
      name = "leftpad"
      reason = "banned"
      "#,
    )
    .unwrap();
    assert!((config.threshold - 0.55).abs() < f64::EPSILON);
    assert!((config.tool_certainty.dep_check - 0.9).abs() < f64::EPSILON);
    assert!((config.tool_certainty.static_analyzer - 0.6).abs() < f64::EPSILON);
    assert_eq!(config.risky_dependencies.len(), 1);
    assert_eq!(config.risky_dependencies[0].severity, Severity::Medium);
    assert_eq!(config.max_evidence_items, 30);
  }

  #[test]
  fn invalid_weight_in_toml_is_rejected() {
    let err = Config::from_toml_str("[tool_certainty]\ncode_search = 2.0\n").unwrap_err();
    assert!(err.to_string().contains("tool_certainty.code_search"));
  }
}
