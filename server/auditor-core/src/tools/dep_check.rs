//! DEP_CHECK: parse manifest-like excerpts and flag risky or outdated dependencies.
//!
//! Understands requirements.txt / PEP 508 strings, package.json entries,
//! Cargo.toml / poetry tables and go.mod requires. Only entries named in the
//! configured risky list produce signals.

use std::cmp::Ordering;

use regex::Regex;

use super::{lines_with_offsets, signal_at, AnalysisTool, SignalSpec, ToolContext};
use crate::config::{Config, RiskyDependency};
use crate::error::AuditError;
use crate::types::{category, EvidenceItem, RawSignal, ToolKind};

/// One dependency declaration found on a manifest line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEntry {
  /// Lowercased, `_` folded to `-`.
  pub name: String,
  pub op: String,
  pub version: String,
  /// Byte range of the declaration within its line.
  pub start: usize,
  pub end: usize,
}

pub struct DepCheck {
  json_entry: Regex,
  requirement: Regex,
  toml_entry: Regex,
  go_require: Regex,
}

impl DepCheck {
  pub fn new() -> Result<Self, AuditError> {
    Ok(Self {
      json_entry: Regex::new(
        r#"^\s*"(@?[A-Za-z0-9][A-Za-z0-9._/-]*)"\s*:\s*"\s*([\^~=<>]*)\s*v?([0-9][A-Za-z0-9.+-]*)[^"]*""#,
      )?,
      requirement: Regex::new(
        r#"^\s*["']?([A-Za-z0-9][A-Za-z0-9._-]*)(?:\[[^\]]*\])?\s*(===|==|~=|>=|<=|!=|>|<)\s*v?([0-9][A-Za-z0-9.+-]*)"#,
      )?,
      toml_entry: Regex::new(
        r#"^\s*([A-Za-z0-9][A-Za-z0-9_-]*)\s*=\s*(?:\{[^}]*?\bversion\s*=\s*)?"\s*([\^~=<>]*)\s*([0-9][A-Za-z0-9.+-]*)""#,
      )?,
      go_require: Regex::new(
        r"^\s*(?:require\s+)?([a-z0-9.-]+\.[a-z]+/[A-Za-z0-9._/-]+)\s+v([0-9][A-Za-z0-9.+-]*)",
      )?,
    })
  }

  /// Parse a single manifest line; first matching syntax wins.
  pub fn parse_line(&self, line: &str) -> Option<DependencyEntry> {
    if let Some(c) = self.json_entry.captures(line) {
      return Some(entry(&c[1], &c[2], &c[3], &c));
    }
    if let Some(c) = self.requirement.captures(line) {
      return Some(entry(&c[1], &c[2], &c[3], &c));
    }
    if let Some(c) = self.toml_entry.captures(line) {
      return Some(entry(&c[1], &c[2], &c[3], &c));
    }
    if let Some(c) = self.go_require.captures(line) {
      return Some(entry(&c[1], "", &c[2], &c));
    }
    None
  }

  /// Every declaration in `text` with its line's byte offset.
  pub fn entries(&self, text: &str) -> Vec<(usize, DependencyEntry)> {
    lines_with_offsets(text)
      .filter(|(_, line)| !is_comment(line))
      .filter_map(|(offset, line)| self.parse_line(line).map(|e| (offset, e)))
      .collect()
  }

  /// First configured rule that flags `dep`, if any.
  pub fn flag<'c>(&self, dep: &DependencyEntry, config: &'c Config) -> Option<&'c RiskyDependency> {
    config.risky_dependencies.iter().find(|rule| {
      if normalize_name(&rule.name) != dep.name {
        return false;
      }
      match (&rule.exact, &rule.below) {
        (Some(exact), _) => exact.trim().trim_start_matches('v') == dep.version,
        (None, Some(below)) => version_lt(&dep.version, below.trim().trim_start_matches('v')),
        (None, None) => true,
      }
    })
  }
}

fn entry(name: &str, op: &str, version: &str, caps: &regex::Captures<'_>) -> DependencyEntry {
  let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
  DependencyEntry {
    name: normalize_name(name),
    op: op.to_string(),
    version: version.to_string(),
    start: whole.0,
    end: whole.1,
  }
}

fn normalize_name(name: &str) -> String {
  name.trim().to_ascii_lowercase().replace('_', "-")
}

fn is_comment(line: &str) -> bool {
  let t = line.trim_start();
  t.starts_with('#') || t.starts_with("//")
}

/// Dependency manifests by file name (`requirements*.txt`, configured names, `*.toml`).
pub fn is_manifest(path: &str, config: &Config) -> bool {
  let file_name = path.rsplit('/').next().unwrap_or(path).to_ascii_lowercase();
  config.manifest_names.iter().any(|m| m.eq_ignore_ascii_case(&file_name))
    || (file_name.starts_with("requirements") && file_name.ends_with(".txt"))
    || file_name.ends_with(".toml")
}

/// Numeric dotted comparison: `a < b`. Non-numeric suffixes are ignored, missing
/// components count as zero (`2.0` == `2.0.0`).
pub fn version_lt(a: &str, b: &str) -> bool {
  compare_versions(a, b) == Ordering::Less
}

fn compare_versions(a: &str, b: &str) -> Ordering {
  let pa = components(a);
  let pb = components(b);
  let len = pa.len().max(pb.len());
  for i in 0..len {
    let x = pa.get(i).copied().unwrap_or(0);
    let y = pb.get(i).copied().unwrap_or(0);
    match x.cmp(&y) {
      Ordering::Equal => continue,
      other => return other,
    }
  }
  Ordering::Equal
}

fn components(v: &str) -> Vec<u64> {
  v.split('.')
    .map(|part| {
      let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
      digits.parse().unwrap_or(0)
    })
    .collect()
}

impl AnalysisTool for DepCheck {
  fn kind(&self) -> ToolKind {
    ToolKind::DepCheck
  }

  fn run(&self, ctx: &ToolContext<'_>, evidence: &[EvidenceItem]) -> Vec<RawSignal> {
    let mut out = Vec::new();
    for item in evidence.iter().filter(|i| is_manifest(&i.path, ctx.config)) {
      for (line_offset, dep) in self.entries(&item.text) {
        let rule = match self.flag(&dep, ctx.config) {
          Some(r) => r,
          None => continue,
        };
        out.push(signal_at(
          item,
          line_offset + dep.start,
          line_offset + dep.end,
          SignalSpec {
            tool: ToolKind::DepCheck,
            category: category::RISKY_DEPENDENCY,
            subject: dep.name.clone(),
            description: format!("{}@{}: {}", dep.name, dep.version, rule.reason),
            severity: rule.severity,
          },
        ));
      }
    }
    out
  }
}
