//! STATIC_ANALYZER: heuristic code-smell, security-keyword, performance and
//! documentation-gap matches.

use regex::Regex;

use super::{lines_with_offsets, signal_at, AnalysisTool, SignalSpec, ToolContext};
use crate::error::AuditError;
use crate::types::{category, EvidenceItem, RawSignal, Severity, ToolKind};

struct Rule {
  category: &'static str,
  subject: &'static str,
  severity: Severity,
  description: &'static str,
  pattern: Regex,
}

pub struct StaticAnalyzer {
  rules: Vec<Rule>,
  /// Only reported on lines nested under a loop header.
  loop_rules: Vec<Rule>,
  loop_header: Regex,
  smell: Regex,
  python_def: Regex,
  rust_pub_fn: Regex,
}

impl StaticAnalyzer {
  pub fn new() -> Result<Self, AuditError> {
    let rule = |category: &'static str,
                subject: &'static str,
                severity: Severity,
                description: &'static str,
                pattern: &str|
     -> Result<Rule, AuditError> {
      Ok(Rule {
        category,
        subject,
        severity,
        description,
        pattern: Regex::new(pattern)?,
      })
    };
    let sec = category::SECURITY_KEYWORD;
    let perf = category::PERFORMANCE;
    let rules = vec![
      rule(sec, "eval", Severity::High, "dynamic code evaluation via eval()", r"\beval\s*\(")?,
      rule(sec, "exec", Severity::High, "dynamic code execution via exec()", r"\bexec\s*\(")?,
      rule(sec, "shell=True", Severity::High, "subprocess invoked through a shell", r"shell\s*=\s*True")?,
      rule(sec, "pickle", Severity::Medium, "deserializing data with pickle", r"\bpickle\.loads?\s*\(")?,
      rule(
        sec,
        "hardcoded-credential",
        Severity::High,
        "hard-coded credential assignment",
        r#"(?i)\b(password|passwd|secret|api[_-]?key|access[_-]?token)\b\s*[:=]\s*["'][^"'\s]{4,}["']"#,
      )?,
      rule(
        sec,
        "private-key",
        Severity::High,
        "private key material committed to source",
        r"-----BEGIN (RSA |EC |DSA |OPENSSH )?PRIVATE KEY-----",
      )?,
      rule(sec, "weak-hash", Severity::Medium, "weak hash algorithm (md5/sha1)", r"(?i)\b(md5|sha1)\s*\(")?,
      rule(
        sec,
        "tls-verify-disabled",
        Severity::Medium,
        "TLS certificate verification disabled",
        r"(?i)\bverify\s*=\s*False\b|danger_accept_invalid_certs\s*\(\s*true",
      )?,
      rule(sec, "sql-concat", Severity::Medium, "SQL assembled by string formatting", r#"(?i)\b(execute|query)\s*\(\s*f?["'](select|insert|update|delete)\b[^"']*["']\s*(%|\+|\.format)"#)?,
      rule(perf, "blocking-sleep", Severity::Low, "blocking sleep call", r"\btime\.sleep\s*\(|\bthread::sleep\s*\(")?,
      rule(perf, "select-star", Severity::Low, "SELECT * fetches every column", r"(?i)\bselect\s+\*\s+from\b")?,
    ];
    let loop_rules = vec![
      rule(
        perf,
        "query-in-loop",
        Severity::Medium,
        "database query issued inside a loop",
        r"\b(?:execute|executemany|query)\s*\(|\.objects\.(?:get|filter|all)\s*\(",
      )?,
      rule(
        perf,
        "network-call-in-loop",
        Severity::Medium,
        "network call issued inside a loop",
        r"\b(?:requests|httpx)\.(?:get|post|put|patch|delete|request)\s*\(|\bfetch\s*\(",
      )?,
      rule(
        perf,
        "string-concat-in-loop",
        Severity::Low,
        "string built with += inside a loop",
        r#"\b[A-Za-z_][A-Za-z0-9_]*\s*\+=\s*(?:f?["']|str\()"#,
      )?,
    ];
    Ok(Self {
      rules,
      loop_rules,
      loop_header: Regex::new(r"^\s*(?:async\s+)?(?:for|while|loop)\b")?,
      smell: Regex::new(r"\b(TODO|FIXME|HACK|XXX)\b")?,
      python_def: Regex::new(r"^\s*(?:async\s+)?(def|class)\s+([A-Za-z_][A-Za-z0-9_]*)")?,
      rust_pub_fn: Regex::new(r"^\s*pub(?:\([a-z]+\))?\s+(?:async\s+)?fn\s+([A-Za-z_][A-Za-z0-9_]*)")?,
    })
  }

  fn scan_item(&self, item: &EvidenceItem, out: &mut Vec<RawSignal>) {
    for m in self.smell.find_iter(&item.text) {
      out.push(signal_at(
        item,
        m.start(),
        m.end(),
        SignalSpec {
          tool: ToolKind::StaticAnalyzer,
          category: category::CODE_SMELL,
          subject: m.as_str().to_string(),
          description: format!("unresolved {} marker", m.as_str()),
          severity: Severity::Low,
        },
      ));
    }

    for rule in &self.rules {
      for m in rule.pattern.find_iter(&item.text) {
        out.push(signal_at(
          item,
          m.start(),
          m.end(),
          SignalSpec {
            tool: ToolKind::StaticAnalyzer,
            category: rule.category,
            subject: rule.subject.to_string(),
            description: rule.description.to_string(),
            severity: rule.severity,
          },
        ));
      }
    }

    self.loop_hotspots(item, out);

    let lower = item.path.to_ascii_lowercase();
    if lower.ends_with(".py") {
      self.python_doc_gaps(item, out);
    } else if lower.ends_with(".rs") {
      self.rust_doc_gaps(item, out);
    }
  }

  /// Loop-sensitive rules, applied to lines indented deeper than an open
  /// `for`/`while`/`loop` header.
  fn loop_hotspots(&self, item: &EvidenceItem, out: &mut Vec<RawSignal>) {
    let mut open_loops: Vec<usize> = Vec::new();
    for (offset, line) in lines_with_offsets(&item.text) {
      if line.trim().is_empty() {
        continue;
      }
      let indent = line.len() - line.trim_start().len();
      while open_loops.last().is_some_and(|&header| indent <= header) {
        open_loops.pop();
      }
      if !open_loops.is_empty() {
        for rule in &self.loop_rules {
          if let Some(m) = rule.pattern.find(line) {
            out.push(signal_at(
              item,
              offset + m.start(),
              offset + m.end(),
              SignalSpec {
                tool: ToolKind::StaticAnalyzer,
                category: rule.category,
                subject: rule.subject.to_string(),
                description: rule.description.to_string(),
                severity: rule.severity,
              },
            ));
          }
        }
      }
      if self.loop_header.is_match(line) {
        open_loops.push(indent);
      }
    }
  }

  /// `def`/`class` whose next non-blank line is not a docstring. A definition on the
  /// last line of the excerpt is skipped since its body was not retrieved.
  fn python_doc_gaps(&self, item: &EvidenceItem, out: &mut Vec<RawSignal>) {
    let lines: Vec<(usize, &str)> = lines_with_offsets(&item.text).collect();
    for (idx, (offset, line)) in lines.iter().enumerate() {
      let caps = match self.python_def.captures(line) {
        Some(c) => c,
        None => continue,
      };
      let next = lines[idx + 1..].iter().map(|(_, l)| l.trim()).find(|l| !l.is_empty());
      let documented = match next {
        Some(l) => l.starts_with("\"\"\"") || l.starts_with("'''") || l.starts_with("r\"\"\""),
        None => continue,
      };
      if !documented {
        out.push(self.doc_gap(item, *offset, line, &caps[1], &caps[2]));
      }
    }
  }

  /// `pub fn` without a preceding `///` doc comment (attributes are skipped). A
  /// definition on the first line of the excerpt is skipped.
  fn rust_doc_gaps(&self, item: &EvidenceItem, out: &mut Vec<RawSignal>) {
    let lines: Vec<(usize, &str)> = lines_with_offsets(&item.text).collect();
    for (idx, (offset, line)) in lines.iter().enumerate() {
      let caps = match self.rust_pub_fn.captures(line) {
        Some(c) => c,
        None => continue,
      };
      let prev = lines[..idx]
        .iter()
        .rev()
        .map(|(_, l)| l.trim())
        .find(|l| !l.is_empty() && !l.starts_with("#["));
      let documented = match prev {
        Some(l) => l.starts_with("///") || l.starts_with("/**"),
        None => continue,
      };
      if !documented {
        out.push(self.doc_gap(item, *offset, line, "fn", &caps[1]));
      }
    }
  }

  fn doc_gap(&self, item: &EvidenceItem, offset: usize, line: &str, kind: &str, name: &str) -> RawSignal {
    signal_at(
      item,
      offset,
      offset + line.len(),
      SignalSpec {
        tool: ToolKind::StaticAnalyzer,
        category: category::DOCUMENTATION_GAP,
        subject: format!("{}:{}", item.path, name),
        description: format!("{} `{}` has no documentation", kind, name),
        severity: Severity::Low,
      },
    )
  }
}

impl AnalysisTool for StaticAnalyzer {
  fn kind(&self) -> ToolKind {
    ToolKind::StaticAnalyzer
  }

  fn run(&self, _ctx: &ToolContext<'_>, evidence: &[EvidenceItem]) -> Vec<RawSignal> {
    let mut out = Vec::new();
    for item in evidence {
      self.scan_item(item, &mut out);
    }
    out
  }
}
