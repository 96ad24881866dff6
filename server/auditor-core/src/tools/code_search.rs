//! CODE_SEARCH: locate query keywords and configured patterns in evidence text.

use std::collections::{BTreeSet, HashSet};

use regex::RegexBuilder;
use tracing::warn;

use super::{signal_at, AnalysisTool, SignalSpec, ToolContext};
use crate::types::{category, EvidenceItem, RawSignal, Severity, ToolKind};

const MIN_TERM_LEN: usize = 3;

pub struct CodeSearch;

/// Lowercased, deduplicated query keywords in first-seen order.
pub fn query_terms(query: &str) -> Vec<String> {
  let stopwords: HashSet<&str> = [
    "the", "a", "an", "is", "are", "was", "were", "be", "been", "have", "has", "had", "do",
    "does", "did", "will", "would", "could", "should", "can", "what", "when", "where", "which",
    "who", "why", "how", "this", "that", "these", "those", "and", "or", "but", "if", "then",
    "for", "with", "about", "from", "into", "any", "all", "there", "find", "show", "list",
    "code", "repo", "repository", "use", "used", "uses", "using", "our", "your",
  ]
  .into_iter()
  .collect();

  let mut seen = HashSet::new();
  query
    .to_lowercase()
    .split(|c: char| !(c.is_alphanumeric() || c == '_'))
    .filter(|w| w.chars().count() >= MIN_TERM_LEN && !stopwords.contains(w))
    .filter(|w| seen.insert(w.to_string()))
    .map(str::to_string)
    .collect()
}

impl AnalysisTool for CodeSearch {
  fn kind(&self) -> ToolKind {
    ToolKind::CodeSearch
  }

  fn run(&self, ctx: &ToolContext<'_>, evidence: &[EvidenceItem]) -> Vec<RawSignal> {
    let mut terms: BTreeSet<String> = query_terms(ctx.query.as_str()).into_iter().collect();
    terms.extend(
      ctx
        .config
        .search_patterns
        .iter()
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty()),
    );

    let mut out = Vec::new();
    for term in terms {
      let escaped = regex::escape(&term);
      let pattern = if term.chars().all(|c| c.is_alphanumeric() || c == '_') {
        format!(r"\b{}\b", escaped)
      } else {
        escaped
      };
      let re = match RegexBuilder::new(&pattern).case_insensitive(true).build() {
        Ok(re) => re,
        Err(e) => {
          warn!(term = %term, error = %e, "skipping unsearchable term");
          continue;
        }
      };
      for item in evidence {
        for m in re.find_iter(&item.text) {
          out.push(signal_at(
            item,
            m.start(),
            m.end(),
            SignalSpec {
              tool: ToolKind::CodeSearch,
              category: category::QUERY_MATCH,
              subject: term.clone(),
              description: format!("'{}' referenced in retrieved code", term),
              severity: Severity::Low,
            },
          ));
        }
      }
    }
    out
  }
}
