//! Normalize, filter, order and budget retrieved evidence.

use std::cmp::Ordering;

use tracing::debug;

use crate::config::Config;
use crate::types::EvidenceItem;

/// Canonical request-scoped evidence: normalized, filtered, ordered and within budget.
pub fn prepare(raw: Vec<EvidenceItem>, config: &Config) -> Vec<EvidenceItem> {
  let received = raw.len();
  let mut items: Vec<EvidenceItem> = raw
    .into_iter()
    .map(normalize_item)
    .filter(|item| is_analyzable(&item.path, config))
    .collect();
  sort(&mut items);

  let mut kept: Vec<EvidenceItem> = Vec::with_capacity(items.len().min(config.max_evidence_items));
  let mut chars = 0usize;
  for mut item in items {
    if kept.len() >= config.max_evidence_items {
      break;
    }
    let len = item.text.chars().count();
    if kept.is_empty() && len > config.max_evidence_chars {
      // The best match always survives, cut down to the budget.
      truncate_text(&mut item, config.max_evidence_chars);
      chars = config.max_evidence_chars;
      kept.push(item);
      continue;
    }
    if chars + len > config.max_evidence_chars {
      continue;
    }
    chars += len;
    kept.push(item);
  }

  debug!(received, kept = kept.len(), chars, "evidence prepared");
  kept
}

/// Descending similarity; ties broken by path then line_start.
pub fn sort(items: &mut [EvidenceItem]) {
  items.sort_by(compare);
}

fn compare(a: &EvidenceItem, b: &EvidenceItem) -> Ordering {
  clamp_score(b.similarity)
    .total_cmp(&clamp_score(a.similarity))
    .then_with(|| a.path.cmp(&b.path))
    .then_with(|| a.line_start.cmp(&b.line_start))
    .then_with(|| a.line_end.cmp(&b.line_end))
}

/// Highest similarity in the set; 0 for an empty set.
pub fn max_similarity(items: &[EvidenceItem]) -> f64 {
  items.iter().map(|i| i.similarity).fold(0.0, f64::max)
}

/// NaN → 0, everything else clamped to [0, 1].
fn clamp_score(s: f64) -> f64 {
  if s.is_nan() {
    0.0
  } else {
    s.clamp(0.0, 1.0)
  }
}

/// Keep the first `max_chars` characters and shrink the line range to match.
fn truncate_text(item: &mut EvidenceItem, max_chars: usize) {
  let cut = item
    .text
    .char_indices()
    .nth(max_chars)
    .map(|(i, _)| i)
    .unwrap_or(item.text.len());
  item.text.truncate(cut);
  let span = item.text.matches('\n').count() as u32;
  item.line_end = item.line_end.min(item.line_start.saturating_add(span));
}

fn normalize_item(mut item: EvidenceItem) -> EvidenceItem {
  item.path = normalize_path(&item.path);
  item.similarity = clamp_score(item.similarity);
  if item.line_start == 0 {
    item.line_start = 1;
  }
  if item.line_end < item.line_start {
    let span = item.text.matches('\n').count() as u32;
    item.line_end = item.line_start.saturating_add(span);
  }
  item
}

/// Normalize a file path for stable comparison:
/// - backslash -> forward slash
/// - collapse repeated slashes
/// - strip leading ./
pub fn normalize_path(p: &str) -> String {
  let s = p.trim().replace('\\', "/");
  let mut out = String::with_capacity(s.len());
  let mut prev_slash = false;
  for ch in s.chars() {
    if ch == '/' {
      if !prev_slash {
        out.push('/');
      }
      prev_slash = true;
    } else {
      prev_slash = false;
      out.push(ch);
    }
  }
  let mut trimmed = out.as_str();
  while let Some(rest) = trimmed.strip_prefix("./") {
    trimmed = rest;
  }
  trimmed.to_string()
}

/// Analyzable extension or manifest name, and not under an ignored directory.
pub fn is_analyzable(path: &str, config: &Config) -> bool {
  let lower = path.to_ascii_lowercase();
  let mut segments: Vec<&str> = lower.split('/').filter(|s| !s.is_empty()).collect();
  let file_name = match segments.pop() {
    Some(name) => name,
    None => return false,
  };
  if segments
    .iter()
    .any(|seg| config.ignored_dirs.iter().any(|d| d.eq_ignore_ascii_case(seg)))
  {
    return false;
  }
  config.manifest_names.iter().any(|m| m.eq_ignore_ascii_case(file_name))
    || config
      .analyzable_extensions
      .iter()
      .any(|ext| file_name.ends_with(&ext.to_ascii_lowercase()))
}
