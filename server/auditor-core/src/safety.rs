//! Read-only guarantee and the per-request state machine.
//!
//! Components handed to the auditor declare the access they need. Anything other
//! than read-only access is refused when the auditor is built, so no code path in
//! the core can write to, delete or execute the scanned source tree.

use serde::Serialize;
use std::fmt;

use crate::error::AuditError;

/// Access a component needs to the scanned source tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
  ReadOnly,
  Writes,
  Executes,
}

impl fmt::Display for Access {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::ReadOnly => "read-only",
      Self::Writes => "write",
      Self::Executes => "execute",
    })
  }
}

pub fn ensure_read_only(component: &str, access: Access) -> Result<(), AuditError> {
  match access {
    Access::ReadOnly => Ok(()),
    other => Err(AuditError::CapabilityRejected {
      component: component.to_string(),
      access: other,
    }),
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
  Received,
  Gated,
  Dispatched,
  Assembled,
  ShortCircuited,
  Returned,
}

/// `RECEIVED → GATED → (DISPATCHED → ASSEMBLED) | SHORT_CIRCUITED → RETURNED`.
#[derive(Debug, Clone)]
pub struct Lifecycle {
  trail: Vec<Stage>,
}

impl Default for Lifecycle {
  fn default() -> Self {
    Self::new()
  }
}

impl Lifecycle {
  pub fn new() -> Self {
    Self {
      trail: vec![Stage::Received],
    }
  }

  pub fn stage(&self) -> Stage {
    *self.trail.last().unwrap_or(&Stage::Received)
  }

  pub fn trail(&self) -> &[Stage] {
    &self.trail
  }

  pub fn advance(&mut self, next: Stage) -> Result<(), AuditError> {
    let from = self.stage();
    let allowed = matches!(
      (from, next),
      (Stage::Received, Stage::Gated)
        | (Stage::Gated, Stage::Dispatched)
        | (Stage::Gated, Stage::ShortCircuited)
        | (Stage::Dispatched, Stage::Assembled)
        | (Stage::Assembled, Stage::Returned)
        | (Stage::ShortCircuited, Stage::Returned)
    );
    if !allowed {
      return Err(AuditError::internal(format!(
        "illegal stage transition {:?} -> {:?}",
        from, next
      )));
    }
    self.trail.push(next);
    Ok(())
  }
}
