//! Structured error types for the auditor.

use thiserror::Error;

use crate::safety::Access;

#[derive(Debug, Error)]
pub enum AuditError {
  /// Invalid threshold or tool weights. Fatal at startup.
  #[error("configuration: {field}: {reason}")]
  Configuration { field: String, reason: String },

  #[error("validation: {field}: {reason}")]
  Validation { field: String, reason: String },

  #[error("unknown tool: {0}")]
  UnknownTool(String),

  #[error("retriever unavailable: {0}")]
  RetrieverUnavailable(String),

  #[error("capability rejected: {component} declares {access} access")]
  CapabilityRejected { component: String, access: Access },

  #[error("request cancelled")]
  Cancelled,

  #[error("internal: {0}")]
  Internal(String),

  #[error("pattern: {0}")]
  Pattern(#[from] regex::Error),

  #[error("json: {0}")]
  Json(#[from] serde_json::Error),

  #[error("toml: {0}")]
  Toml(#[from] toml::de::Error),

  #[error("io: {0}")]
  Io(#[from] std::io::Error),
}

impl AuditError {
  pub fn configuration(field: &str, reason: &str) -> Self {
    Self::Configuration {
      field: field.to_string(),
      reason: reason.to_string(),
    }
  }

  pub fn validation(field: &str, reason: &str) -> Self {
    Self::Validation {
      field: field.to_string(),
      reason: reason.to_string(),
    }
  }

  pub fn unavailable(msg: impl Into<String>) -> Self {
    Self::RetrieverUnavailable(msg.into())
  }

  pub fn internal(msg: impl Into<String>) -> Self {
    Self::Internal(msg.into())
  }

  /// Errors the caller caused (bad request or bad deployment config) vs. core failures.
  pub fn is_client_error(&self) -> bool {
    matches!(
      self,
      Self::Validation { .. } | Self::Configuration { .. } | Self::Json(_)
    )
  }
}
