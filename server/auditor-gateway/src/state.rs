//! Shared application state.

use std::sync::Arc;
use std::time::Duration;

use auditor_core::{AuditError, Config, CoreMetrics, Dispatcher};

use crate::retriever::{HttpRetriever, DEFAULT_TIMEOUT_SECS};

pub const RETRIEVER_URL_ENV: &str = "RETRIEVER_URL";

pub struct AppState {
  pub config: Config,
  pub retriever: Option<HttpRetriever>,
  /// Built once at startup; cloned per request.
  pub dispatcher: Dispatcher,
  pub metrics: Arc<CoreMetrics>,
}

impl AppState {
  pub fn new(config: Config, retriever: Option<HttpRetriever>) -> Result<Self, AuditError> {
    config.validate()?;
    Ok(Self {
      config,
      retriever,
      dispatcher: Dispatcher::with_builtin()?,
      metrics: Arc::new(CoreMetrics::new()),
    })
  }

  /// Core config from `AUDITOR_CONFIG`/`AUDITOR_THRESHOLD`, vector store from `RETRIEVER_URL`.
  pub fn from_env() -> Result<Self, AuditError> {
    let config = Config::from_env()?;
    let retriever = match std::env::var(RETRIEVER_URL_ENV) {
      Ok(url) if !url.trim().is_empty() => {
        Some(HttpRetriever::new(url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))?)
      }
      _ => None,
    };
    Self::new(config, retriever)
  }
}
