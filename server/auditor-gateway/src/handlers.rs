//! HTTP handlers for the gateway.

use std::sync::Arc;

use auditor_core::types::{AnalysisResult, ErrorOutput};
use auditor_core::{AuditError, Auditor, CancelToken, SnapshotRetriever};
use axum::{
  body::Bytes,
  extract::State,
  http::{header, StatusCode},
  response::{IntoResponse, Response},
  Json,
};
use chrono::Utc;
use tracing::{error, info};
use uuid::Uuid;

use crate::state::AppState;
use crate::types::{AnalyzePayload, AnalyzeResponse};

pub async fn health() -> &'static str {
  "ok"
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
  (
    [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
    state.metrics.snapshot().render_prometheus(),
  )
    .into_response()
}

/// Cancels the request's token when the handler future is dropped (client gone).
struct CancelOnDrop(CancelToken);

impl Drop for CancelOnDrop {
  fn drop(&mut self) {
    self.0.cancel();
  }
}

pub async fn analyze(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
  let request_id = Uuid::new_v4();
  let received_at = Utc::now();

  let payload: AnalyzePayload = match serde_json::from_slice(&body) {
    Ok(p) => p,
    Err(e) => {
      return error_response(StatusCode::BAD_REQUEST, ErrorOutput::new(format!("json parse: {}", e)));
    }
  };
  let query = match payload.request.validate() {
    Ok(q) => q,
    Err(e) => return error_response(StatusCode::BAD_REQUEST, ErrorOutput::from_error(&e)),
  };
  let config = match payload.request.threshold {
    Some(t) => match state.config.with_threshold(t) {
      Ok(c) => c,
      Err(e) => return error_response(StatusCode::BAD_REQUEST, ErrorOutput::from_error(&e)),
    },
    None => state.config.clone(),
  };

  let top_k = payload.request.top_k;
  let snapshot = match (payload.evidence, &state.retriever) {
    (Some(items), _) => SnapshotRetriever::new(items),
    (None, Some(http)) => http.snapshot(&query, top_k).await,
    (None, None) => SnapshotRetriever::failed("no vector store configured"),
  };

  let cancel = CancelToken::new();
  let _guard = CancelOnDrop(cancel.clone());
  let metrics = state.metrics.clone();
  let dispatcher = state.dispatcher.clone();
  let plan = payload.request.plan;

  let joined = tokio::task::spawn_blocking(move || -> Result<AnalysisResult, AuditError> {
    let auditor = Auditor::new(config, Arc::new(snapshot), dispatcher)?
      .with_metrics(metrics);
    auditor.answer_planned(&query, top_k, plan.as_deref(), &cancel)
  })
  .await;

  let outcome = match joined {
    Ok(r) => r,
    Err(e) => Err(AuditError::internal(format!("analysis task failed: {}", e))),
  };

  match outcome {
    Ok(result) => {
      info!(
        %request_id,
        status = ?result.status,
        findings = result.findings.len(),
        "analyze complete"
      );
      Json(AnalyzeResponse {
        request_id,
        received_at,
        result,
      })
      .into_response()
    }
    Err(AuditError::Cancelled) => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    Err(e) if e.is_client_error() => error_response(StatusCode::BAD_REQUEST, ErrorOutput::from_error(&e)),
    Err(e) => {
      error!(%request_id, error = %e, "analyze failed");
      error_response(StatusCode::INTERNAL_SERVER_ERROR, ErrorOutput::from_error(&e))
    }
  }
}

fn error_response(status: StatusCode, body: ErrorOutput) -> Response {
  (status, Json(body)).into_response()
}
