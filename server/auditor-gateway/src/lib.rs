//! Repository Auditor HTTP gateway
//!
//! Thin request boundary in front of the auditor core: validates requests,
//! fetches evidence, runs the core off the async runtime and serves metrics.
//! Bind to 127.0.0.1 by default (internal only).

mod handlers;
mod retriever;
mod state;
mod types;

use std::sync::Arc;

use axum::{routing::get, routing::post, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use handlers::{analyze, health, metrics};
pub use retriever::HttpRetriever;
pub use state::AppState;
pub use types::{AnalyzePayload, AnalyzeResponse};

pub fn app(state: Arc<AppState>) -> Router {
  Router::new()
    .route("/health", get(health))
    .route("/metrics", get(metrics))
    .route("/v1/analyze", post(analyze))
    .layer(TraceLayer::new_for_http())
    .layer(CorsLayer::permissive())
    .with_state(state)
}
