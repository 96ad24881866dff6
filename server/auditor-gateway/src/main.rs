//! Binary entrypoint for the auditor gateway.

use std::net::SocketAddr;
use std::sync::Arc;

use auditor_gateway::AppState;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let port: u16 = std::env::var("PORT")
    .unwrap_or_else(|_| "5010".into())
    .parse()?;

  let state = Arc::new(AppState::from_env()?);
  match &state.retriever {
    Some(r) => info!(url = r.url(), "vector store configured"),
    None => info!("no RETRIEVER_URL set; requests must carry inline evidence"),
  }

  let app = auditor_gateway::app(state);
  let addr = SocketAddr::from(([127, 0, 0, 1], port));
  info!("auditor-gateway listening on http://{}", addr);

  let listener = tokio::net::TcpListener::bind(addr).await?;
  axum::serve(listener, app).await?;

  Ok(())
}
