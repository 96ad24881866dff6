//! Binary entrypoint: read one JSON request from stdin, write one AnalysisResult to stdout.
//!
//! Rejected requests produce an ErrorOutput line and exit code 1. Logs go to
//! stderr so stdout stays a single JSON document.

use auditor_core::types::ErrorOutput;
use auditor_core::{run, Config, Input};
use std::io::{self, Read, Write};
use tracing_subscriber::EnvFilter;

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(io::stderr)
    .init();

  let config = match Config::from_env() {
    Ok(c) => c,
    Err(e) => {
      tracing::error!(error = %e, "invalid configuration");
      std::process::exit(2);
    }
  };

  if let Err(e) = run_binary(&config) {
    let _ = writeln!(io::stderr(), "auditor-core error: {}", e);
    std::process::exit(1);
  }
}

fn run_binary(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
  let mut raw = String::new();
  io::stdin().lock().read_to_string(&mut raw)?;

  let mut out = io::stdout().lock();
  let input: Input = match serde_json::from_str(&raw) {
    Ok(v) => v,
    Err(e) => {
      let err = ErrorOutput::new(format!("json parse: {}", e));
      serde_json::to_writer(&mut out, &err)?;
      writeln!(out)?;
      out.flush()?;
      std::process::exit(1);
    }
  };

  match run(&input, config) {
    Ok(result) => {
      serde_json::to_writer(&mut out, &result)?;
      writeln!(out)?;
      Ok(())
    }
    Err(e) => {
      serde_json::to_writer(&mut out, &ErrorOutput::from_error(&e))?;
      writeln!(out)?;
      out.flush()?;
      std::process::exit(1);
    }
  }
}
