//! manifest-scan: flag risky or outdated dependencies in manifest files
//!
//! Usage:
//!   manifest-scan <manifest>...                # list flagged entries
//!   manifest-scan <manifest>... -q             # quiet: exit 0 if clean, 1 if flagged
//!   manifest-scan <manifest>... --config FILE  # risky list from an auditor TOML config
//!
//! Understands requirements.txt, package.json, Cargo.toml / pyproject.toml and
//! go.mod. Files are only read. Exit 2 on usage or read errors.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use auditor_core::tools::DepCheck;
use auditor_core::types::{EvidenceItem, Severity};
use auditor_core::Config;
use clap::Parser;

#[derive(Parser)]
#[command(name = "manifest-scan", version, about = "Flag risky or outdated dependencies in manifest files")]
struct Cli {
    /// Manifest files to scan.
    #[arg(required = true)]
    manifests: Vec<PathBuf>,

    /// Auditor TOML config supplying the risky-dependency list.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Only set the exit code (0 = clean, 1 = flagged).
    #[arg(short, long)]
    quiet: bool,
}

struct Flagged {
    path: String,
    line: u32,
    name: String,
    version: String,
    reason: String,
    severity: Severity,
}

fn scan(path: &str, text: &str, dep_check: &DepCheck, config: &Config) -> Vec<Flagged> {
    let line_count = text.lines().count().max(1) as u32;
    let item = EvidenceItem::new(path, 1, line_count, text, 1.0);
    dep_check
        .entries(text)
        .into_iter()
        .filter_map(|(offset, dep)| {
            let rule = dep_check.flag(&dep, config)?;
            Some(Flagged {
                path: path.to_string(),
                line: item.line_at(offset + dep.start),
                name: dep.name,
                version: dep.version,
                reason: rule.reason.clone(),
                severity: rule.severity,
            })
        })
        .collect()
}

fn severity_label(s: Severity) -> &'static str {
    match s {
        Severity::Low => "low",
        Severity::Medium => "medium",
        Severity::High => "high",
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => Config::load(path),
        None => Config::from_env(),
    };
    let config = match loaded {
        Ok(c) => c,
        Err(e) => {
            eprintln!("manifest-scan: invalid config: {}", e);
            return ExitCode::from(2);
        }
    };
    let dep_check = match DepCheck::new() {
        Ok(d) => d,
        Err(e) => {
            eprintln!("manifest-scan: {}", e);
            return ExitCode::from(2);
        }
    };

    let mut flagged = Vec::new();
    for manifest in &cli.manifests {
        let display = manifest.display().to_string();
        let text = match fs::read_to_string(manifest) {
            Ok(t) => t,
            Err(e) => {
                eprintln!("manifest-scan: cannot read {}: {}", display, e);
                return ExitCode::from(2);
            }
        };
        flagged.extend(scan(&display, &text, &dep_check, &config));
    }

    if cli.quiet {
        return if flagged.is_empty() { ExitCode::SUCCESS } else { ExitCode::from(1) };
    }

    if flagged.is_empty() {
        println!("No risky dependencies.");
        return ExitCode::SUCCESS;
    }

    for f in &flagged {
        println!(
            "{}:{}: {}@{}: {} [{}]",
            f.path,
            f.line,
            f.name,
            f.version,
            f.reason,
            severity_label(f.severity)
        );
    }
    ExitCode::from(1)
}
