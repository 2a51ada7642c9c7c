//! Singer target CLI
//!
//! Reads tap output on stdin, writes at most one state line on stdout.
//! Logging goes to stderr so stdout stays clean for the orchestrator.

use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use target_s3_json::{emit_state, persist_lines, S3Uploader, TargetConfig};

#[derive(Parser)]
#[command(name = "target-s3-json")]
#[command(about = "Singer target that batches validated records into JSON files and uploads them to S3")]
struct Cli {
    /// Config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// State file
    #[arg(short, long)]
    state: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = TargetConfig::load(cli.config.as_deref())?;

    let problems = config.validate();
    if !problems.is_empty() {
        anyhow::bail!("Invalid configuration:\n   * {}", problems.join("\n   * "));
    }

    let uploader = S3Uploader::new(&config)?;

    let stdin = std::io::stdin();
    let state = persist_lines(stdin.lock(), &config, cli.state.as_deref(), &uploader)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    emit_state(&mut out, state.as_ref())?;
    out.flush()?;

    tracing::debug!("Exiting normally");
    Ok(())
}
