use std::io::Read;

use anyhow::{Context, Result};
use clap::Parser;
use tribunal_models::config::TribunalConfig;
use tribunal_models::market::MarketBrief;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tribunal", about = "Multi-specialist prediction-market analysis")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/tribunal.toml")]
    config: String,

    /// Read MarketBrief JSON from a file instead of stdin
    #[arg(short, long)]
    input: Option<String>,

    /// Pretty-print the output JSON
    #[arg(long)]
    pretty: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Cross-examine with the local rule-based examiner instead of the CLI
    #[arg(long)]
    offline: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout carries only the report (respects RUST_LOG)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let config_str = std::fs::read_to_string(&cli.config)
        .with_context(|| format!("Failed to read config: {}", cli.config))?;
    let mut config: TribunalConfig = tribunal::load_config(&config_str)?;
    if cli.offline {
        config.engine.offline_examiner = true;
    }

    let brief_json = if let Some(input_path) = &cli.input {
        std::fs::read_to_string(input_path)
            .with_context(|| format!("Failed to read input: {input_path}"))?
    } else {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read from stdin")?;
        buf
    };
    let brief = MarketBrief::from_json(&brief_json).context("Invalid MarketBrief")?;

    let orchestrator = tribunal::build_orchestrator(&config).context("Failed to build orchestrator")?;
    let report = tribunal::analyze(&orchestrator, &brief)
        .await
        .context("Analysis failed")?;

    let output = if cli.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{output}");

    Ok(())
}
