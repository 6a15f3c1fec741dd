//! nanocode CLI: the main entry point.
//!
//! Modes:
//! - `nanocode <prompt>`: run one request to completion and exit
//! - `nanocode`: interactive session with `clear`, `help` and `exit`

use clap::Parser;
use nanocode_config::AppConfig;

mod commands;
mod render;
mod runtime;

#[derive(Parser)]
#[command(
    name = "nanocode",
    about = "nanocode: a terminal coding agent that works through tools",
    version
)]
struct Cli {
    /// Run this prompt once instead of starting an interactive session
    prompt: Vec<String>,

    /// Approve every tool call without asking
    #[arg(short, long)]
    auto: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Override the configured model
    #[arg(short, long)]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the model's answer.
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if let Some(model) = cli.model {
        config.default_model = model;
    }

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    NANOCODE_API_KEY=sk-...");
        eprintln!("    OPENAI_API_KEY=sk-...");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let prompt = cli.prompt.join(" ");
    let prompt = prompt.trim();
    if prompt.is_empty() {
        let rt = runtime::Runtime::build(&config, cli.auto, config.agent.max_rounds_interactive)?;
        commands::repl::run(&rt).await
    } else {
        let rt = runtime::Runtime::build(&config, cli.auto, config.agent.max_rounds_single_shot)?;
        commands::prompt::run(&rt, prompt).await
    }
}
