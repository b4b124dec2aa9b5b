mod api;
mod chart;
mod commands;
mod config;
mod serve;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use cgmview_core::{AccessGate, Pipeline};
use cgmview_logging::{init_tracing, LogFormat, Logger};

use commands::{Command, CommandContext};
use config::ProjectConfig;

#[derive(Parser, Debug)]
#[command(
    name = "cgmview",
    about = "Browse, filter and export continuous glucose monitor CSV exports",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// CGM export to open (default: `default_dataset` from config)
    #[arg(short, long, global = true)]
    file: Option<PathBuf>,

    /// Path to config file (default: ./cgmview.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Access key, required when the config lists `access_keys`
    #[arg(long, global = true)]
    access_key: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty", global = true)]
    log_format: LogFormatChoice,

    /// Diagnostic log level (overridden by RUST_LOG)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    /// Only print results and warnings
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let working_dir = std::env::current_dir().context("Failed to get current directory")?;
    let config = ProjectConfig::discover(cli.config.as_deref(), &working_dir)?;

    let log_format: LogFormat = cli.log_format.into();
    let _guard = init_tracing(&cli.log_level, log_format, config.log_dir.as_deref());
    let logger = Logger::new(log_format).quiet(cli.quiet);

    let gate = AccessGate::new(config.access_keys.iter().cloned());
    let pipeline = Pipeline::new().with_session_gap(config.session_gap()?);
    let input = cli.file.clone().or_else(|| config.default_dataset());

    tracing::debug!(
        input = ?input,
        gate_open = gate.is_open(),
        gap_minutes = pipeline.session_gap().num_minutes(),
        "Resolved configuration"
    );

    match cli.command {
        Command::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.server_host().to_string());
            let port = port.unwrap_or_else(|| config.server_port());
            serve::handle_serve_command(pipeline, gate, logger, input, &host, port).await
        }
        command => {
            gate.check(cli.access_key.as_deref())?;
            let ctx = CommandContext {
                pipeline,
                logger,
                input,
            };
            commands::handle_command(command, &ctx)
        }
    }
}
