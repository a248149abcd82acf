//! In-memory chat plugin entry point.
//!
//! The host launches this binary and speaks JSON-RPC over its stdin and
//! stdout. Logs never go to stdout.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use galaxy_plugin::config::warn_unknown_fields;
use galaxy_plugin::{Config, Directories, Dispatcher, MemoryChat, Notifier};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Galaxy integration plugin backed by in-memory chat rooms
#[derive(Parser, Debug)]
#[command(name = "galaxy-chat-plugin")]
#[command(version, about, long_about = None)]
struct Args {
    /// Config file (defaults to `$XDG_CONFIG_HOME/galaxy-chat-plugin/config.json`)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log file, overriding the configured one
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

/// Set up logging to a file, or to stderr when no file is configured.
/// Debug builds default to debug level, release builds to the configured level.
fn setup_logging(level: &str, log_file: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let default_level = if cfg!(debug_assertions) {
        "debug"
    } else {
        level
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("galaxy={default_level}")));

    let Some(log_file) = log_file else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .with(filter)
            .init();
        return Ok(None);
    };

    let dir = log_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = log_file
        .file_name()
        .with_context(|| format!("Invalid log file path: {}", log_file.display()))?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true),
        )
        .with(filter)
        .init();

    Ok(Some(guard))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => Directories::new()?.config_file,
    };
    let (config, unknown_fields) = Config::load_checked(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let log_file = args.log_file.or_else(|| config.logging.file.clone());
    let _guard = setup_logging(&config.logging.level, log_file.as_deref())?;
    warn_unknown_fields(&unknown_fields, &config_path.display().to_string());

    info!("Starting galaxy chat plugin (config: {})", config_path.display());

    let (notifier, outbox) = Notifier::channel();
    let plugin = MemoryChat::new(config.chat.clone(), notifier.clone());

    Dispatcher::new(plugin, notifier, outbox)
        .with_max_line_length(config.transport.max_line_length)
        .run_stdio()
        .await?;

    info!("Galaxy chat plugin stopped");
    Ok(())
}
