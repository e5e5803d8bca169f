use anyhow::Result;
use app::App;
use clap::Parser;
use std::fs::OpenOptions;
use tracing_appender::non_blocking;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

mod app;
mod cli;
mod commands;
mod config;
mod error;
mod model;
mod queue;
mod site;
mod transfer;
mod util;

pub use error::AppError;

fn main() -> Result<()> {
    #[cfg(windows)]
    let _ = util::try_enable_ansi_on_windows();

    let cli = cli::Cli::parse();
    let config = config::Config::from_cli(&cli);
    init_tracing(&config);

    let app = App::new(&config);
    let result = match cli.command {
        Some(command) => app.run_command(command),
        None => app.run_repl(),
    };
    app.shutdown();
    result
}

/// Structured, leveled logging gated by `--verbose`/`--debug`: human-readable
/// output mirrors to stderr at WARN by default; `--verbose`/`--debug` raises
/// the level to DEBUG and adds an append-only file sink under the configured
/// log directory.
fn init_tracing(config: &config::Config) {
    let level = if config.debug { "debug" } else { "warn" };
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_filter(EnvFilter::new(level));

    let logs_dir = config.log_dir();
    if let Err(e) = std::fs::create_dir_all(&logs_dir) {
        eprintln!("warning: could not create log dir {}: {}", logs_dir.display(), e);
        tracing_subscriber::registry().with(stderr_layer).init();
        return;
    }

    let run_stamp = chrono::Utc::now().format("%Y%m%dT%H%M%SZ");
    let log_path = logs_dir.join(format!("sftpc-{run_stamp}.log"));
    match OpenOptions::new().create(true).append(true).open(&log_path) {
        Ok(file) => {
            let (non_blocking_writer, guard) = non_blocking(file);
            // Leaked so the background writer thread survives for the
            // process lifetime; dropping it early would silently lose logs.
            let _ = Box::leak(Box::new(guard));
            let file_layer =
                fmt::layer().with_writer(non_blocking_writer).with_ansi(false).with_filter(EnvFilter::new(level));
            tracing_subscriber::registry().with(stderr_layer).with(file_layer).init();
        }
        Err(e) => {
            eprintln!("warning: could not open log file {}: {}", log_path.display(), e);
            tracing_subscriber::registry().with(stderr_layer).init();
        }
    }
}
