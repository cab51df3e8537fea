//! jobweave
//!
//! Entry point for the jobweave CLI.

use std::sync::OnceLock;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use jobweave_config::{ConfigLoader, LoggingConfig};

mod cli;
mod cmd_check;
mod cmd_run;

use cli::{Cli, Commands};

/// Initialize tracing with console output and, when a directory is
/// configured, a daily rotated log file.
///
/// `RUST_LOG` overrides the configured level.
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let file_layer = match logging.directory() {
        Some(log_dir) => {
            std::fs::create_dir_all(&log_dir)
                .with_context(|| format!("creating log directory {}", log_dir.display()))?;
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(&logging.file_prefix)
                .max_log_files(30)
                .build(&log_dir)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            // Flushes on drop, so it lives as long as the process.
            static GUARD: OnceLock<WorkerGuard> = OnceLock::new();
            let _ = GUARD.set(guard);

            Some(fmt::layer().with_writer(non_blocking).with_ansi(false).boxed())
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_ansi(true))
        .with(file_layer)
        .init();

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ConfigLoader::load_or_default(cli.config.as_deref())
        .context("loading configuration")?;

    match cli.command {
        Some(Commands::Check) => cmd_check::check(&config),
        command => {
            init_tracing(&config.logging)?;
            let mirror = matches!(command, Some(Commands::Run { mirror: true }));
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(config.scheduling.executor_threads.max(1))
                .enable_all()
                .build()
                .context("building runtime")?;
            runtime.block_on(cmd_run::run(config, mirror))
        }
    }
}
