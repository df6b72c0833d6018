mod advice;
mod cache;
mod cli;
mod config;
mod db;
mod ledger;
mod store;

use clap::Parser;
use color_eyre::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = cli::Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;

  // Keep the guard alive so buffered log lines are flushed on exit
  let _guard = init_tracing(&config)?;

  cli::run(args, config).await
}

/// Log to stderr and to `piggyback.log` in the data directory.
///
/// `PIGGYBACK_LOG` takes precedence over `RUST_LOG`; both default to `warn`.
fn init_tracing(config: &config::Config) -> Result<WorkerGuard> {
  let filter = EnvFilter::try_from_env("PIGGYBACK_LOG")
    .or_else(|_| EnvFilter::try_from_default_env())
    .unwrap_or_else(|_| EnvFilter::new("warn"));

  let log_dir = config.data_dir()?;
  std::fs::create_dir_all(&log_dir)?;
  let (writer, guard) =
    tracing_appender::non_blocking(tracing_appender::rolling::never(&log_dir, "piggyback.log"));

  tracing_subscriber::registry()
    .with(filter)
    .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
    .with(fmt::layer().with_writer(writer).with_ansi(false))
    .init();

  Ok(guard)
}
