use anyhow::{Context, Result};
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "poolctl=info";

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Build the filter: `--log-level` wins, then `RUST_LOG`, then the default.
/// `poolctl` also matches the `poolctl_*` library targets.
fn filter(level: Option<LogLevel>) -> Result<EnvFilter> {
    match level {
        Some(level) => EnvFilter::try_new(format!("poolctl={}", level.as_str()))
            .context("invalid log level"),
        None => EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))
            .context("invalid RUST_LOG filter"),
    }
}

/// Install the stderr subscriber. Stdout is reserved for command output.
pub fn init(level: Option<LogLevel>) -> Result<()> {
    tracing_subscriber::registry()
        .with(filter(level)?)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init()
        .context("failed to install tracing subscriber")?;
    Ok(())
}
