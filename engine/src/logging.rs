//! # Structured Logging
//!
//! Installs a `tracing` subscriber with a pretty or JSON format and
//! `RUST_LOG`-driven filtering. The engine itself only emits events; hosts
//! that already run a subscriber can skip this module entirely.
//!
//! Output goes to stderr.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use tracing_subscriber::util::TryInitError;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable output for local runs.
    Pretty,
    /// JSON lines for log aggregation.
    Json,
}

impl LogFormat {
    /// Parses "json" or "pretty" (case-insensitive). Anything else is `Pretty`.
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Installs the global subscriber.
///
/// # Panics
///
/// Panics if a global subscriber is already set. Use [`try_init_logging`]
/// where that is possible (tests, embedding hosts).
///
/// # Arguments
///
/// * `default_level` - Filter used when `RUST_LOG` is unset, e.g. `"info"`
///   or `"tide_engine=debug"`.
/// * `format` - Output format.
pub fn init_logging(default_level: &str, format: LogFormat) {
    if let Err(e) = try_init_logging(default_level, format) {
        panic!("failed to install tracing subscriber: {e}");
    }
}

/// Installs the global subscriber, returning an error instead of panicking
/// when one is already installed.
///
/// ```text
/// RUST_LOG=tide_engine=debug   # per-phase and per-flow events
/// RUST_LOG=tide_engine=info    # one line per committed epoch
/// ```
pub fn try_init_logging(default_level: &str, format: LogFormat) -> Result<(), TryInitError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .try_init()?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr).with_target(true))
                .try_init()?;
        }
    }

    tracing::info!(?format, "logging initialized");
    Ok(())
}
