//! Telemetry and logging initialization
//!
//! Structured logging with `tracing` and `tracing-subscriber`.
//! stdout carries command output, so every log line goes to stderr.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable single-line output
    #[default]
    Compact,
    /// One JSON object per line
    Json,
}

impl LogFormat {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            LogFormat::Json
        } else {
            LogFormat::Compact
        }
    }
}

/// Default filter directive for the given verbosity.
///
/// Verbose mode opens up the collaboration crates while keeping the async
/// runtime quiet.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "debug,sg_collab=trace,tokio=info"
    } else {
        "info"
    }
}

/// Initialize the global tracing subscriber
///
/// `RUST_LOG` wins over the verbosity flag when set. Returns `false` when a
/// subscriber was already installed (e.g. by a test harness).
///
/// # Example
/// ```
/// use sg_common::telemetry::{init_tracing, LogFormat};
/// init_tracing(false, LogFormat::Compact);
/// tracing::info!("Editor bridge starting");
/// ```
pub fn init_tracing(verbose: bool, format: LogFormat) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let installed = match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .try_init(),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .compact(),
            )
            .with(env_filter)
            .try_init(),
    };

    installed.is_ok()
}
