//! Test logging configuration utilities

use tracing_subscriber::{EnvFilter, FmtSubscriber};
use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize tracing for tests with a level filter
///
/// Only the first call per test process installs a subscriber. `RUST_LOG`
/// overrides `level` when set.
///
/// # Example
///
/// ```rust
/// use sg_test_helpers::logging::init_test_logging;
///
/// init_test_logging("debug");
/// ```
pub fn init_test_logging(level: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level));

        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_test_writer()
            .finish();

        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

/// Suppress all logs below error
pub fn suppress_logs() {
    init_test_logging("error");
}
