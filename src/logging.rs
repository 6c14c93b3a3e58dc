//! Logging initialization.

use tracing_subscriber::EnvFilter;

/// Installs a `fmt` subscriber filtered by `RUST_LOG`, falling back to `level`.
///
/// Safe to call more than once; later calls leave the first subscriber in place.
///
/// ```ignore
/// workout_session::init_logging("info");
/// tracing::info!("Session core ready");
/// ```
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let result = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();

    if result.is_err() {
        tracing::debug!("Logging already initialized");
    }
}
