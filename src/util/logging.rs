// rundex - util/logging.rs
//
// Structured logging bootstrap for embedders and tests.
//
// Activation:
//   - Environment variable: RUST_LOG=debug (or trace)
//   - Explicit level from the embedding application
//
// Output: stderr. The library itself only emits tracing events; whether
// a subscriber is installed is the embedder's choice.

use tracing_subscriber::EnvFilter;

/// Initialise the logging subsystem.
///
/// `level` is an explicit level requested by the embedding application.
///
/// Priority: RUST_LOG env var > explicit level > default "info".
pub fn init(level: Option<&str>) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        // RUST_LOG takes highest priority (already set)
        EnvFilter::from_default_env()
    } else if let Some(level) = level {
        EnvFilter::new(level)
    } else {
        EnvFilter::new(super::constants::DEFAULT_LOG_LEVEL)
    };

    // try_init so repeated calls from parallel test binaries are harmless
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .compact()
        .try_init();

    tracing::debug!(
        lib = super::constants::LIB_NAME,
        version = super::constants::LIB_VERSION,
        "Logging initialised"
    );
}
