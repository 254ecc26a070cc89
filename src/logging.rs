use tracing_subscriber::{fmt,EnvFilter};

/// Initialises the global tracing subscriber. Filter comes from
/// `RUST_LOG` when set, otherwise the supplied default level. Safe to
/// call more than once; later calls are no-ops.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
