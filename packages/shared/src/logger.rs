//! Logger setup built on `tracing-subscriber`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Build the default filter directive for a binary.
///
/// Cargo binary names use hyphens while tracing targets use the crate path,
/// so `hiroba-server` becomes `hiroba_server=debug`.
fn default_directive(bin_name: &str, level: &str) -> String {
    format!(
        "{}={level},tower_http={level},axum::rejection=trace",
        bin_name.replace('-', "_")
    )
}

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `default_level` when it is set.
/// Calling this more than once is harmless; later calls are ignored.
pub fn setup_logger(bin_name: &str, default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(bin_name, default_level)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init();
}
