//! Tracing/logging setup shared by binaries.

use tracing_subscriber::EnvFilter;

/// Initialize process-wide tracing/logging.
///
/// Filtering is controlled through `RUST_LOG` (default `info`); set
/// `MESA_LOG_FORMAT=pretty` for human-readable output instead of JSON.
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false);

    let pretty = std::env::var("MESA_LOG_FORMAT").is_ok_and(|v| v == "pretty");
    if pretty {
        let _ = builder.try_init();
    } else {
        let _ = builder.json().try_init();
    }
}
