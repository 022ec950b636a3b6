// src/infra/logger.rs — Structured logging with tracing

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber. `HABITUAL_LOG` wins over `RUST_LOG`, which
/// wins over `level`. Output goes to stderr so stdout stays machine-readable.
pub fn init_logging(level: &str) {
    let filter = std::env::var("HABITUAL_LOG")
        .ok()
        .and_then(|v| EnvFilter::try_new(v).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(level));

    // A second init (tests, embedding hosts) is not an error.
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}
