//! Tracing subscriber setup for the binary.

use tracing_subscriber::EnvFilter;

/// Environment variable consulted first for the log filter; `RUST_LOG` is the
/// fallback so standard tooling keeps working.
pub const LOG_ENV: &str = "RIBBON_LOG";

pub fn init() {
    let filter = std::env::var(LOG_ENV)
        .or_else(|_| std::env::var(EnvFilter::DEFAULT_ENV))
        .map(EnvFilter::new)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
