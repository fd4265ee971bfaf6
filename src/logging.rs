//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Install a stderr `fmt` subscriber filtered by `RUST_LOG`.
///
/// Falls back to `default_directive` when `RUST_LOG` is unset or invalid.
/// Calling it again after a subscriber is installed is a no-op, so tests and
/// embedding applications can call it freely.
pub fn init_logging(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_repeatable() {
        init_logging("debug");
        init_logging("info");
        tracing::info!("logging initialised twice without panicking");
    }
}
