//! Structured logging setup.
//!
//! The relay logs through `tracing`; this module installs the global
//! subscriber. `RUST_LOG` takes precedence over the configured level.

use tracing_subscriber::EnvFilter;

/// Build the level filter, preferring `RUST_LOG` when it is set and valid.
fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Initialize the global tracing subscriber writing to stderr.
///
/// Call once at startup. Later calls are no-ops.
///
/// # Arguments
///
/// * `level` - Minimum level (or full filter directive) when `RUST_LOG` is unset.
/// * `json` - Emit one JSON object per event instead of compact text.
pub fn init_subscriber(level: &str, json: bool) {
    let filter = env_filter(level);

    // try_init is a no-op if a global subscriber is already set
    if json {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .json()
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .compact()
            .try_init();
    }
}
