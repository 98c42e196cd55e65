//! Tracing subscriber setup
//!
//! Libraries only emit events; binaries and tests that want to see contract
//! lines call `init_tracing` once at startup.

use tracing_subscriber::EnvFilter;

/// Directive used when `RUST_LOG` is unset.
pub fn default_directive(debug: bool) -> &'static str {
    if debug {
        "debug"
    } else {
        "info"
    }
}

/// Install a global fmt subscriber. `RUST_LOG` wins over the `debug`
/// flag. Returns false if a subscriber was already installed.
pub fn init_tracing(debug: bool, json: bool) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(debug)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let installed = if json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };

    if installed {
        tracing::debug!(
            version = env!("CARGO_PKG_VERSION"),
            json,
            "Tracing initialized"
        );
    }
    installed
}
