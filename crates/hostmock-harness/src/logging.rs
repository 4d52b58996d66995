#![forbid(unsafe_code)]

//! Global `tracing` subscriber installation.
//!
//! Test binaries call [`init_tracing`] once with the active
//! [`DebugConfig`]. `RUST_LOG` takes precedence over the configured level.
//! With the `tracing-json` feature events are emitted as JSON lines.

use crate::config::DebugConfig;
use tracing_subscriber::EnvFilter;

/// Filter for the configured log level.
#[must_use]
pub fn env_filter(debug: &DebugConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(debug.log_level.as_directive()))
}

/// Install a fmt subscriber writing through the test writer.
///
/// Returns `false` if a global subscriber was already installed; calling
/// this more than once is harmless.
pub fn init_tracing(debug: &DebugConfig) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(debug))
        .with_test_writer();
    #[cfg(feature = "tracing-json")]
    let builder = builder.json();
    builder.try_init().is_ok()
}
