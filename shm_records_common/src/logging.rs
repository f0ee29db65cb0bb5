//! Tracing subscriber setup shared by the workspace binaries.

use crate::config::LogLevel;
use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber.
///
/// `RUST_LOG` directives are honoured; `level` is added on top. Output is
/// JSON when `json` is set, compact otherwise. Calling this twice is harmless,
/// the second subscriber is discarded.
pub fn init_tracing(level: LogLevel, json: bool) {
    let level: tracing::Level = level.into();
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    let result = if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_thread_ids(true)
            .json()
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_line_number(true)
            .compact()
            .try_init()
    };

    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
