//! Logging for the mapd client
//!
//! Every event is emitted with `tracing` under one of [`TARGETS`]. With the
//! `logging` feature these helpers install a `tracing-subscriber` formatter
//! that shows the client's targets at the requested level and everything
//! else at `warn`; without it they do nothing and the host may install its
//! own subscriber.

use tracing::Level;

#[cfg(feature = "logging")]
use tracing_subscriber::{EnvFilter, fmt};

/// `tracing` targets used by this crate.
pub const TARGETS: &[&str] = &["connection", "cursor", "load", "dashboard", "ipc", "stream"];

/// Filter override read before `RUST_LOG`.
pub const ENV_VAR: &str = "MAPD_LOG";

/// `EnvFilter` directives: client targets at `level`, other crates at `warn`.
///
/// ```rust
/// use tracing::Level;
///
/// let d = mapd_core::logging::directives(Level::DEBUG);
/// assert!(d.starts_with("connection=debug,"));
/// assert!(d.ends_with(",warn"));
/// ```
pub fn directives(level: Level) -> String {
    let level = match level {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warn",
        Level::ERROR => "error",
    };
    let mut parts: Vec<String> = TARGETS.iter().map(|t| format!("{t}={level}")).collect();
    parts.push("warn".to_string());
    parts.join(",")
}

/// Client events at `info`.
///
/// # Environment Variables
/// - `MAPD_LOG`, then `RUST_LOG`: full filter override, e.g. `ipc=trace,info`
///
/// # Example
/// ```rust
/// mapd_core::logging::init();
/// ```
#[cfg(feature = "logging")]
pub fn init() -> bool {
    init_with_level(Level::INFO)
}

/// Client events at `level`. Returns `false` when a global subscriber was
/// already installed.
///
/// # Example
/// ```rust
/// mapd_core::logging::init_with_level(tracing::Level::DEBUG);
/// ```
#[cfg(feature = "logging")]
pub fn init_with_level(level: Level) -> bool {
    fmt()
        .with_env_filter(filter(level))
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .try_init()
        .is_ok()
}

/// Debug-level client events, captured by the test harness.
#[cfg(feature = "logging")]
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new(directives(Level::DEBUG)))
        .with_test_writer()
        .try_init();
}

#[cfg(feature = "logging")]
fn filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_env(ENV_VAR)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(directives(level)))
}

// Stub implementations when logging feature is disabled
#[cfg(not(feature = "logging"))]
pub fn init() -> bool {
    false
}

#[cfg(not(feature = "logging"))]
pub fn init_with_level(_level: Level) -> bool {
    false
}

#[cfg(not(feature = "logging"))]
pub fn init_test() {}
