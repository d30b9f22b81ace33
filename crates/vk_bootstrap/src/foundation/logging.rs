//! Logging utilities and structured logging support

pub use log::{debug, error, info, trace, warn};

/// Initialize the logging system
///
/// `RUST_LOG` takes precedence; otherwise everything at `default_level` and above is shown.
pub fn init(default_level: log::LevelFilter) {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(default_level)
        .parse_env("RUST_LOG")
        .try_init();
}

/// Parse a level name such as `"info"` or `"debug"`, defaulting to `Info`
pub fn parse_level(name: &str) -> log::LevelFilter {
    name.parse().unwrap_or(log::LevelFilter::Info)
}
