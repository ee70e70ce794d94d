//! Structured logging bootstrap.
//!
//! Initializes `env_logger` with a compact format. Applications embedding the
//! scheduler call [`init`] once at startup; the `RUST_LOG` environment
//! variable overrides the default `info` filter.

use env_logger::Env;

/// Initialize the global logger, ignoring errors if one is already installed.
pub fn init() {
    let _ = try_init();
}

/// Initialize the global logger, returning an error if one is already installed.
pub fn try_init() -> Result<(), log::SetLoggerError> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .format_target(false)
        .try_init()
}
