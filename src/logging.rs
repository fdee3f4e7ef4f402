//! Logger setup for the binary.
//!
//! Library code logs through the `log` facade; the binary routes it to
//! stderr. `-v` flags raise the level, `HELM_DUMP_LOG` (env_logger filter
//! syntax) overrides it.

use log::LevelFilter;

pub const LOG_ENV: &str = "HELM_DUMP_LOG";

pub fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Install the stderr logger. Calling it twice is harmless.
pub fn init(verbosity: u8) {
    let _ = env_logger::Builder::new()
        .filter_level(level_for(verbosity))
        .format_timestamp(None)
        .parse_env(LOG_ENV)
        .try_init();
}
