#![deny(missing_docs)]

//! Installs the global `tracing` subscriber for forma binaries.
//!
//! Library crates only emit events; nothing is printed until a binary calls
//! [`init`] with a level.

use std::{io, str::FromStr};

use tracing_subscriber::fmt;

pub use tracing_core::Level;

/// possible log levels
pub const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Initializes a global tracing subscriber writing to stderr.
///
/// `None` leaves logging off. `info` and above use a compact format, `debug`
/// adds timestamps and targets, `trace` adds thread ids so interleaved
/// refreshes can be told apart.
pub fn init(level: Option<Level>) {
    // by default, no logs are printed.
    let Some(level) = level else {
        return;
    };
    let builder = fmt().with_max_level(level).with_writer(io::stderr);
    if level == Level::TRACE {
        builder.with_thread_ids(true).with_thread_names(true).init();
    } else if level == Level::DEBUG {
        builder.init();
    } else {
        builder
            .event_format(fmt::format().without_time().with_target(false).compact())
            .init();
    }
}

/// Parses one of [`LEVELS`], ignoring case
pub fn parse_level(level: &str) -> Result<Level, String> {
    Level::from_str(&level.to_ascii_lowercase())
        .map_err(|_| format!("'{level}' is not one of {}", LEVELS.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::{parse_level, Level, LEVELS};

    #[test]
    fn it_parses_all_possible_levels() {
        for level in &LEVELS {
            assert!(parse_level(level).is_ok());
        }
    }

    #[test]
    fn it_ignores_case() {
        assert_eq!(parse_level("DEBUG"), Ok(Level::DEBUG));
    }

    #[test]
    fn it_rejects_unknown_levels() {
        assert!(parse_level("loud").is_err());
    }
}
