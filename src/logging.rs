//! Log sink setup for hosts and demos.
//!
//! The library itself only logs through the `log` facade. Binaries that want
//! output call [`init`] once; `RUST_LOG` overrides the level passed in.

use log::LevelFilter;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

/// Installs `env_logger` as the global logger.
///
/// Returns false if a logger was already installed, in which case nothing changes.
pub fn init(level: LogLevel) -> bool {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level.into());
    if let Ok(spec) = std::env::var("RUST_LOG") {
        builder.parse_filters(&spec);
    }
    builder.format_timestamp_millis();
    builder.try_init().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_convert_and_deserialize() {
        assert_eq!(LevelFilter::from(LogLevel::Debug), LevelFilter::Debug);
        let level: LogLevel = serde_json::from_str("\"trace\"").expect("level");
        assert_eq!(level, LogLevel::Trace);
        assert_eq!(LogLevel::default(), LogLevel::Warn);
    }

    #[test]
    fn init_is_idempotent() {
        init(LogLevel::Off);
        assert!(!init(LogLevel::Trace));
    }
}
