//! Log levels and the stderr tracing subscriber

use std::fmt;
use std::str::FromStr;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Log verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Off,
}

impl LogLevel {
    /// Directive understood by [`EnvFilter`].
    #[must_use]
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
            LogLevel::Off => write!(f, "OFF"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "off" | "none" => Ok(LogLevel::Off),
            other => Err(format!("unknown log level: {other}")),
        }
    }
}

/// Install a global fmt subscriber writing to stderr.
///
/// `RUST_LOG` takes precedence over `level` when set. Returns `false` if a
/// global subscriber was already installed, in which case nothing changes.
pub fn init_logging(level: LogLevel) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_filter()));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use test_case::test_case;

    #[test_case("trace", LogLevel::Trace)]
    #[test_case("DEBUG", LogLevel::Debug)]
    #[test_case("Info", LogLevel::Info)]
    #[test_case("warning", LogLevel::Warn)]
    #[test_case("error", LogLevel::Error)]
    #[test_case("off", LogLevel::Off)]
    fn LogLevel___from_str___parses_case_insensitively(input: &str, expected: LogLevel) {
        assert_eq!(input.parse::<LogLevel>(), Ok(expected));
    }

    #[test]
    fn LogLevel___from_str___rejects_unknown() {
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn LogLevel___ordering___trace_is_most_verbose() {
        assert!(LogLevel::Trace < LogLevel::Debug);
        assert!(LogLevel::Error < LogLevel::Off);
    }

    #[test]
    fn LogLevel___display___is_uppercase() {
        assert_eq!(LogLevel::Warn.to_string(), "WARN");
        assert_eq!(LogLevel::default().as_filter(), "info");
    }

    #[test]
    fn init_logging___second_call___is_harmless() {
        init_logging(LogLevel::Debug);

        assert!(!init_logging(LogLevel::Info));
    }
}
