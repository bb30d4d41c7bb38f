//! Which categories of tester activity get logged
//!
//! The mask only decides whether the tester emits a `tracing` event for a
//! category; the installed subscriber's filter still applies afterwards.

use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;

/// Bit mask of log categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LogLevel(u8);

impl LogLevel {
    pub const NONE: LogLevel = LogLevel(0x0);
    /// Run start and finish
    pub const INFO: LogLevel = LogLevel(0x1);
    /// Values written to the stream
    pub const INPUT: LogLevel = LogLevel(0x2);
    /// Values delivered from the stream
    pub const OUTPUT: LogLevel = LogLevel(0x4);
    /// Cursor movement and baton hand-offs
    pub const INTERNALS: LogLevel = LogLevel(0x8);

    pub const INTERACTION: LogLevel = LogLevel(Self::INPUT.0 | Self::OUTPUT.0);
    pub const ALL: LogLevel =
        LogLevel(Self::INFO.0 | Self::INPUT.0 | Self::OUTPUT.0 | Self::INTERNALS.0);

    /// Whether any category in `other` is enabled
    pub fn enables(self, other: LogLevel) -> bool {
        self.0 & other.0 != 0
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for LogLevel {
    type Output = LogLevel;

    fn bitor(self, rhs: LogLevel) -> LogLevel {
        LogLevel(self.0 | rhs.0)
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == LogLevel::NONE {
            return f.write_str("none");
        }
        let names = [
            (LogLevel::INFO, "info"),
            (LogLevel::INPUT, "input"),
            (LogLevel::OUTPUT, "output"),
            (LogLevel::INTERNALS, "internals"),
        ];
        let enabled: Vec<&str> = names
            .iter()
            .filter(|(level, _)| self.enables(*level))
            .map(|(_, name)| *name)
            .collect();
        f.write_str(&enabled.join(","))
    }
}

/// Error parsing a log level list
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown log category '{0}'. Expected: none, info, input, output, internals, interaction, all")]
pub struct ParseLogLevelError(String);

impl FromStr for LogLevel {
    type Err = ParseLogLevelError;

    /// Parse a comma-separated list such as `"info,input"` or `"all"`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .try_fold(LogLevel::NONE, |acc, part| {
                let level = match part.to_lowercase().as_str() {
                    "none" => LogLevel::NONE,
                    "info" => LogLevel::INFO,
                    "input" => LogLevel::INPUT,
                    "output" => LogLevel::OUTPUT,
                    "internals" => LogLevel::INTERNALS,
                    "interaction" => LogLevel::INTERACTION,
                    "all" => LogLevel::ALL,
                    _ => return Err(ParseLogLevelError(part.to_string())),
                };
                Ok(acc | level)
            })
    }
}
