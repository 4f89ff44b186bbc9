//! Oversized line policy
//!
//! When a line grows past the configured limit before its terminator arrives,
//! the accumulator asks the configured [`OverflowMode`] once for a decision and
//! applies it until the line ends.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::ConfigError;

/// Configured behavior for oversized lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowMode {
    /// End the stream with [`DecodeError::LineTooLong`](crate::DecodeError::LineTooLong).
    #[default]
    #[serde(alias = "fail-stream", alias = "FailStream")]
    FailStream,
    /// Discard the line and keep going.
    #[serde(alias = "log-and-skip", alias = "LogAndSkip")]
    LogAndSkip,
    /// Keep the first `max_line_size` bytes as if they were the whole line.
    ///
    /// This can merge what the producer meant as distinct content into one
    /// shortened line.
    #[serde(alias = "Truncate")]
    Truncate,
    /// Keep the whole raw line out of band and emit nothing for it.
    #[serde(alias = "dead-letter", alias = "DeadLetter")]
    DeadLetter,
}

/// What to do with one oversized line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverflowDecision {
    /// Stop producing lines; the stream fails.
    Abort,
    /// Emit nothing for the line.
    Drop,
    /// Emit only the first `n` bytes.
    Truncate(usize),
    /// Emit nothing on the main sequence; capture the full line starting with
    /// these bytes for the side channel.
    Reroute(Vec<u8>),
}

impl OverflowMode {
    pub const ALL: [OverflowMode; 4] = [
        OverflowMode::FailStream,
        OverflowMode::LogAndSkip,
        OverflowMode::Truncate,
        OverflowMode::DeadLetter,
    ];

    /// Decide how to treat an oversized line.
    ///
    /// `prefix` is the bounded head of the line, exactly `max_line_size`
    /// bytes long at the time the limit is crossed.
    pub fn decide(self, prefix: &[u8]) -> OverflowDecision {
        match self {
            OverflowMode::FailStream => OverflowDecision::Abort,
            OverflowMode::LogAndSkip => OverflowDecision::Drop,
            OverflowMode::Truncate => OverflowDecision::Truncate(prefix.len()),
            OverflowMode::DeadLetter => OverflowDecision::Reroute(prefix.to_vec()),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OverflowMode::FailStream => "fail_stream",
            OverflowMode::LogAndSkip => "log_and_skip",
            OverflowMode::Truncate => "truncate",
            OverflowMode::DeadLetter => "dead_letter",
        }
    }
}

impl fmt::Display for OverflowMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OverflowMode {
    type Err = ConfigError;

    /// Accepts `fail_stream`, `fail-stream` and `FailStream` spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .map(|c| c.to_ascii_lowercase())
            .collect();

        match normalized.as_str() {
            "failstream" => Ok(OverflowMode::FailStream),
            "logandskip" => Ok(OverflowMode::LogAndSkip),
            "truncate" => Ok(OverflowMode::Truncate),
            "deadletter" => Ok(OverflowMode::DeadLetter),
            _ => Err(ConfigError::UnknownOverflowMode(s.to_string())),
        }
    }
}
