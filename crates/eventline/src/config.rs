//! Decoder settings

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::overflow::OverflowMode;

/// Default cap for a single buffered line (64 KiB).
pub const DEFAULT_MAX_LINE_SIZE: usize = 64 * 1024;

/// Invalid decoder settings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("max_line_size must be a positive number of bytes")]
    ZeroMaxLineSize,
    #[error("unknown overflow mode: {0:?}")]
    UnknownOverflowMode(String),
}

/// Settings consumed by one stream's decoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Longest line kept in the bounded buffer, in bytes. A line of exactly
    /// this length is accepted.
    #[serde(default = "default_max_line_size")]
    pub max_line_size: usize,
    /// Behavior once a line grows past `max_line_size`.
    #[serde(default)]
    pub overflow_mode: OverflowMode,
}

fn default_max_line_size() -> usize {
    DEFAULT_MAX_LINE_SIZE
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_line_size: DEFAULT_MAX_LINE_SIZE,
            overflow_mode: OverflowMode::default(),
        }
    }
}

impl DecoderConfig {
    pub fn new(max_line_size: usize, overflow_mode: OverflowMode) -> Self {
        Self {
            max_line_size,
            overflow_mode,
        }
    }

    pub fn with_max_line_size(mut self, max_line_size: usize) -> Self {
        self.max_line_size = max_line_size;
        self
    }

    pub fn with_overflow_mode(mut self, overflow_mode: OverflowMode) -> Self {
        self.overflow_mode = overflow_mode;
        self
    }

    /// Check the settings before handing them to a decoder.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_line_size == 0 {
            return Err(ConfigError::ZeroMaxLineSize);
        }
        Ok(())
    }
}
