//! Decode errors
//!
//! Only two conditions terminate a decoded stream: a failure reported by the
//! chunk source, and an oversized line under [`OverflowMode::FailStream`].
//! Everything else the SSE grammar tolerates is recovered locally.
//!
//! [`OverflowMode::FailStream`]: crate::overflow::OverflowMode::FailStream

use thiserror::Error;

/// Opaque cause carried by a transport failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias for decoder operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Terminal failure of a line or event stream.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The chunk source failed; the cause is passed through untouched.
    #[error("transport failure: {0}")]
    Transport(#[source] BoxError),

    /// A line outgrew the configured limit while the stream was configured to
    /// fail on oversized lines.
    #[error("line {line_number} exceeds the maximum line size of {limit} bytes")]
    LineTooLong { limit: usize, line_number: u64 },
}

impl DecodeError {
    /// Wrap a transport error.
    pub fn transport(err: impl Into<BoxError>) -> Self {
        DecodeError::Transport(err.into())
    }

    /// Whether the failure originated in the chunk source.
    pub fn is_transport(&self) -> bool {
        matches!(self, DecodeError::Transport(_))
    }

    /// Whether the failure is an oversized line under `FailStream`.
    pub fn is_line_too_long(&self) -> bool {
        matches!(self, DecodeError::LineTooLong { .. })
    }
}
