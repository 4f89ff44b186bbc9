//! Side channel for recovered oversized lines
//!
//! Diagnostics are best effort and are not ordered relative to the decoded
//! lines; each one carries the position of the line it describes.

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::overflow::OverflowMode;

/// Record of one oversized line that the stream recovered from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverflowDiagnostic {
    /// Mode that handled the line.
    pub mode: OverflowMode,
    /// 1-based position of the line in the stream.
    pub line_number: u64,
    /// Full length of the line in bytes, terminator excluded.
    pub line_length: usize,
    /// Truncated bytes for `Truncate`, the full raw line for `DeadLetter`.
    pub bytes: Option<Bytes>,
}

/// Consumer of [`OverflowDiagnostic`]s.
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, diagnostic: OverflowDiagnostic);
}

impl<F> DiagnosticSink for F
where
    F: Fn(OverflowDiagnostic) + Send + Sync,
{
    fn record(&self, diagnostic: OverflowDiagnostic) {
        self(diagnostic)
    }
}

/// Logs each diagnostic as a `tracing` warning. Used when no sink is given.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&self, diagnostic: OverflowDiagnostic) {
        tracing::warn!(
            mode = %diagnostic.mode,
            line_number = diagnostic.line_number,
            line_length = diagnostic.line_length,
            captured = diagnostic.bytes.as_ref().map_or(0, Bytes::len),
            "oversized SSE line"
        );
    }
}

/// Forwards diagnostics into a bounded channel.
///
/// A full or closed channel drops the diagnostic rather than stalling the
/// stream.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<OverflowDiagnostic>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<OverflowDiagnostic>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    pub fn from_sender(tx: mpsc::Sender<OverflowDiagnostic>) -> Self {
        Self { tx }
    }
}

impl DiagnosticSink for ChannelSink {
    fn record(&self, diagnostic: OverflowDiagnostic) {
        if let Err(err) = self.tx.try_send(diagnostic) {
            let dropped = match &err {
                mpsc::error::TrySendError::Full(d) | mpsc::error::TrySendError::Closed(d) => d,
            };
            tracing::debug!(
                line_number = dropped.line_number,
                closed = matches!(err, mpsc::error::TrySendError::Closed(_)),
                "overflow diagnostic dropped"
            );
        }
    }
}
