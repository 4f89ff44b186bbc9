//! Line reconstruction
//!
//! Turns arbitrarily chunked bytes into logical lines terminated by `\n`,
//! `\r` or `\r\n`, holding at most `max_line_size` bytes of any unterminated
//! line in memory. Lines that outgrow the limit are handed to the configured
//! [`OverflowMode`].

use bytes::{Bytes, BytesMut};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use crate::config::DecoderConfig;
use crate::diagnostics::{DiagnosticSink, OverflowDiagnostic, TracingSink};
use crate::error::{DecodeError, DecodeResult};
use crate::overflow::{OverflowDecision, OverflowMode};

const LF: u8 = b'\n';
const CR: u8 = b'\r';

/// One terminator-delimited line, terminator stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalLine {
    bytes: Bytes,
    number: u64,
    truncated: bool,
}

impl LogicalLine {
    pub fn new(bytes: impl Into<Bytes>, number: u64) -> Self {
        Self {
            bytes: bytes.into(),
            number,
            truncated: false,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    /// 1-based position of the line in the stream, counting lines that were
    /// dropped or rerouted.
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Set when the line is the head of an oversized line kept by
    /// [`OverflowMode::Truncate`].
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Counters for one stream's lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineStats {
    /// Lines emitted, truncated ones included.
    pub lines: u64,
    pub dropped: u64,
    pub truncated: u64,
    pub rerouted: u64,
}

impl LineStats {
    pub fn oversized(&self) -> u64 {
        self.dropped + self.truncated + self.rerouted
    }
}

/// Handling of the current line after it crossed the limit.
enum Overflow {
    Skipping,
    Truncating,
    Capturing(BytesMut),
}

struct OversizedLine {
    handling: Overflow,
    length: usize,
}

impl OversizedLine {
    fn absorb(&mut self, bytes: &[u8]) {
        self.length += bytes.len();
        if let Overflow::Capturing(capture) = &mut self.handling {
            capture.extend_from_slice(bytes);
        }
    }
}

/// Incremental, bounded line splitter for one stream.
pub struct LineAccumulator {
    max_line_size: usize,
    mode: OverflowMode,
    buffer: BytesMut,
    oversized: Option<OversizedLine>,
    // A `\r` ended the previous chunk; a leading `\n` in the next one belongs
    // to the same terminator.
    pending_cr: bool,
    line_number: u64,
    aborted: Option<u64>,
    sink: Arc<dyn DiagnosticSink>,
    stats: LineStats,
}

impl fmt::Debug for LineAccumulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineAccumulator")
            .field("max_line_size", &self.max_line_size)
            .field("mode", &self.mode)
            .field("buffered", &self.buffer.len())
            .field("oversized", &self.oversized.is_some())
            .field("line_number", &self.line_number)
            .field("aborted", &self.aborted)
            .field("stats", &self.stats)
            .finish()
    }
}

impl LineAccumulator {
    /// Create an accumulator that reports diagnostics through [`TracingSink`].
    ///
    /// # Panics
    ///
    /// Panics if `config.max_line_size` is zero; validate configuration with
    /// [`DecoderConfig::validate`] first.
    pub fn new(config: &DecoderConfig) -> Self {
        assert!(
            config.max_line_size > 0,
            "max_line_size must be a positive number of bytes"
        );
        Self {
            max_line_size: config.max_line_size,
            mode: config.overflow_mode,
            buffer: BytesMut::new(),
            oversized: None,
            pending_cr: false,
            line_number: 0,
            aborted: None,
            sink: Arc::new(TracingSink),
            stats: LineStats::default(),
        }
    }

    /// Route overflow diagnostics to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn max_line_size(&self) -> usize {
        self.max_line_size
    }

    pub fn mode(&self) -> OverflowMode {
        self.mode
    }

    pub fn stats(&self) -> LineStats {
        self.stats
    }

    /// Bytes held for the current unterminated line in the bounded buffer.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }

    /// Scan one chunk, pushing every line it completes onto `out`.
    ///
    /// Lines completed before an oversized line fails the stream are still
    /// pushed. Once failed, every further call returns the same error.
    pub fn feed(&mut self, chunk: &[u8], out: &mut VecDeque<LogicalLine>) -> DecodeResult<()> {
        if let Some(line_number) = self.aborted {
            return Err(self.too_long(line_number));
        }

        let mut rest = chunk;
        if self.pending_cr && !rest.is_empty() {
            self.pending_cr = false;
            if rest[0] == LF {
                rest = &rest[1..];
            }
        }

        while let Some(pos) = rest.iter().position(|b| *b == LF || *b == CR) {
            self.append(&rest[..pos])?;
            let terminator = rest[pos];
            rest = &rest[pos + 1..];

            if terminator == CR {
                match rest.first() {
                    Some(&LF) => rest = &rest[1..],
                    Some(_) => {}
                    None => self.pending_cr = true,
                }
            }

            if let Some(line) = self.terminate() {
                out.push_back(line);
            }
        }

        self.append(rest)
    }

    /// Signal end of stream, returning the unterminated trailing line if any.
    ///
    /// An oversized trailing line is resolved by the configured mode as if it
    /// had been terminated.
    pub fn finish(&mut self) -> Option<LogicalLine> {
        self.pending_cr = false;
        if self.aborted.is_some() {
            return None;
        }
        if self.oversized.is_none() && self.buffer.is_empty() {
            return None;
        }
        self.terminate()
    }

    /// Drop the partial line without emitting it, e.g. after a transport
    /// failure.
    pub fn discard(&mut self) {
        self.buffer = BytesMut::new();
        self.oversized = None;
        self.pending_cr = false;
    }

    fn append(&mut self, bytes: &[u8]) -> DecodeResult<()> {
        if bytes.is_empty() {
            return Ok(());
        }

        if let Some(oversized) = &mut self.oversized {
            oversized.absorb(bytes);
            return Ok(());
        }

        let room = self.max_line_size - self.buffer.len();
        if bytes.len() <= room {
            self.buffer.extend_from_slice(bytes);
            return Ok(());
        }

        let (head, tail) = bytes.split_at(room);
        self.buffer.extend_from_slice(head);
        let line_number = self.line_number + 1;

        let handling = match self.mode.decide(&self.buffer) {
            OverflowDecision::Abort => {
                tracing::debug!(
                    line_number,
                    limit = self.max_line_size,
                    "oversized SSE line, failing stream"
                );
                self.aborted = Some(line_number);
                self.discard();
                return Err(self.too_long(line_number));
            }
            OverflowDecision::Drop => {
                self.buffer.clear();
                Overflow::Skipping
            }
            OverflowDecision::Truncate(len) => {
                self.buffer.truncate(len);
                Overflow::Truncating
            }
            OverflowDecision::Reroute(prefix) => {
                self.buffer.clear();
                Overflow::Capturing(BytesMut::from(prefix.as_slice()))
            }
        };

        let mut oversized = OversizedLine {
            handling,
            length: self.max_line_size,
        };
        oversized.absorb(tail);
        self.oversized = Some(oversized);
        Ok(())
    }

    fn terminate(&mut self) -> Option<LogicalLine> {
        self.line_number += 1;
        let number = self.line_number;

        let Some(oversized) = self.oversized.take() else {
            self.stats.lines += 1;
            return Some(LogicalLine::new(self.buffer.split().freeze(), number));
        };

        let (line, bytes) = match oversized.handling {
            Overflow::Skipping => {
                self.stats.dropped += 1;
                (None, None)
            }
            Overflow::Truncating => {
                self.stats.lines += 1;
                self.stats.truncated += 1;
                let head = self.buffer.split().freeze();
                let line = LogicalLine {
                    bytes: head.clone(),
                    number,
                    truncated: true,
                };
                (Some(line), Some(head))
            }
            Overflow::Capturing(capture) => {
                self.stats.rerouted += 1;
                (None, Some(capture.freeze()))
            }
        };

        self.sink.record(OverflowDiagnostic {
            mode: self.mode,
            line_number: number,
            line_length: oversized.length,
            bytes,
        });
        line
    }

    fn too_long(&self, line_number: u64) -> DecodeError {
        DecodeError::LineTooLong {
            limit: self.max_line_size,
            line_number,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn accumulator(max: usize, mode: OverflowMode) -> LineAccumulator {
        LineAccumulator::new(&DecoderConfig::new(max, mode))
    }

    fn feed_all(acc: &mut LineAccumulator, chunks: &[&[u8]]) -> Vec<String> {
        let mut out = VecDeque::new();
        for chunk in chunks {
            acc.feed(chunk, &mut out).unwrap();
        }
        out.iter().map(LogicalLine::to_string_lossy).collect()
    }

    fn recording_sink() -> (Arc<dyn DiagnosticSink>, Arc<Mutex<Vec<OverflowDiagnostic>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = seen.clone();
            move |d: OverflowDiagnostic| seen.lock().unwrap().push(d)
        };
        (Arc::new(sink), seen)
    }

    #[test]
    fn test_lf_lines() {
        let mut acc = accumulator(64, OverflowMode::FailStream);
        let lines = feed_all(&mut acc, &[b"line1\nline2\n"]);
        assert_eq!(lines, vec!["line1", "line2"]);
    }

    #[test]
    fn test_crlf_lines() {
        let mut acc = accumulator(64, OverflowMode::FailStream);
        let lines = feed_all(&mut acc, &[b"line1\r\nline2\r\n"]);
        assert_eq!(lines, vec!["line1", "line2"]);
    }

    #[test]
    fn test_cr_lines() {
        let mut acc = accumulator(64, OverflowMode::FailStream);
        let lines = feed_all(&mut acc, &[b"line1\rline2\r"]);
        assert_eq!(lines, vec!["line1", "line2"]);
    }

    #[test]
    fn test_crlf_split_across_chunks() {
        let mut acc = accumulator(64, OverflowMode::FailStream);
        let lines = feed_all(&mut acc, &[b"line1\r", b"\nline2\r", b"", b"\n\r\n"]);
        assert_eq!(lines, vec!["line1", "line2", ""]);
    }

    #[test]
    fn test_cr_cr_is_two_lines() {
        let mut acc = accumulator(64, OverflowMode::FailStream);
        let lines = feed_all(&mut acc, &[b"a\r", b"\rb\n"]);
        assert_eq!(lines, vec!["a", "", "b"]);
    }

    #[test]
    fn test_partial_line_buffered() {
        let mut acc = accumulator(64, OverflowMode::FailStream);
        assert!(feed_all(&mut acc, &[b"par"]).is_empty());
        assert_eq!(acc.buffered_len(), 3);
        assert_eq!(feed_all(&mut acc, &[b"tial\n"]), vec!["partial"]);
        assert_eq!(acc.buffered_len(), 0);
    }

    #[test]
    fn test_line_numbers() {
        let mut acc = accumulator(64, OverflowMode::FailStream);
        let mut out = VecDeque::new();
        acc.feed(b"a\n\nb\n", &mut out).unwrap();
        let numbers: Vec<u64> = out.iter().map(LogicalLine::number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn test_finish_returns_trailing_line() {
        let mut acc = accumulator(64, OverflowMode::FailStream);
        assert!(feed_all(&mut acc, &[b"done\ntrailing"]).len() == 1);
        let line = acc.finish().unwrap();
        assert_eq!(line.as_bytes(), b"trailing");
        assert!(acc.finish().is_none());
    }

    #[test]
    fn test_finish_after_cr_has_nothing() {
        let mut acc = accumulator(64, OverflowMode::FailStream);
        assert_eq!(feed_all(&mut acc, &[b"x\r"]), vec!["x"]);
        assert!(acc.finish().is_none());
    }

    #[test]
    fn test_exact_limit_is_not_oversized() {
        let mut acc = accumulator(5, OverflowMode::FailStream);
        assert_eq!(feed_all(&mut acc, &[b"ab", b"cde\n"]), vec!["abcde"]);
        assert_eq!(acc.stats().oversized(), 0);
    }

    #[test]
    fn test_one_past_limit_fails_stream() {
        let mut acc = accumulator(5, OverflowMode::FailStream);
        let mut out = VecDeque::new();
        let err = acc.feed(b"ok\nabcdef\nlater\n", &mut out).unwrap_err();

        assert!(matches!(
            err,
            DecodeError::LineTooLong {
                limit: 5,
                line_number: 2
            }
        ));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].as_bytes(), b"ok");
        assert!(acc.is_aborted());
        assert_eq!(acc.buffered_len(), 0);

        assert!(acc.feed(b"more\n", &mut out).unwrap_err().is_line_too_long());
        assert!(acc.finish().is_none());
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_log_and_skip_drops_line() {
        let (sink, seen) = recording_sink();
        let mut acc = accumulator(4, OverflowMode::LogAndSkip).with_sink(sink);

        let lines = feed_all(&mut acc, &[b"123456", b"789\nok\n"]);
        assert_eq!(lines, vec!["ok"]);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].mode, OverflowMode::LogAndSkip);
        assert_eq!(seen[0].line_number, 1);
        assert_eq!(seen[0].line_length, 9);
        assert_eq!(seen[0].bytes, None);
        assert_eq!(acc.stats().dropped, 1);
    }

    #[test]
    fn test_truncate_keeps_head() {
        let (sink, seen) = recording_sink();
        let mut acc = accumulator(5, OverflowMode::Truncate).with_sink(sink);

        let mut out = VecDeque::new();
        acc.feed(b"data: abc", &mut out).unwrap();
        acc.feed(b"defgh\nnext\n", &mut out).unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].as_bytes(), b"data:");
        assert!(out[0].is_truncated());
        assert_eq!(out[1].as_bytes(), b"next");
        assert!(!out[1].is_truncated());

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].line_length, 14);
        assert_eq!(seen[0].bytes.as_deref(), Some(&b"data:"[..]));
    }

    #[test]
    fn test_dead_letter_captures_full_line() {
        let (sink, seen) = recording_sink();
        let mut acc = accumulator(3, OverflowMode::DeadLetter).with_sink(sink);

        let lines = feed_all(&mut acc, &[b"a\nabc", b"defg", b"hij\r\nb\n"]);
        assert_eq!(lines, vec!["a", "b"]);
        assert_eq!(acc.buffered_len(), 0);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].line_number, 2);
        assert_eq!(seen[0].line_length, 10);
        assert_eq!(seen[0].bytes.as_deref(), Some(&b"abcdefghij"[..]));
        assert_eq!(acc.stats().rerouted, 1);
    }

    #[test]
    fn test_oversized_trailing_line_resolved_on_finish() {
        let (sink, seen) = recording_sink();
        let mut acc = accumulator(2, OverflowMode::Truncate).with_sink(sink);

        assert!(feed_all(&mut acc, &[b"abcdef"]).is_empty());
        let line = acc.finish().unwrap();
        assert_eq!(line.as_bytes(), b"ab");
        assert_eq!(seen.lock().unwrap()[0].line_length, 6);
    }

    #[test]
    fn test_discard_releases_partial_line() {
        let mut acc = accumulator(8, OverflowMode::FailStream);
        feed_all(&mut acc, &[b"partial"]);
        acc.discard();
        assert_eq!(acc.buffered_len(), 0);
        assert!(acc.finish().is_none());
    }

    #[test]
    #[should_panic(expected = "max_line_size")]
    fn test_zero_limit_panics() {
        accumulator(0, OverflowMode::FailStream);
    }
}
