//! Event assembly
//!
//! Groups logical lines into SSE events. A block of lines is closed by a
//! blank line; blocks without any recognized field are skipped, and a block
//! still open when the stream ends is never emitted.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::line::LogicalLine;

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Classification of a single line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseField {
    Data(String),
    Event(String),
    Id(String),
    Retry(Duration),
    Comment(String),
    Blank,
}

impl SseField {
    /// Classify a line, terminator already stripped.
    ///
    /// Returns `None` for lines the grammar says to ignore: unknown field
    /// names, `retry` values that are not non-negative integers, and `id`
    /// values containing NUL.
    pub fn parse(line: &[u8]) -> Option<SseField> {
        if line.is_empty() {
            return Some(SseField::Blank);
        }

        if let Some(comment) = line.strip_prefix(b":") {
            return Some(SseField::Comment(lossy(strip_space(comment))));
        }

        let (name, value) = match line.iter().position(|b| *b == b':') {
            Some(colon) => (&line[..colon], strip_space(&line[colon + 1..])),
            None => (line, &[][..]),
        };

        match name {
            b"data" => Some(SseField::Data(lossy(value))),
            b"event" => Some(SseField::Event(lossy(value))),
            b"id" if !value.contains(&0) => Some(SseField::Id(lossy(value))),
            b"retry" => parse_retry(value).map(SseField::Retry),
            _ => None,
        }
    }
}

fn strip_space(value: &[u8]) -> &[u8] {
    value.strip_prefix(b" ").unwrap_or(value)
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn parse_retry(value: &[u8]) -> Option<Duration> {
    if value.is_empty() || !value.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(value)
        .ok()?
        .parse::<u64>()
        .ok()
        .map(Duration::from_millis)
}

/// One dispatched event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SseEvent {
    /// Event name from the last `event` field of the block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    /// Value of the last `id` field of the block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Reconnection delay from the last valid `retry` field of the block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<Duration>,
    /// All `data` lines of the block joined with `\n`.
    pub data: String,
}

impl SseEvent {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            ..Default::default()
        }
    }

    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_retry(mut self, retry: Duration) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Event name with the SSE default of `message` applied.
    pub fn event_type(&self) -> &str {
        self.event.as_deref().unwrap_or("message")
    }
}

/// Builds events from a line sequence for one stream.
#[derive(Debug, Default)]
pub struct EventAssembler {
    event: Option<String>,
    id: Option<String>,
    retry: Option<Duration>,
    data: Option<String>,
    has_fields: bool,
    started: bool,
    last_event_id: Option<String>,
}

impl EventAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one line, returning the event it completes, if any.
    pub fn push(&mut self, line: &LogicalLine) -> Option<SseEvent> {
        self.push_bytes(line.as_bytes())
    }

    /// Apply one line given as raw bytes, terminator stripped.
    pub fn push_bytes(&mut self, mut line: &[u8]) -> Option<SseEvent> {
        if !self.started {
            self.started = true;
            line = line.strip_prefix(BOM).unwrap_or(line);
        }

        match SseField::parse(line)? {
            SseField::Blank => self.dispatch(),
            SseField::Data(value) => {
                match &mut self.data {
                    Some(data) => {
                        data.push('\n');
                        data.push_str(&value);
                    }
                    None => self.data = Some(value),
                }
                self.has_fields = true;
                None
            }
            SseField::Event(name) => {
                self.event = Some(name);
                self.has_fields = true;
                None
            }
            SseField::Id(id) => {
                self.id = Some(id);
                self.has_fields = true;
                None
            }
            SseField::Retry(retry) => {
                self.retry = Some(retry);
                self.has_fields = true;
                None
            }
            SseField::Comment(_) => None,
        }
    }

    /// Whether the current block holds at least one recognized field.
    pub fn has_pending(&self) -> bool {
        self.has_fields
    }

    /// Id of the most recent emitted event that carried one.
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Discard the block in progress.
    pub fn reset(&mut self) {
        self.event = None;
        self.id = None;
        self.retry = None;
        self.data = None;
        self.has_fields = false;
    }

    /// Signal end of stream. An open block is discarded, never emitted.
    pub fn finish(&mut self) {
        if self.has_fields {
            tracing::debug!("discarding unterminated SSE event at end of stream");
        }
        self.reset();
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if !self.has_fields {
            return None;
        }

        let event = SseEvent {
            event: self.event.take(),
            id: self.id.take(),
            retry: self.retry.take(),
            data: self.data.take().unwrap_or_default(),
        };
        self.has_fields = false;

        if event.id.is_some() {
            self.last_event_id = event.id.clone();
        }
        Some(event)
    }
}
