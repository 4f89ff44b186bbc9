//! Eventline - incremental Server-Sent Events decoding
//!
//! Turns an arbitrarily chunked byte stream, typically the body of a
//! long-lived HTTP response, into SSE events while holding at most a
//! configured number of bytes for any unterminated line.
//!
//! ```text
//! chunk source ──> [LineAccumulator] ──> LogicalLine ──> [EventAssembler] ──> SseEvent
//!                         │
//!                   OverflowMode ──> DiagnosticSink (side channel)
//! ```
//!
//! ```rust
//! use eventline::{DecoderConfig, OverflowMode, SseDecoder};
//!
//! let config = DecoderConfig::new(1024, OverflowMode::LogAndSkip);
//! let mut decoder = SseDecoder::with_config(&config);
//! let mut events = Vec::new();
//!
//! decoder.feed(b"event: greet\ndata: hel", &mut events).unwrap();
//! decoder.feed(b"lo\n\n", &mut events).unwrap();
//! decoder.finish();
//!
//! assert_eq!(events[0].event.as_deref(), Some("greet"));
//! assert_eq!(events[0].data, "hello");
//! ```

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod event;
pub mod line;
pub mod overflow;
pub mod stream;

pub use config::{ConfigError, DecoderConfig, DEFAULT_MAX_LINE_SIZE};
pub use diagnostics::{ChannelSink, DiagnosticSink, OverflowDiagnostic, TracingSink};
pub use error::{BoxError, DecodeError, DecodeResult};
pub use event::{EventAssembler, SseEvent, SseField};
pub use line::{LineAccumulator, LineStats, LogicalLine};
pub use overflow::{OverflowDecision, OverflowMode};
pub use stream::{decode_events, EventStream, LineStream, SseDecoder};
