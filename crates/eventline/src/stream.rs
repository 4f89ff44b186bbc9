//! Pull-based stream adapters
//!
//! [`LineStream`] and [`EventStream`] wrap a chunk source and only poll it when
//! every line completed by the previous chunk has been handed out, so the
//! consumer's pace bounds how far ahead of it the source is read. Dropping a
//! stream drops its source and any partially built line or event.

use futures::{ready, Stream};
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::config::DecoderConfig;
use crate::diagnostics::DiagnosticSink;
use crate::error::{BoxError, DecodeError, DecodeResult};
use crate::event::{EventAssembler, SseEvent};
use crate::line::{LineAccumulator, LineStats, LogicalLine};

/// Logical lines decoded from a chunk source.
pub struct LineStream<S> {
    source: S,
    accumulator: LineAccumulator,
    ready: VecDeque<LogicalLine>,
    failure: Option<DecodeError>,
    done: bool,
}

impl<S> LineStream<S> {
    pub fn new(source: S, accumulator: LineAccumulator) -> Self {
        Self {
            source,
            accumulator,
            ready: VecDeque::new(),
            failure: None,
            done: false,
        }
    }

    pub fn with_config(source: S, config: &DecoderConfig) -> Self {
        Self::new(source, LineAccumulator::new(config))
    }

    pub fn stats(&self) -> LineStats {
        self.accumulator.stats()
    }

    pub fn get_ref(&self) -> &S {
        &self.source
    }

    fn fail(&mut self, err: DecodeError) -> Poll<Option<DecodeResult<LogicalLine>>> {
        self.done = true;
        self.accumulator.discard();
        self.ready.clear();
        Poll::Ready(Some(Err(err)))
    }
}

impl<S, B, E> Stream for LineStream<S>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Into<BoxError>,
{
    type Item = DecodeResult<LogicalLine>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(line) = this.ready.pop_front() {
                return Poll::Ready(Some(Ok(line)));
            }
            if let Some(err) = this.failure.take() {
                return this.fail(err);
            }
            if this.done {
                return Poll::Ready(None);
            }

            match ready!(Pin::new(&mut this.source).poll_next(cx)) {
                Some(Ok(chunk)) => {
                    if let Err(err) = this.accumulator.feed(chunk.as_ref(), &mut this.ready) {
                        // Lines completed ahead of the oversized one go out first.
                        this.failure = Some(err);
                    }
                }
                Some(Err(err)) => {
                    return this.fail(DecodeError::transport(err));
                }
                None => {
                    this.done = true;
                    let stats = this.accumulator.stats();
                    tracing::debug!(
                        lines = stats.lines,
                        oversized = stats.oversized(),
                        "SSE source ended"
                    );
                    if let Some(line) = this.accumulator.finish() {
                        return Poll::Ready(Some(Ok(line)));
                    }
                    return Poll::Ready(None);
                }
            }
        }
    }
}

/// SSE events decoded from a chunk source.
pub struct EventStream<S> {
    lines: LineStream<S>,
    assembler: EventAssembler,
    events: u64,
}

impl<S> EventStream<S> {
    pub fn new(source: S, accumulator: LineAccumulator) -> Self {
        Self {
            lines: LineStream::new(source, accumulator),
            assembler: EventAssembler::new(),
            events: 0,
        }
    }

    pub fn with_config(source: S, config: &DecoderConfig) -> Self {
        Self::new(source, LineAccumulator::new(config))
    }

    pub fn line_stats(&self) -> LineStats {
        self.lines.stats()
    }

    /// Events emitted so far.
    pub fn event_count(&self) -> u64 {
        self.events
    }

    /// Id of the most recent emitted event that carried one.
    pub fn last_event_id(&self) -> Option<&str> {
        self.assembler.last_event_id()
    }
}

impl<S, B, E> Stream for EventStream<S>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Into<BoxError>,
{
    type Item = DecodeResult<SseEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            match ready!(Pin::new(&mut this.lines).poll_next(cx)) {
                Some(Ok(line)) => {
                    if let Some(event) = this.assembler.push(&line) {
                        this.events += 1;
                        return Poll::Ready(Some(Ok(event)));
                    }
                }
                Some(Err(err)) => {
                    this.assembler.reset();
                    return Poll::Ready(Some(Err(err)));
                }
                None => {
                    this.assembler.finish();
                    return Poll::Ready(None);
                }
            }
        }
    }
}

/// Decode SSE events from `source`, reporting overflow diagnostics to `sink`.
///
/// # Panics
///
/// Panics if `config.max_line_size` is zero.
pub fn decode_events<S>(
    source: S,
    config: &DecoderConfig,
    sink: Arc<dyn DiagnosticSink>,
) -> EventStream<S> {
    EventStream::new(source, LineAccumulator::new(config).with_sink(sink))
}

/// Push-style decoder for callers that hold byte slices rather than a
/// [`Stream`].
#[derive(Debug)]
pub struct SseDecoder {
    accumulator: LineAccumulator,
    assembler: EventAssembler,
    lines: VecDeque<LogicalLine>,
}

impl SseDecoder {
    pub fn new(accumulator: LineAccumulator) -> Self {
        Self {
            accumulator,
            assembler: EventAssembler::new(),
            lines: VecDeque::new(),
        }
    }

    pub fn with_config(config: &DecoderConfig) -> Self {
        Self::new(LineAccumulator::new(config))
    }

    /// Decode one chunk, pushing completed events onto `out`.
    ///
    /// Events completed before a failure are still pushed.
    pub fn feed(&mut self, chunk: &[u8], out: &mut Vec<SseEvent>) -> DecodeResult<()> {
        let result = self.accumulator.feed(chunk, &mut self.lines);
        for line in self.lines.drain(..) {
            if let Some(event) = self.assembler.push(&line) {
                out.push(event);
            }
        }
        if result.is_err() {
            self.assembler.reset();
        }
        result
    }

    /// Signal end of stream. Never yields an event: a block still open here
    /// had no terminating blank line.
    pub fn finish(&mut self) {
        // Resolves a trailing oversized line; the line itself cannot close a block.
        let _ = self.accumulator.finish();
        self.assembler.finish();
    }

    pub fn line_stats(&self) -> LineStats {
        self.accumulator.stats()
    }

    pub fn last_event_id(&self) -> Option<&str> {
        self.assembler.last_event_id()
    }
}
