//! Event output

use anyhow::Context;
use clap::ValueEnum;
use eventline::SseEvent;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWrite, AsyncWriteExt};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// One JSON object per event
    #[default]
    Json,
    /// Events re-encoded in SSE wire form
    Text,
}

#[derive(Serialize)]
struct EventRecord<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    event: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_ms: Option<u64>,
    data: &'a str,
}

fn retry_ms(event: &SseEvent) -> Option<u64> {
    event
        .retry
        .map(|retry| u64::try_from(retry.as_millis()).unwrap_or(u64::MAX))
}

/// Format one event, newline included.
pub fn render(event: &SseEvent, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => {
            let record = EventRecord {
                event: event.event.as_deref(),
                id: event.id.as_deref(),
                retry_ms: retry_ms(event),
                data: &event.data,
            };
            let mut line = serde_json::to_string(&record).context("failed to encode event")?;
            line.push('\n');
            Ok(line)
        }
        OutputFormat::Text => {
            let mut out = String::new();
            if let Some(name) = &event.event {
                out.push_str(&format!("event: {}\n", name));
            }
            if let Some(id) = &event.id {
                out.push_str(&format!("id: {}\n", id));
            }
            if let Some(ms) = retry_ms(event) {
                out.push_str(&format!("retry: {}\n", ms));
            }
            for line in event.data.split('\n') {
                out.push_str(&format!("data: {}\n", line));
            }
            out.push('\n');
            Ok(out)
        }
    }
}

/// Writes rendered events, flushing after each so piped consumers see them
/// as they arrive.
pub struct EventWriter<W> {
    out: W,
    format: OutputFormat,
}

impl<W: AsyncWrite + Unpin> EventWriter<W> {
    pub fn new(out: W, format: OutputFormat) -> Self {
        Self { out, format }
    }

    pub async fn write(&mut self, event: &SseEvent) -> anyhow::Result<()> {
        let rendered = render(event, self.format)?;
        self.out
            .write_all(rendered.as_bytes())
            .await
            .context("failed to write event")?;
        self.out.flush().await.context("failed to flush output")?;
        Ok(())
    }
}
