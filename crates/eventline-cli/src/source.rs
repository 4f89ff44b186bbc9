//! Chunk sources: files, stdin and HTTP response bodies

use anyhow::Context;
use bytes::Bytes;
use eventline::BoxError;
use futures::{Stream, TryStreamExt};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use std::pin::Pin;
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

use crate::cli::Input;

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Bytes, BoxError>> + Send>>;

pub async fn open(input: &Input, last_event_id: Option<&str>) -> anyhow::Result<ChunkStream> {
    match input {
        Input::Stdin => Ok(reader_stream(tokio::io::stdin())),
        Input::File(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?;
            Ok(reader_stream(file))
        }
        Input::Url(url) => fetch(url, last_event_id).await,
    }
}

fn reader_stream<R>(reader: R) -> ChunkStream
where
    R: AsyncRead + Send + 'static,
{
    Box::pin(ReaderStream::new(reader).map_err(BoxError::from))
}

async fn fetch(url: &str, last_event_id: Option<&str>) -> anyhow::Result<ChunkStream> {
    let mut request = reqwest::Client::new()
        .get(url)
        .header(ACCEPT, "text/event-stream")
        .header(CACHE_CONTROL, "no-cache");
    if let Some(id) = last_event_id {
        request = request.header("Last-Event-ID", id);
    }

    let response = request
        .send()
        .await
        .with_context(|| format!("request to {} failed", url))?
        .error_for_status()
        .with_context(|| format!("server rejected stream request to {}", url))?;

    tracing::info!(url, status = %response.status(), "connected to event stream");
    Ok(Box::pin(response.bytes_stream().map_err(BoxError::from)))
}
