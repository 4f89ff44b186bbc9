//! Writes dead-lettered lines to a directory, one file per line.

use anyhow::Context;
use eventline::{OverflowDiagnostic, OverflowMode};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Diagnostics queued between the decoder and the writer task.
pub const QUEUE_CAPACITY: usize = 1024;

pub fn file_name(line_number: u64) -> String {
    format!("line-{:010}.bin", line_number)
}

/// Drain `rx` until every sender is gone, returning the number of files
/// written. Diagnostics from other modes are logged only.
pub fn spawn(
    dir: PathBuf,
    rx: mpsc::Receiver<OverflowDiagnostic>,
) -> JoinHandle<anyhow::Result<u64>> {
    tokio::spawn(drain(dir, rx))
}

async fn drain(dir: PathBuf, mut rx: mpsc::Receiver<OverflowDiagnostic>) -> anyhow::Result<u64> {
    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("failed to create dead-letter directory {}", dir.display()))?;

    let mut written = 0;
    while let Some(diagnostic) = rx.recv().await {
        tracing::warn!(
            mode = %diagnostic.mode,
            line_number = diagnostic.line_number,
            line_length = diagnostic.line_length,
            "oversized SSE line"
        );

        if diagnostic.mode != OverflowMode::DeadLetter {
            continue;
        }
        let Some(bytes) = diagnostic.bytes else {
            continue;
        };

        let path = dir.join(file_name(diagnostic.line_number));
        write(&path, &bytes).await?;
        tracing::info!(path = %path.display(), bytes = bytes.len(), "dead-lettered line written");
        written += 1;
    }
    Ok(written)
}

async fn write(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("failed to write {}", path.display()))
}
