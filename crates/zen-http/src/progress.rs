//! Upload progress reporting.
//!
//! The meter only observes the bytes handed to the HTTP client; it has no
//! influence on the transfer.

use std::io;
use std::path::PathBuf;

use futures_util::Stream;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

/// Read size for streamed file bodies.
const CHUNK_SIZE: usize = 64 * 1024;

/// Reports are emitted each time another tenth of the file is sent.
const STEPS: u64 = 10;

#[derive(Debug)]
pub(crate) struct Progress {
    label: String,
    total: u64,
    sent: u64,
    reported_step: u64,
    quiet: bool,
}

impl Progress {
    pub(crate) fn new(label: impl Into<String>, total: u64, quiet: bool) -> Self {
        Self {
            label: label.into(),
            total,
            sent: 0,
            reported_step: 0,
            quiet,
        }
    }

    /// Record `n` more bytes; returns the percentage if a report was due.
    pub(crate) fn advance(&mut self, n: u64) -> Option<u64> {
        self.sent += n;
        let step = if self.total == 0 {
            STEPS
        } else {
            (self.sent.min(self.total) * STEPS) / self.total
        };
        if step <= self.reported_step {
            return None;
        }
        self.reported_step = step;
        let percent = step * 100 / STEPS;
        if self.quiet {
            debug!(file = %self.label, sent = self.sent, total = self.total, "upload {}%", percent);
        } else {
            info!(file = %self.label, sent = self.sent, total = self.total, "upload {}%", percent);
        }
        Some(percent)
    }
}

/// Stream a file in chunks, reporting progress as chunks are read.
pub(crate) fn file_stream(
    path: PathBuf,
    total: u64,
    quiet: bool,
) -> impl Stream<Item = io::Result<Vec<u8>>> + Send + 'static {
    async_stream::try_stream! {
        let label = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mut progress = Progress::new(label, total, quiet);
        let mut file = tokio::fs::File::open(&path).await?;
        let mut buf = vec![0u8; CHUNK_SIZE];

        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            progress.advance(n as u64);
            yield buf[..n].to_vec();
        }

        if total == 0 {
            progress.advance(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[test]
    fn reports_each_tenth_once() {
        let mut p = Progress::new("a.bin", 100, true);
        assert_eq!(p.advance(5), None);
        assert_eq!(p.advance(5), Some(10));
        assert_eq!(p.advance(1), None);
        assert_eq!(p.advance(44), Some(50));
        assert_eq!(p.advance(45), Some(100));
        assert_eq!(p.advance(10), None);
    }

    #[test]
    fn empty_file_reports_completion() {
        let mut p = Progress::new("empty", 0, true);
        assert_eq!(p.advance(0), Some(100));
        assert_eq!(p.advance(0), None);
    }

    #[tokio::test]
    async fn streams_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.bin");
        let data: Vec<u8> = (0..(CHUNK_SIZE * 2 + 17)).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &data).unwrap();

        let stream = file_stream(path, data.len() as u64, true);
        futures_util::pin_mut!(stream);
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend(chunk.unwrap());
        }
        assert_eq!(out, data);
    }
}
