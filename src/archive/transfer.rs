//! Streaming transfer with progress
//!
//! A [`TransferReporter`] pulls a body stream chunk by chunk and reports a
//! [`TransferProgress`] after each step. With a declared length the percent
//! follows the bytes received; without one the body is read in one go and the
//! caller only sees "unknown" followed by 100.
//!
//! An idle timeout bounds the wait for each chunk, so a stalled body fails
//! while a slow one that keeps arriving runs to completion.

use std::fmt::Display;
use std::pin::Pin;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use serde::Serialize;

use crate::error::{Error, Result};

/// A progress snapshot of one transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransferProgress {
    pub bytes_received: u64,
    pub total_bytes: Option<u64>,
    /// `None` while the total size is unknown
    pub percent: Option<u8>,
}

/// `floor(received * 100 / total)`, clamped to 100
pub fn percent_of(received: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let percent = (received as u128 * 100) / total as u128;
    percent.min(100) as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    NotStarted,
    Reading,
    Finished,
}

/// Incremental reader over a chunked body
pub struct TransferReporter<S> {
    stream: Pin<Box<S>>,
    total_bytes: Option<u64>,
    bytes_received: u64,
    last_percent: Option<u8>,
    chunks: Vec<Bytes>,
    phase: Phase,
    idle_timeout: Option<Duration>,
}

impl<S, E> TransferReporter<S>
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    E: Display,
{
    /// A declared length of zero is treated as unknown
    pub fn new(stream: S, content_length: Option<u64>) -> Self {
        Self {
            stream: Box::pin(stream),
            total_bytes: content_length.filter(|len| *len > 0),
            bytes_received: 0,
            last_percent: None,
            chunks: Vec::new(),
            phase: Phase::NotStarted,
            idle_timeout: None,
        }
    }

    /// Fails the transfer when no chunk arrives for `idle`
    pub fn with_idle_timeout(mut self, idle: Duration) -> Self {
        self.idle_timeout = Some(idle);
        self
    }

    pub fn is_determinate(&self) -> bool {
        self.total_bytes.is_some()
    }

    pub fn total_bytes(&self) -> Option<u64> {
        self.total_bytes
    }

    /// Advances the transfer by one step
    ///
    /// Returns `Ok(None)` once the final update has been handed out. A read
    /// error discards everything buffered so far.
    pub async fn next_progress(&mut self) -> Result<Option<TransferProgress>> {
        match self.phase {
            Phase::Finished => Ok(None),
            Phase::NotStarted => {
                self.phase = Phase::Reading;
                let percent = self.total_bytes.map(|total| percent_of(0, total));
                Ok(Some(self.snapshot(percent)))
            }
            Phase::Reading => match self.total_bytes {
                Some(total) => self.read_chunk(total).await,
                None => self.read_all().await,
            },
        }
    }

    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        let item = match self.idle_timeout {
            Some(idle) => match tokio::time::timeout(idle, self.stream.next()).await {
                Ok(item) => item,
                Err(_) => return Err(self.abort(format!("no data received for {:?}", idle))),
            },
            None => self.stream.next().await,
        };

        match item {
            Some(Ok(chunk)) => Ok(Some(chunk)),
            Some(Err(e)) => Err(self.abort(e)),
            None => Ok(None),
        }
    }

    async fn read_chunk(&mut self, total: u64) -> Result<Option<TransferProgress>> {
        match self.next_chunk().await? {
            Some(chunk) => {
                self.bytes_received += chunk.len() as u64;
                self.chunks.push(chunk);
                let percent = percent_of(self.bytes_received, total);
                tracing::debug!("Received {}/{} bytes ({}%)", self.bytes_received, total, percent);
                Ok(Some(self.snapshot(Some(percent))))
            }
            None => {
                self.phase = Phase::Finished;
                if self.last_percent == Some(100) {
                    Ok(None)
                } else {
                    Ok(Some(self.snapshot(Some(100))))
                }
            }
        }
    }

    async fn read_all(&mut self) -> Result<Option<TransferProgress>> {
        while let Some(chunk) = self.next_chunk().await? {
            self.bytes_received += chunk.len() as u64;
            self.chunks.push(chunk);
        }
        tracing::debug!("Received {} bytes of unknown length", self.bytes_received);
        self.phase = Phase::Finished;
        Ok(Some(self.snapshot(Some(100))))
    }

    fn abort(&mut self, reason: impl Display) -> Error {
        self.chunks.clear();
        self.phase = Phase::Finished;
        Error::StreamRead(reason.to_string())
    }

    fn snapshot(&mut self, percent: Option<u8>) -> TransferProgress {
        self.last_percent = percent;
        TransferProgress {
            bytes_received: self.bytes_received,
            total_bytes: self.total_bytes,
            percent,
        }
    }

    /// Drives the transfer to completion, handing each update to
    /// `on_progress` and yielding to the runtime between steps
    pub async fn run<F>(mut self, mut on_progress: F) -> Result<Bytes>
    where
        F: FnMut(&TransferProgress),
    {
        while let Some(progress) = self.next_progress().await? {
            on_progress(&progress);
            tokio::task::yield_now().await;
        }
        Ok(self.into_bytes())
    }

    /// Concatenates the buffered chunks in arrival order
    pub fn into_bytes(mut self) -> Bytes {
        if self.chunks.len() == 1 {
            return self.chunks.pop().unwrap_or_default();
        }
        let mut buf = BytesMut::with_capacity(self.bytes_received as usize);
        for chunk in &self.chunks {
            buf.extend_from_slice(chunk);
        }
        buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn body(sizes: &[usize]) -> impl Stream<Item = std::result::Result<Bytes, std::io::Error>> {
        let chunks: Vec<_> = sizes
            .iter()
            .enumerate()
            .map(|(i, size)| Ok::<_, std::io::Error>(Bytes::from(vec![i as u8; *size])))
            .collect();
        stream::iter(chunks)
    }

    async fn percents<S, E>(reporter: TransferReporter<S>) -> (Vec<Option<u8>>, Bytes)
    where
        S: Stream<Item = std::result::Result<Bytes, E>>,
        E: Display,
    {
        let mut seen = Vec::new();
        let bytes = reporter.run(|p| seen.push(p.percent)).await.unwrap();
        (seen, bytes)
    }

    #[tokio::test]
    async fn test_two_chunks_reach_exactly_100() {
        let (seen, bytes) = percents(TransferReporter::new(body(&[100, 900]), Some(1000))).await;
        assert_eq!(seen, vec![Some(0), Some(10), Some(100)]);
        assert_eq!(bytes.len(), 1000);
        assert_eq!(bytes[99], 0);
        assert_eq!(bytes[100], 1);
    }

    #[tokio::test]
    async fn test_uneven_chunks_are_monotonic() {
        let (seen, _) = percents(TransferReporter::new(body(&[1, 1, 998]), Some(1000))).await;
        assert_eq!(seen, vec![Some(0), Some(0), Some(0), Some(100)]);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn test_short_body_still_finishes_at_100() {
        let (seen, bytes) = percents(TransferReporter::new(body(&[250, 250]), Some(1000))).await;
        assert_eq!(seen, vec![Some(0), Some(25), Some(50), Some(100)]);
        assert_eq!(bytes.len(), 500);
    }

    #[tokio::test]
    async fn test_unknown_length_reports_unknown_then_100() {
        let reporter = TransferReporter::new(body(&[10, 20, 30]), None);
        assert!(!reporter.is_determinate());
        let (seen, bytes) = percents(reporter).await;
        assert_eq!(seen, vec![None, Some(100)]);
        assert_eq!(bytes.len(), 60);
    }

    #[tokio::test]
    async fn test_zero_length_is_indeterminate() {
        let reporter = TransferReporter::new(body(&[5]), Some(0));
        assert!(!reporter.is_determinate());
    }

    #[tokio::test]
    async fn test_read_error_discards_chunks() {
        let items = vec![
            Ok(Bytes::from_static(b"partial")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ];
        let mut reporter = TransferReporter::new(stream::iter(items), Some(100));

        assert!(reporter.next_progress().await.unwrap().is_some());
        assert!(reporter.next_progress().await.unwrap().is_some());
        let err = reporter.next_progress().await.unwrap_err();
        assert!(matches!(err, Error::StreamRead(msg) if msg.contains("reset")));
        assert!(reporter.chunks.is_empty());
        assert!(reporter.next_progress().await.unwrap().is_none());
    }

    /// `chunks` chunks of 10 bytes, each arriving `gap` after the previous one
    fn paced(
        chunks: usize,
        gap: Duration,
    ) -> impl Stream<Item = std::result::Result<Bytes, std::io::Error>> {
        stream::unfold(0, move |sent| async move {
            if sent == chunks {
                return None;
            }
            tokio::time::sleep(gap).await;
            Some((Ok(Bytes::from(vec![1u8; 10])), sent + 1))
        })
    }

    #[tokio::test]
    async fn test_slow_steady_body_outlasts_idle_timeout() {
        // 6 x 30ms is well past the 100ms idle limit, but no single gap is
        let reporter = TransferReporter::new(paced(6, Duration::from_millis(30)), Some(60))
            .with_idle_timeout(Duration::from_millis(100));
        let (seen, bytes) = percents(reporter).await;
        assert_eq!(bytes.len(), 60);
        assert_eq!(seen.last(), Some(&Some(100)));
    }

    #[tokio::test]
    async fn test_stalled_body_fails() {
        let mut reporter = TransferReporter::new(paced(1, Duration::from_millis(500)), None)
            .with_idle_timeout(Duration::from_millis(50));

        assert_eq!(reporter.next_progress().await.unwrap().unwrap().percent, None);
        let err = reporter.next_progress().await.unwrap_err();
        assert!(matches!(err, Error::StreamRead(msg) if msg.contains("no data received")));
        assert!(reporter.next_progress().await.unwrap().is_none());
    }

    #[test]
    fn test_percent_clamped() {
        assert_eq!(percent_of(1500, 1000), 100);
        assert_eq!(percent_of(999, 1000), 99);
    }
}
