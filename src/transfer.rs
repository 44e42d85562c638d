//! Byte-range retrieval over HTTP and local files
//!
//! The trait deals in exclusive `[start, end)` ranges and always returns
//! exactly `end - start` bytes or an error. The inclusive convention of the
//! HTTP `Range` header is mapped at the one point that speaks HTTP.

use crate::error::{FetchError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use log::warn;
use reqwest::header::RANGE;
use reqwest::StatusCode;
use std::io::SeekFrom;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// A resource that serves arbitrary byte spans by location
#[async_trait]
pub trait RangeSource: Send + Sync {
    /// Fetch exactly the bytes in `[start, end)` of the resource at `location`
    ///
    /// Requires `start < end`. No retry happens at this layer; see
    /// [`fetch_range_with_retry`].
    async fn fetch_range(&self, location: &str, start: u64, end: u64) -> Result<Bytes>;
}

fn check_range(start: u64, end: u64) -> Result<()> {
    if start >= end {
        return Err(FetchError::InvalidRange { start, end });
    }
    Ok(())
}

/// Range requests against an HTTP(S) endpoint
#[derive(Debug, Clone, Default)]
pub struct HttpRangeSource {
    client: reqwest::Client,
}

impl HttpRangeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured client (timeouts, proxies)
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Plain GET returning the full body as text, used for listing downloads
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Transfer(format!(
                "GET {} returned HTTP status {}",
                url, status
            )));
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl RangeSource for HttpRangeSource {
    async fn fetch_range(&self, location: &str, start: u64, end: u64) -> Result<Bytes> {
        check_range(start, end)?;

        // HTTP ranges are inclusive on both ends
        let range = format!("bytes={}-{}", start, end - 1);
        let response = self
            .client
            .get(location)
            .header(RANGE, range)
            .send()
            .await?;

        // a 200 means the server ignored the range and is sending the whole
        // archive; refuse rather than buffer it
        if response.status() != StatusCode::PARTIAL_CONTENT {
            return Err(FetchError::RangeNotHonored {
                url: location.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body = response.bytes().await?;
        let expected = end - start;
        if body.len() as u64 != expected {
            return Err(FetchError::ShortRead {
                expected,
                actual: body.len() as u64,
            });
        }
        Ok(body)
    }
}

/// Range reads against a local file, for fixtures and pre-downloaded archives
#[derive(Debug, Clone, Copy, Default)]
pub struct FileRangeSource;

#[async_trait]
impl RangeSource for FileRangeSource {
    async fn fetch_range(&self, location: &str, start: u64, end: u64) -> Result<Bytes> {
        check_range(start, end)?;

        let mut file = File::open(location).await?;
        let len = file.metadata().await?.len();
        if len < end {
            return Err(FetchError::ShortRead {
                expected: end - start,
                actual: len.saturating_sub(start),
            });
        }

        file.seek(SeekFrom::Start(start)).await?;
        let mut buffer = vec![0u8; (end - start) as usize];
        file.read_exact(&mut buffer).await?;
        Ok(Bytes::from(buffer))
    }
}

/// Bounded retry with exponential backoff for transient transfer failures
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry; doubles each attempt
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts,
            initial_backoff,
        }
    }

    /// A policy that never retries
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        self.initial_backoff * 2u32.saturating_pow(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}

/// Fetch a range, retrying transient failures per the policy
///
/// Non-transient errors (invalid range, range not honored) propagate
/// immediately. Persistent transient failure propagates the last error.
pub async fn fetch_range_with_retry(
    source: &dyn RangeSource,
    location: &str,
    start: u64,
    end: u64,
    policy: &RetryPolicy,
) -> Result<Bytes> {
    let mut attempt = 0;
    loop {
        match source.fetch_range(location, start, end).await {
            Ok(bytes) => return Ok(bytes),
            Err(err) if err.is_transient() && attempt + 1 < policy.max_attempts => {
                let delay = policy.backoff_for(attempt);
                warn!(
                    "range request for {} failed ({}), retrying in {:?}",
                    location, err, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Fails with a transient error a fixed number of times, then succeeds
    struct FlakySource {
        failures: usize,
        calls: AtomicUsize,
    }

    impl FlakySource {
        fn new(failures: usize) -> Self {
            Self {
                failures,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl RangeSource for FlakySource {
        async fn fetch_range(&self, _location: &str, start: u64, end: u64) -> Result<Bytes> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(FetchError::Transfer("connection reset".to_string()));
            }
            Ok(Bytes::from(vec![0xAB; (end - start) as usize]))
        }
    }

    async fn fixture_file(dir: &TempDir, data: &[u8]) -> String {
        let path = dir.path().join("archive.tar");
        tokio::fs::write(&path, data).await.unwrap();
        path.to_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_file_range_exact_bytes() {
        let dir = TempDir::new().unwrap();
        let data: Vec<u8> = (0..=255).collect();
        let location = fixture_file(&dir, &data).await;

        let bytes = FileRangeSource
            .fetch_range(&location, 10, 42)
            .await
            .unwrap();
        assert_eq!(bytes.len(), 32);
        assert_eq!(&bytes[..], &data[10..42]);
    }

    #[tokio::test]
    async fn test_file_range_past_eof_is_short_read() {
        let dir = TempDir::new().unwrap();
        let location = fixture_file(&dir, &[1, 2, 3, 4]).await;

        let err = FileRangeSource
            .fetch_range(&location, 2, 10)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FetchError::ShortRead {
                expected: 8,
                actual: 2
            }
        ));
    }

    #[tokio::test]
    async fn test_invalid_range_rejected() {
        let err = FileRangeSource
            .fetch_range("irrelevant", 5, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidRange { start: 5, end: 5 }));
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::new(4, Duration::from_millis(100));
        assert_eq!(policy.backoff_for(0), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(1), Duration::from_millis(200));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failures() {
        let source = FlakySource::new(2);
        let policy = RetryPolicy::new(3, Duration::from_millis(1));

        let bytes = fetch_range_with_retry(&source, "x", 0, 8, &policy)
            .await
            .unwrap();
        assert_eq!(bytes.len(), 8);
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_is_bounded() {
        let source = FlakySource::new(usize::MAX);
        let policy = RetryPolicy::new(2, Duration::from_millis(1));

        let err = fetch_range_with_retry(&source, "x", 0, 8, &policy)
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_no_retry_policy_fails_fast() {
        let source = FlakySource::new(1);
        let err = fetch_range_with_retry(&source, "x", 0, 8, &RetryPolicy::none())
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }
}
