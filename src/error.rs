//! Error types for fetch operations

use thiserror::Error;

/// Main error type for point-cloud fetch operations
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid listing line: {0}")]
    InvalidListing(String),

    #[error("Transfer error: {0}")]
    Transfer(String),

    #[error("Range not honored for {url}: HTTP status {status}")]
    RangeNotHonored { url: String, status: u16 },

    #[error("Short range read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: u64, actual: u64 },

    #[error("Invalid byte range {start}..{end}")]
    InvalidRange { start: u64, end: u64 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid scan date: {0}")]
    InvalidScanDate(String),

    #[error("Sidecar index error: {0}")]
    Sidecar(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl FetchError {
    /// Whether a retry with backoff may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FetchError::Transfer(_) | FetchError::ShortRead { .. }
        )
    }
}

/// Specialized Result type for fetch operations
pub type Result<T> = std::result::Result<T, FetchError>;

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Transfer(err.to_string())
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Sidecar(err.to_string())
    }
}
