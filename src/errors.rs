//! Error types for fetching, refreshing and configuration

use thiserror::Error;

/// A single array's forecast could not be obtained. Recovered by the
/// orchestrator, which falls back to the array's previous series.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("provider returned status {status}")]
    Status { status: u16 },

    #[error("malformed forecast payload: {0}")]
    Payload(String),
}

/// Every array failed in one refresh cycle. The previous snapshot stays published.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("failed to fetch data for any of {attempted} solar arrays")]
    AllFailed { attempted: usize },

    #[error("unknown array '{0}'")]
    UnknownArray(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),
}
