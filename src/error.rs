use std::sync::Arc;

use reqwest::StatusCode;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while talking to the FeatureBoard service or managing the client.
///
/// None of these are ever returned from feature evaluation. Refresh failures surface as
/// [`RefreshOutcome::Failed`](crate::RefreshOutcome::Failed) and in logs.
#[derive(thiserror::Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// Invalid base URL configuration.
    #[error("invalid base_url configuration")]
    InvalidBaseUrl(#[source] url::ParseError),

    /// The service answered with a status other than 200 or 304.
    #[error("unexpected response status: {0}")]
    UnexpectedStatus(StatusCode),

    /// Network error, including request timeouts.
    #[error(transparent)]
    Network(Arc<reqwest::Error>),

    /// Response body could not be decoded into feature definitions.
    #[error("failed to decode feature definitions")]
    Decode(#[source] Arc<serde_json::Error>),

    /// Unknown update strategy name.
    #[error("unknown update strategy: {0}")]
    InvalidUpdateStrategy(String),

    /// Indicates that the poller thread panicked. This should normally never happen.
    #[error("poller thread panicked")]
    PollerThreadPanicked,

    /// An I/O error.
    #[error(transparent)]
    // std::io::Error is not clonable, so we're wrapping it in an Arc.
    Io(Arc<std::io::Error>),
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(Arc::new(value))
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        // Strip the URL so API keys in query strings or paths never end up in logs.
        Error::Network(Arc::new(value.without_url()))
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::Decode(Arc::new(value))
    }
}
