use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("GitHub rejected the credential: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded on {endpoint}, retry after {} seconds", retry_after.as_secs())]
    RateLimited {
        retry_after: Duration,
        endpoint: String,
    },

    #[error("Network error calling {endpoint}: {source}")]
    Network {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Model call for {input} exceeded {after:?}")]
    AnalysisTimeout { input: String, after: Duration },

    #[error("Failed to parse model output: {0}")]
    ParseFailure(String),

    #[error("Not enough data for {what}: need {needed}, found {found}")]
    InsufficientData {
        what: &'static str,
        needed: usize,
        found: usize,
    },

    #[error("Another request is already running for this session")]
    Busy,

    #[error("Session was closed before the request finished")]
    Cancelled,

    #[error("GitHub API error: {0}")]
    GitHubApi(String),

    #[error("Model server error: {0}")]
    ModelServer(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Cached data belongs to {cached}, not {requested}")]
    CacheMismatch { cached: String, requested: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn network(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        Error::Network {
            endpoint: endpoint.into(),
            source,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::RateLimited { .. } | Error::Network { .. })
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::RateLimited { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }
}
