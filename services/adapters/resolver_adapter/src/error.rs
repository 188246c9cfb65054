//! Error types for the resolver adapter

use std::time::Duration;
use thiserror::Error;

/// Result type alias for adapter construction
pub type Result<T> = std::result::Result<T, ResolverError>;

/// How a single failed attempt should be treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Worth retrying: rate limits, server errors, connection trouble
    Transient,
    /// Retrying cannot help: client errors, malformed responses
    Fatal,
}

/// Failure of one upstream request attempt, or of interpreting its payload
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP 429 from the upstream
    #[error("Rate limited by upstream (retry after {retry_after:?})")]
    RateLimited {
        /// Server-provided `Retry-After` hint, if any
        retry_after: Option<Duration>,
    },

    /// HTTP 5xx from the upstream
    #[error("Upstream server error: HTTP {status}")]
    ServerError {
        /// Status code returned
        status: u16,
    },

    /// Connect failure, timeout or broken transport
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Any other non-success status
    #[error("Upstream rejected request: HTTP {status}")]
    Rejected {
        /// Status code returned
        status: u16,
    },

    /// Body was not the JSON we expected
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// JSON-RPC error object in an otherwise successful response
    #[error("RPC error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code
        code: i64,
        /// Error message reported by the node
        message: String,
    },

    /// Request could not be built
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl FetchError {
    /// Classify this failure for the retry loop
    pub fn class(&self) -> FailureClass {
        match self {
            FetchError::RateLimited { .. }
            | FetchError::ServerError { .. }
            | FetchError::Connection(_) => FailureClass::Transient,
            FetchError::Rejected { .. }
            | FetchError::MalformedResponse(_)
            | FetchError::Rpc { .. }
            | FetchError::InvalidRequest(_) => FailureClass::Fatal,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.class() == FailureClass::Transient
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::MalformedResponse(err.to_string())
        } else if err.is_builder() {
            FetchError::InvalidRequest(err.to_string())
        } else {
            // connect, timeout, request and body transport failures
            FetchError::Connection(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::MalformedResponse(err.to_string())
    }
}

/// Errors raised while constructing the adapter
#[derive(Debug, Error)]
pub enum ResolverError {
    /// An upstream endpoint URL did not parse
    #[error("Invalid endpoint {url}: {source}")]
    InvalidEndpoint {
        /// The offending URL
        url: String,
        /// Parse failure
        #[source]
        source: url::ParseError,
    },

    /// The HTTP client could not be built
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Configuration failed validation
    #[error("Invalid configuration: {0}")]
    Config(String),
}
