//! Error types for the roverlink client

use thiserror::Error;

/// Errors that can occur while resolving or talking to the control plane
#[derive(Error, Debug)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid URL
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Control plane returned an error status
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body, if any
        message: String,
    },

    /// Invalid resolver configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Redirect chase revisited a URL it had already requested
    #[error("redirect loop detected at {0}")]
    RedirectLoop(String),

    /// Redirect chase exceeded the hop cap
    #[error("too many redirects (limit {limit})")]
    TooManyRedirects {
        /// Maximum number of hops allowed
        limit: usize,
    },

    /// Control plane answered 200 with an empty value
    #[error("control plane returned an empty {0}")]
    EmptyResponse(&'static str),

    /// Repository lookup found neither a device entry nor a catch-all entry
    #[error("no endpoint entry found for this device")]
    LookupFailed,
}

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;
