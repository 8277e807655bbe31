//! Error types for the authorization flow

/// Errors from the authorization flow.
///
/// `InvalidUrl` and `OAuth` surface synchronously through the HTTP layer;
/// `Http` and `TokenExchange` occur inside the background exchange and are
/// delivered only through the caller's failure handler.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The provider's redirect carried an `error` query parameter; the
    /// payload is the provider's literal reason string.
    #[error("provider returned error: {0}")]
    OAuth(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("store parse error: {0}")]
    StoreParse(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Result alias for authorization operations.
pub type Result<T> = std::result::Result<T, Error>;
