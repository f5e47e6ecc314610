//! Error types for refresh coordination and the token endpoint

/// Errors from [`RefreshCoordinator`](crate::RefreshCoordinator) operations.
///
/// `E` is the refresh operation's own error type, passed through unchanged.
#[derive(Debug, thiserror::Error)]
pub enum Error<E> {
    /// Nothing is cached. Tokens were requested before any login completed.
    #[error("no credentials cached; log in before requesting tokens")]
    NoCredentials,

    #[error("token refresh failed: {0}")]
    Refresh(#[source] E),
}

/// Errors from token endpoint calls.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    /// The grant (code or refresh token) was rejected; a new login is needed.
    #[error("grant rejected: {0}")]
    InvalidGrant(String),
}
