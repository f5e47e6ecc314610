//! Error types for authorization redirects

/// Typed failure of one authorization attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RedirectError {
    /// The user closed the browser without finishing. Not a real error;
    /// UIs usually return to the login screen silently.
    #[error("authorization cancelled by the user")]
    Cancelled,

    #[error("authentication failed: {0}")]
    AuthenticationFailure(String),
}

impl RedirectError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RedirectError::Cancelled)
    }
}
