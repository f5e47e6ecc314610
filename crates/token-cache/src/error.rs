//! Error types for persistent field stores

/// Failures reported by a [`FieldStore`](crate::FieldStore) backend.
///
/// The token cache logs these and treats the affected value as absent; they
/// are only visible to code that talks to a store directly.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
