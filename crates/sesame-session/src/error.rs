//! Error types for session operations.

/// Error type for session operations.
///
/// Missing or expired records and deletes of absent records are not errors;
/// they degrade to an empty session and a no-op respectively.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A forced-create save found the key already taken.
    #[error("Session key already exists: {0}")]
    Create(String),

    /// An update targeted a record that no longer exists.
    #[error("Session record could not be updated: {0}")]
    Update(String),

    /// The store does not provide an optional capability.
    #[error("Operation not supported by this store: {0}")]
    NotSupported(&'static str),

    /// Transport or connection failure from the backing store.
    #[error("Session store unavailable: {0}")]
    StoreUnavailable(String),

    /// Payload encoding or decoding failed.
    #[error("Session payload error: {0}")]
    Codec(#[from] serde_json::Error),

    /// The stored expiry override could not be interpreted.
    #[error("Invalid session expiry: {0}")]
    InvalidExpiry(String),

    /// Key generation kept colliding past the retry cap.
    #[error("No unused session key found after {attempts} attempts")]
    KeyExhausted { attempts: usize },
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, Error>;
