use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Session key already exists: {0}")]
    Duplicate(String),

    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for sesame_session::Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(key) => Self::Create(key),
            StoreError::NotFound(key) => Self::Update(key),
            other => Self::StoreUnavailable(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_to_session_error() {
        let err: sesame_session::Error = StoreError::Duplicate("k".into()).into();
        assert!(matches!(err, sesame_session::Error::Create(k) if k == "k"));

        let err: sesame_session::Error = StoreError::NotFound("k".into()).into();
        assert!(matches!(err, sesame_session::Error::Update(_)));

        let err: sesame_session::Error = StoreError::Migration("bad".into()).into();
        assert!(
            matches!(err, sesame_session::Error::StoreUnavailable(msg) if msg.contains("bad"))
        );
    }
}
