use std::fmt;

// Failures reported by history store adapters.
#[derive(Debug)]
pub enum StoreError {
    // The backend rejected or failed the operation.
    Backend(String),
    // A value could not be mapped to or from its stored representation.
    InvalidRecord(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Backend(msg) => write!(f, "history backend error: {msg}"),
            StoreError::InvalidRecord(msg) => write!(f, "invalid history record: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}
