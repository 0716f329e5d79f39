//! Cache error types.

use std::fmt;

/// Cache operation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// An id was registered while an unexpired entry for it exists.
    Duplicate(String),
    /// Key not found, or found but already expired.
    NotFound(String),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duplicate(id) => write!(f, "duplicate id {id}: possible replay"),
            Self::NotFound(id) => write!(f, "id {id} not found in cache"),
        }
    }
}

impl std::error::Error for CacheError {}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
