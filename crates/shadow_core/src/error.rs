//! Error types for the core library

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, CoreError>;

/// The core error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Identifier does not follow the `prelude[@namespace]:path` form
    #[error("Invalid path id '{id}': {reason}")]
    InvalidPath { id: String, reason: &'static str },
}
