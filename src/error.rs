//! Error types for fleet-rbac

use thiserror::Error;

/// The main error type for RBAC operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RbacError {
    /// LMDB or filesystem failure
    #[error("store error: {0}")]
    Store(String),
    /// The permission graph holds a dangling or unreadable record
    #[error("corrupt permission graph: {0}")]
    Corrupt(String),
    #[error("not found: {0}")]
    NotFound(String),
    /// Unique name or duplicate join pair
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("invalid input: {0}")]
    Invalid(String),
    /// Resource deletion refused while permissions reference it
    #[error("restricted: {0}")]
    Restricted(String),
    #[error("session provider failed: {0}")]
    Session(String),
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for RBAC operations
pub type Result<T> = std::result::Result<T, RbacError>;

/// Convert any storage-layer error to RbacError
pub fn err<E: std::error::Error>(e: E) -> RbacError {
    RbacError::Store(e.to_string())
}

impl From<config::ConfigError> for RbacError {
    fn from(e: config::ConfigError) -> Self {
        RbacError::Config(e.to_string())
    }
}
