//! Error types for scope tracking and context lookup.

use thiserror::Error;

use crate::operation::OpId;

/// Errors raised by the context store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScopeError {
    /// The current operation is not attributed to an open scope, or the
    /// scope carries no value
    #[error("No context: the current operation is not inside a scope with a value")]
    NoContext,

    /// The id does not name an open root
    #[error("Unknown root: operation {0} is not an open scope root")]
    UnknownRoot(OpId),

    /// The stored value has a different type than requested
    #[error("Context type mismatch: expected {expected}")]
    ContextType {
        /// Requested type name
        expected: &'static str,
    },
}

impl ScopeError {
    /// Check if this error means "not inside any scope"
    pub fn is_missing(&self) -> bool {
        matches!(self, ScopeError::NoContext)
    }
}

/// Result type alias for scope operations
pub type Result<T> = std::result::Result<T, ScopeError>;
