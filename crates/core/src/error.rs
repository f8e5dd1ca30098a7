//! Error types for Strata.

use alloc::string::String;
use thiserror::Error;

/// Result type alias for Strata operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error types for range algebra and serialization.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Serialized input is missing required fields or has the wrong shape.
    #[error("malformed data: {message}")]
    MalformedData { message: String },
    /// Contract violation by the caller, e.g. fusing ranges of different
    /// attributes or asking a non-constant bound for an index operator.
    #[error("invalid usage: {message}")]
    InvalidUsage { message: String },
    /// AND-combining two disjunctions would produce too many branches.
    #[error("condition expands to {branches} OR branches, limit is {limit}")]
    BranchLimitExceeded { branches: usize, limit: usize },
}

impl Error {
    /// Creates a malformed data error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Error::MalformedData {
            message: message.into(),
        }
    }

    /// Creates an invalid usage error.
    pub fn invalid_usage(message: impl Into<String>) -> Self {
        Error::InvalidUsage {
            message: message.into(),
        }
    }

    /// Creates a branch limit error.
    pub fn branch_limit(branches: usize, limit: usize) -> Self {
        Error::BranchLimitExceeded { branches, limit }
    }

    /// Returns true if the error signals bad input rather than a planner bug.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Error::MalformedData { .. })
    }
}
