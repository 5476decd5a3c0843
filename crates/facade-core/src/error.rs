//! Error types for VCS Facade.
//!
//! Every crate in the workspace reports failures through [`FacadeError`].
//! Backend adapters translate provider failures into this taxonomy at their
//! boundary, so callers never see transport-specific errors.
//!
//! # Example
//!
//! ```
//! use facade_core::{FacadeError, Result};
//!
//! fn find_branch(name: &str) -> Result<String> {
//!     if name.is_empty() {
//!         return Err(FacadeError::invalid_argument("branch name cannot be empty"));
//!     }
//!     Err(FacadeError::not_found(format!("branch '{}'", name)))
//! }
//!
//! assert!(find_branch("main").unwrap_err().is_not_found());
//! ```

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Main error type for VCS Facade operations.
///
/// The type is `Clone` so that one job outcome can be handed to every
/// caller waiting on the same request id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FacadeError {
    /// A repository, commit, ref or pull request is absent upstream.
    #[error("not found: {0}")]
    NotFound(String),

    /// Mutually exclusive parameters were supplied together.
    #[error("arguments not compatible: {0}")]
    ArgumentsNotCompatible(String),

    /// A parameter is malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A webhook signature is missing or does not match.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// The request is still being processed; retry with the same id.
    #[error("request '{request_id}' is still processing, retry after {retry_after}")]
    StillProcessing {
        /// The request id to resubmit.
        request_id: String,
        /// Earliest time the client should retry.
        retry_after: DateTime<Utc>,
    },

    /// Anything else, including backend transport failures.
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl FacadeError {
    // ============================================
    // Convenience constructors
    // ============================================

    /// Creates a NotFound error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Creates an ArgumentsNotCompatible error.
    pub fn arguments_not_compatible(message: impl Into<String>) -> Self {
        Self::ArgumentsNotCompatible(message.into())
    }

    /// Creates an InvalidArgument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Creates an InvalidSignature error.
    pub fn invalid_signature(message: impl Into<String>) -> Self {
        Self::InvalidSignature(message.into())
    }

    /// Creates a StillProcessing signal.
    pub fn still_processing(request_id: impl Into<String>, retry_after: DateTime<Utc>) -> Self {
        Self::StillProcessing {
            request_id: request_id.into(),
            retry_after,
        }
    }

    /// Creates an Unexpected error.
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    // ============================================
    // Query methods
    // ============================================

    /// Returns true if the referenced entity does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true if this is the deferred-result retry signal.
    pub fn is_still_processing(&self) -> bool {
        matches!(self, Self::StillProcessing { .. })
    }

    /// Returns true for errors caused by the caller's input.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::ArgumentsNotCompatible(_)
                | Self::InvalidArgument(_)
                | Self::InvalidSignature(_)
        )
    }

    /// Stable machine-readable code used in error bodies.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::ArgumentsNotCompatible(_) => "ARGUMENTS_NOT_COMPATIBLE",
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::InvalidSignature(_) => "INVALID_SIGNATURE",
            Self::StillProcessing { .. } => "STILL_PROCESSING",
            Self::Unexpected(_) => "UNEXPECTED",
        }
    }
}

impl From<serde_json::Error> for FacadeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Unexpected(format!("serialization error: {}", err))
    }
}

/// Type alias for Results with FacadeError.
pub type Result<T> = std::result::Result<T, FacadeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FacadeError::not_found("commit abc123");
        assert_eq!(err.to_string(), "not found: commit abc123");

        let err = FacadeError::arguments_not_compatible("fromId and fromDate");
        assert_eq!(
            err.to_string(),
            "arguments not compatible: fromId and fromDate"
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(FacadeError::not_found("x").error_code(), "NOT_FOUND");
        assert_eq!(
            FacadeError::arguments_not_compatible("x").error_code(),
            "ARGUMENTS_NOT_COMPATIBLE"
        );
        assert_eq!(
            FacadeError::invalid_signature("x").error_code(),
            "INVALID_SIGNATURE"
        );
        assert_eq!(
            FacadeError::still_processing("id", Utc::now()).error_code(),
            "STILL_PROCESSING"
        );
        assert_eq!(FacadeError::unexpected("x").error_code(), "UNEXPECTED");
    }

    #[test]
    fn test_is_client_error() {
        assert!(FacadeError::not_found("x").is_client_error());
        assert!(FacadeError::invalid_argument("x").is_client_error());
        assert!(!FacadeError::unexpected("x").is_client_error());
        assert!(!FacadeError::still_processing("id", Utc::now()).is_client_error());
    }

    #[test]
    fn test_clone_preserves_variant() {
        let err = FacadeError::still_processing("req-1", Utc::now());
        let cloned = err.clone();
        assert_eq!(err, cloned);
        assert!(cloned.is_still_processing());
    }

    #[test]
    fn test_from_serde_error() {
        let parse: std::result::Result<u32, _> = serde_json::from_str("not json");
        let err: FacadeError = parse.unwrap_err().into();
        assert!(matches!(err, FacadeError::Unexpected(_)));
    }
}
