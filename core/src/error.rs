//! Error kinds surfaced by conference operations.
//!
//! Every failure maps to one of a small set of stable categories
//! ([`ErrorKind`]) so the transport layer can translate it into a status
//! code without inspecting messages.

use crate::filter::FilterError;
use crate::keys::ParseKeyError;
use crate::store::StoreError;
use thiserror::Error;

/// Stable failure category of a [`ConferenceError`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No caller identity was supplied.
    Unauthorized,
    /// The request itself is malformed or incomplete.
    BadRequest,
    /// A referenced entity does not exist.
    NotFound,
    /// The caller does not own the entity they tried to change.
    Forbidden,
    /// The request contradicts the current state (double registration, no seats, duplicate wishlist entry).
    Conflict,
    /// The storage backend failed.
    Store,
}

impl ErrorKind {
    /// Machine-readable code for the category.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::BadRequest => "BAD_REQUEST",
            Self::NotFound => "NOT_FOUND",
            Self::Forbidden => "FORBIDDEN",
            Self::Conflict => "CONFLICT",
            Self::Store => "STORE_ERROR",
        }
    }
}

/// Error returned by every conference operation.
#[derive(Error, Debug)]
pub enum ConferenceError {
    /// Caller identity missing.
    #[error("{0}")]
    Unauthorized(String),

    /// Invalid input.
    #[error("{0}")]
    BadRequest(String),

    /// Referenced entity missing.
    #[error("{0}")]
    NotFound(String),

    /// Caller is not the owner.
    #[error("{0}")]
    Forbidden(String),

    /// State conflict.
    #[error("{0}")]
    Conflict(String),

    /// Storage failure, including optimistic conflicts that outlived every retry.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ConferenceError {
    /// The stable category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::BadRequest(_) => ErrorKind::BadRequest,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Store(_) => ErrorKind::Store,
        }
    }

    /// Whether re-running the whole unit of work may succeed.
    ///
    /// Only optimistic concurrency conflicts qualify; validation failures
    /// never do.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(StoreError::ConcurrencyConflict { .. }))
    }

    /// Shorthand for the "no conference found" error.
    #[must_use]
    pub fn conference_not_found(key: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("No conference found with key: {key}"))
    }
}

impl From<FilterError> for ConferenceError {
    fn from(err: FilterError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<ParseKeyError> for ConferenceError {
    fn from(err: ParseKeyError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflicts_are_the_only_retryable_errors() {
        let conflict = ConferenceError::Store(StoreError::ConcurrencyConflict {
            entity: "conference:abc".to_string(),
        });
        assert!(conflict.is_retryable());
        assert_eq!(conflict.kind(), ErrorKind::Store);

        let full = ConferenceError::Conflict("There are no seats available.".to_string());
        assert!(!full.is_retryable());
        assert_eq!(full.kind().code(), "CONFLICT");
    }

    #[test]
    fn filter_errors_become_bad_requests() {
        let err: ConferenceError = FilterError::MultipleInequalityFields.into();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert_eq!(err.to_string(), "Inequality filter is allowed on only one field.");
    }

    #[test]
    fn not_found_message_names_the_key() {
        let err = ConferenceError::conference_not_found("abc");
        assert_eq!(err.to_string(), "No conference found with key: abc");
    }
}
