//! # Error Module
//!
//! One error type for every back-office operation.
//!
//! The variants are shaped after what the HTTP layer needs to decide on a
//! status code: missing records, rejected input, illegal state transitions,
//! authentication failures and storage faults are kept apart.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LootoError>;

#[derive(Debug, Error)]
pub enum LootoError {
    /// A record that the operation addresses does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The caller supplied a malformed or out-of-range value.
    #[error("{0}")]
    InvalidInput(String),

    /// The record exists but is not in a state that allows the operation.
    #[error("{0}")]
    InvalidState(String),

    /// A debit would take the balance below zero.
    #[error("Insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance { available: i64, requested: i64 },

    /// A uniqueness constraint was violated.
    #[error("{0}")]
    Conflict(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is temporarily locked due to too many failed login attempts")]
    AccountLocked,

    /// Missing, unknown, revoked or expired session.
    #[error("Not authenticated")]
    Unauthorized,

    #[error("Missing permission: {0}")]
    Forbidden(&'static str),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::Error),

    #[error("Codec error: {0}")]
    Codec(#[from] postcard::Error),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
}

impl LootoError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// True for faults of the store itself rather than of the request.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::Storage(_) | Self::Codec(_) | Self::PasswordHash(_)
        )
    }
}

macro_rules! storage_from {
    ($($source:ty),* $(,)?) => {
        $(
            impl From<$source> for LootoError {
                fn from(err: $source) -> Self {
                    Self::Storage(redb::Error::from(err))
                }
            }
        )*
    };
}

storage_from!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_user_facing() {
        assert_eq!(LootoError::NotFound("User").to_string(), "User not found");
        assert_eq!(
            LootoError::invalid_state("User is already blocked").to_string(),
            "User is already blocked"
        );
        let err = LootoError::InsufficientBalance {
            available: 100,
            requested: 500,
        };
        assert!(err.to_string().contains("Insufficient balance"));
    }

    #[test]
    fn internal_classification() {
        assert!(!LootoError::Unauthorized.is_internal());
        assert!(LootoError::PasswordHash("x".into()).is_internal());
    }
}
