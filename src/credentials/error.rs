//! Credential error types.

use thiserror::Error;

use crate::credentials::store::StoreError;

/// Why a presented plaintext cannot be a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ShapeError {
    #[error("must be provided")]
    Missing,
    #[error("must be 26 bytes long")]
    WrongLength,
}

#[derive(Debug, Error)]
pub enum TokenError {
    /// The CSPRNG could not supply entropy. Not retried.
    #[error("secure random source unavailable")]
    RandomSource(#[source] rand::Error),

    #[error("malformed token: {0}")]
    Malformed(#[from] ShapeError),

    /// No live token of the requested scope matches.
    #[error("invalid or expired token")]
    NotFound,

    #[error("token persistence failed")]
    Persistence(#[from] StoreError),
}
