//! Errors produced by the token codec.

use thiserror::Error;

/// Failure modes of token issue and verification.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Signature, algorithm, issuer or audience did not match.
    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    /// The token could not be decoded at all.
    #[error("token is malformed: {0}")]
    Malformed(String),

    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::InvalidIssuer
            | ErrorKind::InvalidAudience
            | ErrorKind::InvalidSubject
            | ErrorKind::ImmatureSignature => Self::InvalidSignature,
            _ => Self::Malformed(err.to_string()),
        }
    }
}
