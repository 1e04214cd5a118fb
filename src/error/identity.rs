//! Errors raised while validating a federated identity assertion.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("identity provider rejected the assertion with status {0}")]
    Status(u16),

    #[error("identity provider response could not be parsed: {0}")]
    Parse(String),

    /// The assertion verified but its contents are unacceptable.
    #[error("identity assertion rejected: {0}")]
    Rejected(String),

    #[error("identity verification was interrupted")]
    Interrupted,
}

impl IdentityError {
    #[must_use]
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected(reason.into())
    }
}
