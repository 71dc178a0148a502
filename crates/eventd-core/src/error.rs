//! Event bus error taxonomy.

use eventd_proto::error_codes;
use thiserror::Error;

/// Event bus errors.
///
/// A long-poll timeout is not an error; it surfaces as a successful empty
/// batch. Everything here is returned to the caller, never swallowed.
#[derive(Debug, Error)]
pub enum Error {
    /// Unknown or revoked session. Fatal to the call; the caller must
    /// re-authenticate.
    #[error("session invalid: {0}")]
    SessionInvalid(String),

    /// Poll attempted without an active subscription.
    #[error("session not registered: {0}")]
    NotRegistered(String),

    /// Token or cursor refers to a position the log can no longer
    /// reconstruct (pruned, or from a prior process lifetime). The caller
    /// must drop the token and re-register from "now", accepting a gap.
    #[error("position no longer retained")]
    Expired,

    /// Malformed or forged token.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// Malformed class set.
    #[error("invalid class set: {0}")]
    InvalidClassSet(String),

    /// Internal failure (e.g. token payload serialization).
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Numeric error code for the transport layer.
    pub fn code(&self) -> u32 {
        match self {
            Error::SessionInvalid(_) => error_codes::SESSION_INVALID,
            Error::NotRegistered(_) => error_codes::NOT_REGISTERED,
            Error::Expired => error_codes::EXPIRED,
            Error::InvalidToken(_) => error_codes::INVALID_TOKEN,
            Error::InvalidClassSet(_) => error_codes::INVALID_CLASS_SET,
            Error::Internal(_) => error_codes::INTERNAL,
        }
    }
}
