//! Boundary error type and numeric error codes.

use thiserror::Error;

/// Boundary-level errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization failed.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// API version mismatch.
    #[error("api version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u32, actual: u32 },
}

/// Numeric error codes the transport layer maps service errors onto.
pub mod error_codes {
    /// Unknown/internal error.
    pub const INTERNAL: u32 = 1;
    /// Unknown or revoked session; the caller must re-authenticate.
    pub const SESSION_INVALID: u32 = 2;
    /// Poll attempted without an active subscription; call register first.
    pub const NOT_REGISTERED: u32 = 3;
    /// Token or cursor refers to a position the log can no longer
    /// reconstruct; drop the token and re-register from "now".
    pub const EXPIRED: u32 = 4;
    /// Malformed or forged token.
    pub const INVALID_TOKEN: u32 = 5;
    /// Malformed class set (e.g. an empty class name).
    pub const INVALID_CLASS_SET: u32 = 6;
}
