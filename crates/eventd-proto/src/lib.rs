//! Boundary types for the eventd event bus.
//!
//! This crate defines the types exchanged at the event bus boundary:
//! event records, batches, and the error code table the transport layer
//! maps service errors onto. Wire framing is owned by the transport and
//! is deliberately absent here.
//!
//! # Modules
//!
//! - [`event`] - Event records, operations, and batches
//! - [`error`] - Boundary error type and numeric error codes

pub mod error;
pub mod event;

pub use error::{error_codes, Error};
pub use event::{EventBatch, EventOperation, EventRecord, WILDCARD_CLASS};

/// API version for boundary compatibility.
///
/// Included in handshake messages by the transport layer. Incremented on
/// incompatible changes to the types in this crate.
pub const API_VERSION: u32 = 1;
