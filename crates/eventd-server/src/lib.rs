//! eventd server library.
//!
//! This crate bridges authenticated sessions to the event bus core:
//! session tracking with revocation, the request-facing service facade,
//! and server configuration.

pub mod config;
pub mod error;
pub mod service;
pub mod session;

pub use config::{Args, ServerConfig};
pub use error::Error;
pub use service::EventService;
pub use session::{SessionEntry, SessionTable};
