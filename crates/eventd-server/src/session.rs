//! Session table.
//!
//! Stands in for the authentication layer's interface: it supplies opaque
//! session handles and a revocation signal. The service facade consults
//! it on every operation; revocation is pushed into the bus so parked
//! polls are released promptly.

use std::time::Instant;

use dashmap::DashMap;

/// State tracked per authenticated session.
#[derive(Debug, Clone, Copy)]
pub struct SessionEntry {
    /// When the session was opened.
    pub opened_at: Instant,
}

/// Table of live session handles.
#[derive(Default)]
pub struct SessionTable {
    sessions: DashMap<String, SessionEntry>,
}

impl SessionTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a session handle.
    pub fn open(&self, session: impl Into<String>) {
        let session = session.into();
        tracing::debug!(session = %session, "session opened");
        self.sessions.insert(
            session,
            SessionEntry {
                opened_at: Instant::now(),
            },
        );
    }

    /// Revoke a session handle. Returns whether it was live.
    pub fn revoke(&self, session: &str) -> bool {
        let revoked = self.sessions.remove(session).is_some();
        if revoked {
            tracing::debug!(session, "session revoked");
        }
        revoked
    }

    /// Whether the handle names a live session.
    pub fn is_valid(&self, session: &str) -> bool {
        self.sessions.contains_key(session)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether there are no live sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
