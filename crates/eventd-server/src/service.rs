//! Request-facing event service.
//!
//! Bridges authenticated session handles to bus operations. Every call
//! verifies the session against the table first; blocking polls verify
//! again on wake, since a session can be revoked while parked. Revoking
//! a session tears down its subscription and releases its parked polls.

use std::sync::Arc;
use std::time::Duration;

use eventd_core::{Error, EventBus};
use eventd_proto::{EventBatch, EventOperation, EventRecord};

use crate::session::SessionTable;

/// The boundary operations of the event bus, keyed by session handle.
pub struct EventService {
    sessions: Arc<SessionTable>,
    bus: Arc<EventBus>,
}

impl EventService {
    /// Create a service over the given session table and bus.
    pub fn new(sessions: Arc<SessionTable>, bus: Arc<EventBus>) -> Self {
        Self { sessions, bus }
    }

    /// The underlying bus, for the object-model layer to publish through.
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Register the session for the given classes (`*` = all).
    pub fn register<S: AsRef<str>>(&self, session: &str, classes: &[S]) -> Result<(), Error> {
        self.check(session)?;
        self.bus.register(session, classes)
    }

    /// Remove the given classes from the session's filter.
    pub fn unregister<S: AsRef<str>>(&self, session: &str, classes: &[S]) -> Result<(), Error> {
        self.check(session)?;
        self.bus.unregister(session, classes)
    }

    /// Blocking poll from the session's stored cursor.
    pub async fn next(&self, session: &str) -> Result<Vec<Arc<EventRecord>>, Error> {
        self.check(session)?;
        let records = self.bus.next(session).await?;
        self.check(session)?;
        Ok(records)
    }

    /// Blocking poll with an explicit class set, token, and timeout.
    pub async fn from<S: AsRef<str>>(
        &self,
        session: &str,
        classes: &[S],
        token: &str,
        timeout: Duration,
    ) -> Result<EventBatch, Error> {
        self.check(session)?;
        let (records, token) = self.bus.from(session, classes, token, timeout).await?;
        self.check(session)?;
        let records = records.iter().map(|r| (**r).clone()).collect();
        Ok(EventBatch::new(records, token))
    }

    /// Id of the next event to be generated.
    pub fn get_current_id(&self, session: &str) -> Result<u64, Error> {
        self.check(session)?;
        Ok(self.bus.current_id())
    }

    /// Inject a synthetic event on the given object.
    pub fn inject(&self, session: &str, class: &str, object_ref: &str) -> Result<u64, Error> {
        self.check(session)?;
        self.bus.inject(class, object_ref)
    }

    /// Admit a natural mutation from the object model. Not session-bound;
    /// the object model is a trusted in-process collaborator.
    pub fn publish(
        &self,
        class: &str,
        operation: EventOperation,
        object_ref: &str,
        object_uuid: &str,
    ) -> u64 {
        self.bus.publish(class, operation, object_ref, object_uuid)
    }

    /// Revocation signal from the session layer: invalidate the handle,
    /// drop the subscription, and release parked polls.
    pub fn revoke_session(&self, session: &str) {
        self.sessions.revoke(session);
        self.bus.remove_session(session);
    }

    fn check(&self, session: &str) -> Result<(), Error> {
        if self.sessions.is_valid(session) {
            Ok(())
        } else {
            Err(Error::SessionInvalid(session.to_string()))
        }
    }
}
