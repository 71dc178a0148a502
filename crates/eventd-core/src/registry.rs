//! Per-session subscription registry.
//!
//! One subscription per session: a class filter plus a delivery cursor
//! (the last event id the session has consumed). Re-registering unions
//! classes into the filter without touching the cursor; unregistering
//! subtracts classes and retires the subscription when the filter empties.

use std::collections::HashMap;
use std::time::Instant;

use parking_lot::RwLock;

use crate::error::Error;
use crate::filter::ClassFilter;

/// A session's subscription state.
#[derive(Debug, Clone)]
pub struct Subscription {
    /// Classes the session is registered for.
    pub classes: ClassFilter,
    /// Last event id delivered to the session. Only moves forward.
    pub cursor: u64,
    /// When the subscription was created.
    pub created_at: Instant,
    /// Number of records delivered over the subscription's lifetime.
    pub delivered: u64,
}

impl Subscription {
    fn new(classes: ClassFilter, cursor: u64) -> Self {
        Self {
            classes,
            cursor,
            created_at: Instant::now(),
            delivered: 0,
        }
    }

    /// Age of this subscription.
    pub fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }
}

/// Registry of live subscriptions keyed by session id.
#[derive(Default)]
pub struct SubscriptionRegistry {
    subscriptions: RwLock<HashMap<String, Subscription>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Union `classes` into the session's filter, creating the
    /// subscription with the given starting cursor if the session has
    /// none yet. An existing subscription keeps its cursor.
    pub fn register(&self, session: &str, classes: &ClassFilter, start_cursor: u64) {
        let mut subscriptions = self.subscriptions.write();
        match subscriptions.get_mut(session) {
            Some(subscription) => {
                subscription.classes.union_with(classes);
                tracing::debug!(session, "subscription filter widened");
            }
            None => {
                subscriptions.insert(session.to_string(), Subscription::new(classes.clone(), start_cursor));
                tracing::debug!(session, cursor = start_cursor, "subscription created");
            }
        }
    }

    /// Subtract `classes` from the session's filter. Returns `true` when
    /// the resulting filter is empty and the subscription was retired.
    pub fn unregister(&self, session: &str, classes: &ClassFilter) -> Result<bool, Error> {
        let mut subscriptions = self.subscriptions.write();
        let subscription = subscriptions
            .get_mut(session)
            .ok_or_else(|| Error::NotRegistered(session.to_string()))?;

        subscription.classes.subtract(classes);
        if subscription.classes.is_empty() {
            let retired = subscriptions.remove(session);
            if let Some(subscription) = retired {
                tracing::debug!(
                    session,
                    delivered = subscription.delivered,
                    "subscription retired"
                );
            }
            return Ok(true);
        }
        Ok(false)
    }

    /// The session's registered class filter.
    pub fn filter_for(&self, session: &str) -> Result<ClassFilter, Error> {
        self.subscriptions
            .read()
            .get(session)
            .map(|s| s.classes.clone())
            .ok_or_else(|| Error::NotRegistered(session.to_string()))
    }

    /// The session's stored cursor.
    pub fn cursor_for(&self, session: &str) -> Result<u64, Error> {
        self.subscriptions
            .read()
            .get(session)
            .map(|s| s.cursor)
            .ok_or_else(|| Error::NotRegistered(session.to_string()))
    }

    /// Advance the session's cursor to `to` and account for delivered
    /// records. Cursors never move backwards; a stale `to` is a no-op.
    pub fn advance_cursor(&self, session: &str, to: u64, delivered: u64) -> Result<(), Error> {
        let mut subscriptions = self.subscriptions.write();
        let subscription = subscriptions
            .get_mut(session)
            .ok_or_else(|| Error::NotRegistered(session.to_string()))?;

        subscription.cursor = subscription.cursor.max(to);
        subscription.delivered += delivered;
        Ok(())
    }

    /// Minimum cursor across live subscriptions, `None` when there are
    /// none. Pruning must never pass this position.
    pub fn min_cursor(&self) -> Option<u64> {
        self.subscriptions.read().values().map(|s| s.cursor).min()
    }

    /// Drop the session's subscription entirely (session terminated).
    pub fn remove_session(&self, session: &str) -> bool {
        let removed = self.subscriptions.write().remove(session);
        if removed.is_some() {
            tracing::debug!(session, "subscription removed with session");
        }
        removed.is_some()
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Whether there are no live subscriptions.
    pub fn is_empty(&self) -> bool {
        self.subscriptions.read().is_empty()
    }
}
