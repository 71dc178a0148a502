//! Event bus facade.
//!
//! Owns the log, registry, dispatcher, and token codec, and exposes the
//! boundary operations: register, unregister, next, from, current id,
//! and injection. The object-model layer feeds natural mutations in
//! through [`EventBus::publish`]; injected synthetic events take the
//! same path.

use std::sync::Arc;
use std::time::{Duration, Instant};

use eventd_proto::{EventOperation, EventRecord};

use crate::dispatcher::Dispatcher;
use crate::error::Error;
use crate::filter::ClassFilter;
use crate::log::{EventLog, PruneReport, RetentionPolicy};
use crate::metrics::{new_shared_metrics, MetricsSnapshot, SharedBusMetrics};
use crate::registry::SubscriptionRegistry;
use crate::token::TokenCodec;

/// Default server-side bound on a single long-poll.
pub const DEFAULT_MAX_POLL_TIMEOUT: Duration = Duration::from_secs(30);

/// Default cap on records returned by one poll.
pub const DEFAULT_MAX_BATCH: usize = 1024;

/// Event bus tuning knobs.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Retention safety valve for the log.
    pub retention: RetentionPolicy,
    /// Cap on records returned by one poll; the remainder is picked up by
    /// the following poll via the returned token.
    pub max_batch: usize,
    /// Server-side bound on any long-poll, including `next`.
    pub max_poll_timeout: Duration,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            retention: RetentionPolicy::default(),
            max_batch: DEFAULT_MAX_BATCH,
            max_poll_timeout: DEFAULT_MAX_POLL_TIMEOUT,
        }
    }
}

/// The event bus core: ordered log, per-session subscriptions, long-poll
/// delivery, and token-based resumption.
pub struct EventBus {
    log: Arc<EventLog>,
    registry: Arc<SubscriptionRegistry>,
    dispatcher: Dispatcher,
    tokens: TokenCodec,
    metrics: SharedBusMetrics,
    max_poll_timeout: Duration,
}

impl EventBus {
    /// Create a bus with the given configuration.
    pub fn new(config: BusConfig) -> Self {
        let log = Arc::new(EventLog::new(config.retention));
        let registry = Arc::new(SubscriptionRegistry::new());
        let metrics = new_shared_metrics();
        let dispatcher = Dispatcher::new(
            log.clone(),
            registry.clone(),
            metrics.clone(),
            config.max_batch,
        );
        Self {
            log,
            registry,
            dispatcher,
            tokens: TokenCodec::new(),
            metrics,
            max_poll_timeout: config.max_poll_timeout,
        }
    }

    /// Register the session for the given classes (`*` = all classes).
    ///
    /// A new subscription starts at the current log tail, so only events
    /// appended after registration are seen. Re-registering unions the
    /// classes into the existing filter without touching the cursor.
    pub fn register<S: AsRef<str>>(&self, session: &str, classes: &[S]) -> Result<(), Error> {
        let filter = ClassFilter::from_classes(classes)?;
        self.registry.register(session, &filter, self.log.last_id());
        Ok(())
    }

    /// Remove the given classes from the session's filter. An empty
    /// resulting filter retires the subscription and cancels any parked
    /// poll for the session.
    pub fn unregister<S: AsRef<str>>(&self, session: &str, classes: &[S]) -> Result<(), Error> {
        let filter = ClassFilter::from_classes(classes)?;
        let retired = self.registry.unregister(session, &filter)?;
        if retired {
            self.dispatcher.cancel_session(session);
        }
        Ok(())
    }

    /// Blocking poll from the session's stored cursor, bounded by the
    /// server-side maximum timeout. Advances the cursor past delivered
    /// records.
    pub async fn next(&self, session: &str) -> Result<Vec<Arc<EventRecord>>, Error> {
        let start = self.registry.cursor_for(session)?;
        let deadline = Instant::now() + self.max_poll_timeout;
        let (records, end) = self.dispatcher.poll(session, None, start, deadline).await?;
        self.finish_delivery(session, &records, end)?;
        Ok(records)
    }

    /// Blocking poll with an explicit class set, resumption token, and
    /// timeout.
    ///
    /// An empty `classes` slice means the session's full registered
    /// filter; otherwise the poll serves the intersection of `classes`
    /// with the registration. An empty `token` starts from the session's
    /// stored cursor. A timeout yields a successful empty batch with a
    /// token at the unchanged position.
    pub async fn from<S: AsRef<str>>(
        &self,
        session: &str,
        classes: &[S],
        token: &str,
        timeout: Duration,
    ) -> Result<(Vec<Arc<EventRecord>>, String), Error> {
        let requested = if classes.is_empty() {
            None
        } else {
            Some(ClassFilter::from_classes(classes)?)
        };

        let start = if token.is_empty() {
            self.registry.cursor_for(session)?
        } else {
            self.tokens.decode(token)?.position
        };

        let deadline = Instant::now() + timeout.min(self.max_poll_timeout);
        let (records, end) = self
            .dispatcher
            .poll(session, requested.as_ref(), start, deadline)
            .await?;
        self.finish_delivery(session, &records, end)?;

        let token_classes = match &requested {
            Some(filter) => filter.class_names(),
            None => self.registry.filter_for(session)?.class_names(),
        };
        let token = self.tokens.encode(end, &token_classes)?;
        Ok((records, token))
    }

    /// Id the next appended record will receive.
    pub fn current_id(&self) -> u64 {
        self.log.current_id()
    }

    /// Admit a natural mutation from the object model. Returns the
    /// assigned event id.
    pub fn publish(
        &self,
        class: &str,
        operation: EventOperation,
        object_ref: &str,
        object_uuid: &str,
    ) -> u64 {
        self.metrics.record_append(false);
        self.dispatcher
            .publish(class, operation, object_ref, object_uuid)
            .id
    }

    /// Admit a synthetic event on the given object, through the same path
    /// as natural mutations. The record carries operation `Mod` and the
    /// reference verbatim in both opaque fields, since the object model
    /// is not consulted for a UUID.
    pub fn inject(&self, class: &str, object_ref: &str) -> Result<u64, Error> {
        if class.is_empty() || class == eventd_proto::WILDCARD_CLASS {
            return Err(Error::InvalidClassSet(format!(
                "cannot inject into class {:?}",
                class
            )));
        }
        self.metrics.record_append(true);
        let record = self
            .dispatcher
            .publish(class, EventOperation::Mod, object_ref, object_ref);
        tracing::debug!(id = record.id, class, object_ref, "synthetic event injected");
        Ok(record.id)
    }

    /// Run a retention pass: prune records every live cursor has consumed
    /// past, as far as the retention policy demands.
    pub fn prune(&self) -> PruneReport {
        let report = self.log.prune(self.registry.min_cursor());
        self.metrics.record_prune(report.removed as u64, report.deferred);
        if report.removed > 0 {
            tracing::debug!(removed = report.removed, "pruned consumed records");
        }
        report
    }

    /// Drop the session's subscription and cancel its parked polls
    /// (session terminated by the session layer).
    pub fn remove_session(&self, session: &str) {
        self.registry.remove_session(session);
        self.dispatcher.cancel_session(session);
    }

    /// Snapshot of the bus counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.registry.len()
    }

    fn finish_delivery(
        &self,
        session: &str,
        records: &[Arc<EventRecord>],
        end: u64,
    ) -> Result<(), Error> {
        if records.is_empty() {
            return Ok(());
        }
        self.metrics.record_delivery(records.len() as u64);
        self.registry
            .advance_cursor(session, end, records.len() as u64)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(BusConfig::default())
    }
}
