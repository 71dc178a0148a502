//! Long-poll dispatcher.
//!
//! Matches appended records against live subscriptions and parks pollers
//! that have nothing to consume. Wakes are targeted: an append only
//! notifies waiters whose effective class filter matches the new record,
//! so unrelated sessions are never re-filtered. No lock is held across a
//! suspension; waiters park on a per-poll oneshot slot and re-read the
//! log after every wake.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use eventd_proto::{EventOperation, EventRecord};

use crate::error::Error;
use crate::filter::ClassFilter;
use crate::log::EventLog;
use crate::metrics::SharedBusMetrics;
use crate::registry::SubscriptionRegistry;

/// Why a parked poller was woken.
enum Wake {
    /// A record matching the waiter's filter was appended.
    Matched,
    /// The session was terminated or its subscription retired.
    Cancelled,
}

struct Waiter {
    session: String,
    filter: ClassFilter,
    tx: oneshot::Sender<Wake>,
}

/// Fan-out engine between the event log and blocked pollers.
pub struct Dispatcher {
    log: Arc<EventLog>,
    registry: Arc<SubscriptionRegistry>,
    metrics: SharedBusMetrics,
    waiters: Mutex<HashMap<u64, Waiter>>,
    next_waiter_id: AtomicU64,
    max_batch: usize,
}

impl Dispatcher {
    /// Create a dispatcher over the given log and registry.
    pub fn new(
        log: Arc<EventLog>,
        registry: Arc<SubscriptionRegistry>,
        metrics: SharedBusMetrics,
        max_batch: usize,
    ) -> Self {
        Self {
            log,
            registry,
            metrics,
            waiters: Mutex::new(HashMap::new()),
            next_waiter_id: AtomicU64::new(1),
            max_batch: max_batch.max(1),
        }
    }

    /// Append a record through the log and wake matching waiters.
    ///
    /// This is the single admission path for both natural mutations and
    /// injected synthetic events, so both participate in ordering and
    /// delivery identically.
    pub fn publish(
        &self,
        class: &str,
        operation: EventOperation,
        object_ref: &str,
        object_uuid: &str,
    ) -> Arc<EventRecord> {
        let record = self.log.append(class, operation, object_ref, object_uuid);
        tracing::trace!(id = record.id, class, operation = ?operation, "event appended");
        self.wake_matching(class);
        record
    }

    /// Long-poll for records after `start` matching the effective filter.
    ///
    /// The effective filter is the session's registration intersected
    /// with `requested` when given. Returns the matching records (capped
    /// at the batch limit) and the position the poll consumed through:
    /// the id of the last returned record, or `start` unchanged when the
    /// deadline elapsed with nothing to deliver. Cancellation while
    /// parked fails with [`Error::SessionInvalid`].
    pub async fn poll(
        &self,
        session: &str,
        requested: Option<&ClassFilter>,
        start: u64,
        deadline: Instant,
    ) -> Result<(Vec<Arc<EventRecord>>, u64), Error> {
        loop {
            let registered = self.registry.filter_for(session)?;
            let effective = match requested {
                Some(requested) => requested.intersect(&registered),
                None => registered,
            };

            let (records, end) = self.collect(start, &effective)?;
            if !records.is_empty() {
                return Ok((records, end));
            }
            if Instant::now() >= deadline {
                self.metrics.record_empty_poll();
                return Ok((Vec::new(), start));
            }

            // Park. The waiter is registered before the re-check below so
            // an append racing with us cannot be lost.
            let (tx, rx) = oneshot::channel();
            let waiter_id = self.add_waiter(session, effective.clone(), tx);

            let (records, end) = match self.collect(start, &effective) {
                Ok(collected) => collected,
                Err(e) => {
                    self.remove_waiter(waiter_id);
                    return Err(e);
                }
            };
            if !records.is_empty() {
                self.remove_waiter(waiter_id);
                return Ok((records, end));
            }

            match tokio::time::timeout_at(deadline.into(), rx).await {
                Ok(Ok(Wake::Matched)) => {
                    self.metrics.record_wake();
                    continue;
                }
                Ok(Ok(Wake::Cancelled)) | Ok(Err(_)) => {
                    self.metrics.record_cancellation();
                    return Err(Error::SessionInvalid(session.to_string()));
                }
                Err(_elapsed) => {
                    self.remove_waiter(waiter_id);
                    self.metrics.record_empty_poll();
                    return Ok((Vec::new(), start));
                }
            }
        }
    }

    /// Cancel every parked poll belonging to the session.
    pub fn cancel_session(&self, session: &str) {
        let mut waiters = self.waiters.lock();
        let ids: Vec<u64> = waiters
            .iter()
            .filter(|(_, w)| w.session == session)
            .map(|(&id, _)| id)
            .collect();
        for id in ids {
            if let Some(waiter) = waiters.remove(&id) {
                let _ = waiter.tx.send(Wake::Cancelled);
            }
        }
    }

    /// Number of parked polls.
    pub fn waiter_count(&self) -> usize {
        self.waiters.lock().len()
    }

    /// Records after `start` passing `filter`, ascending, capped at the
    /// batch limit. The returned position is the id of the last returned
    /// record (`start` when nothing matched), so filtered-out records are
    /// never consumed past.
    fn collect(
        &self,
        start: u64,
        filter: &ClassFilter,
    ) -> Result<(Vec<Arc<EventRecord>>, u64), Error> {
        let candidates = self.log.records_since(start)?;
        let mut records = Vec::new();
        for candidate in candidates {
            if filter.matches(&candidate.class) {
                records.push(candidate);
                if records.len() == self.max_batch {
                    break;
                }
            }
        }
        let end = records.last().map(|r| r.id).unwrap_or(start);
        Ok((records, end))
    }

    fn add_waiter(&self, session: &str, filter: ClassFilter, tx: oneshot::Sender<Wake>) -> u64 {
        let id = self.next_waiter_id.fetch_add(1, Ordering::SeqCst);
        self.waiters.lock().insert(
            id,
            Waiter {
                session: session.to_string(),
                filter,
                tx,
            },
        );
        id
    }

    fn remove_waiter(&self, id: u64) {
        self.waiters.lock().remove(&id);
    }

    fn wake_matching(&self, class: &str) {
        let mut waiters = self.waiters.lock();
        let ids: Vec<u64> = waiters
            .iter()
            .filter(|(_, w)| w.filter.matches(class))
            .map(|(&id, _)| id)
            .collect();
        for id in ids {
            if let Some(waiter) = waiters.remove(&id) {
                let _ = waiter.tx.send(Wake::Matched);
            }
        }
    }
}
