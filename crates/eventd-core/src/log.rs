//! Append-only, monotonically ordered event log.
//!
//! The log is the source of truth for event ordering. Records carry
//! monotonically increasing, gapless ids assigned at append time.
//! Subscribers never hold record references across calls, only positions
//! (ids); records are handed out as `Arc<EventRecord>`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use eventd_proto::{EventOperation, EventRecord};

use crate::error::Error;

/// Default maximum number of retained records.
pub const DEFAULT_MAX_RECORDS: usize = 100_000;

/// Default maximum age of retained records (1 hour).
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(3600);

/// Retention safety valve for the in-memory log.
///
/// The valve bounds memory when subscribers fall behind, but correctness
/// wins over the bound: pruning never removes a record a live subscription
/// cursor has not consumed past. When the bound would require that, the
/// excess is kept and reported as deferred.
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    /// Maximum number of records to retain.
    pub max_records: usize,
    /// Maximum age of a retained record.
    pub max_age: Duration,
}

impl RetentionPolicy {
    /// Create a policy with the given record count bound and default age.
    pub fn with_max_records(max_records: usize) -> Self {
        Self {
            max_records,
            ..Self::default()
        }
    }

    /// Create a policy with the given age bound and default count.
    pub fn with_max_age(max_age: Duration) -> Self {
        Self {
            max_age,
            ..Self::default()
        }
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_records: DEFAULT_MAX_RECORDS,
            max_age: DEFAULT_MAX_AGE,
        }
    }
}

/// Outcome of a prune pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Number of records removed.
    pub removed: usize,
    /// True when the retention bound is exceeded but further pruning was
    /// deferred to protect an unconsumed live cursor.
    pub deferred: bool,
}

struct LogInner {
    /// Retained records in ascending id order.
    records: VecDeque<Arc<EventRecord>>,
    /// Id the next appended record will receive.
    next_id: u64,
    /// Highest id removed by pruning; positions at or before this cannot
    /// be reconstructed.
    pruned_through: u64,
}

/// Append-only in-memory event log.
pub struct EventLog {
    inner: RwLock<LogInner>,
    retention: RetentionPolicy,
}

impl EventLog {
    /// Create an empty log with the given retention policy. Ids start at 1.
    pub fn new(retention: RetentionPolicy) -> Self {
        Self {
            inner: RwLock::new(LogInner {
                records: VecDeque::new(),
                next_id: 1,
                pruned_through: 0,
            }),
            retention,
        }
    }

    /// Append a record, assigning the next id and the current timestamp.
    ///
    /// Id assignment happens under the log lock so deque order always
    /// equals id order.
    pub fn append(
        &self,
        class: &str,
        operation: EventOperation,
        object_ref: &str,
        object_uuid: &str,
    ) -> Arc<EventRecord> {
        let mut inner = self.inner.write();
        let mut record = EventRecord::new(class, operation, object_ref, object_uuid);
        record.id = inner.next_id;
        inner.next_id += 1;

        let record = Arc::new(record);
        inner.records.push_back(record.clone());
        record
    }

    /// All retained records with id strictly greater than `from`, in
    /// ascending id order. Empty if there are none.
    ///
    /// Fails with [`Error::Expired`] when `from` precedes the retained
    /// window; the caller must resync from "now".
    pub fn records_since(&self, from: u64) -> Result<Vec<Arc<EventRecord>>, Error> {
        let inner = self.inner.read();
        if from < inner.pruned_through {
            return Err(Error::Expired);
        }

        let start = inner.records.partition_point(|r| r.id <= from);
        Ok(inner.records.iter().skip(start).cloned().collect())
    }

    /// Id the next appended record will receive.
    pub fn current_id(&self) -> u64 {
        self.inner.read().next_id
    }

    /// Id of the most recently appended record, or 0 if nothing was ever
    /// appended. The starting cursor for subscriptions that want only
    /// future events.
    pub fn last_id(&self) -> u64 {
        self.inner.read().next_id - 1
    }

    /// Number of retained records.
    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    /// Whether the log retains no records.
    pub fn is_empty(&self) -> bool {
        self.inner.read().records.is_empty()
    }

    /// Remove records already consumed by every live subscription, as far
    /// as the retention policy demands.
    ///
    /// `min_live_cursor` is the minimum cursor across live subscriptions
    /// (`None` when there are none, which leaves the whole log removable).
    /// Records are removed only while the policy's count or age bound is
    /// exceeded, and never past the minimum live cursor; when the bound
    /// would require that, pruning stops and the report marks it deferred.
    pub fn prune(&self, min_live_cursor: Option<u64>) -> PruneReport {
        let mut inner = self.inner.write();
        let limit = min_live_cursor.unwrap_or(inner.next_id - 1);
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0);
        let max_age_us = self.retention.max_age.as_micros() as u64;

        let mut report = PruneReport::default();
        loop {
            let (front_id, front_ts) = match inner.records.front() {
                Some(record) => (record.id, record.timestamp),
                None => break,
            };
            let over_count = inner.records.len() > self.retention.max_records;
            let over_age = now.saturating_sub(front_ts) > max_age_us;
            if !over_count && !over_age {
                break;
            }
            if front_id > limit {
                report.deferred = true;
                break;
            }
            inner.pruned_through = front_id;
            inner.records.pop_front();
            report.removed += 1;
        }

        if report.deferred {
            tracing::warn!(
                retained = inner.records.len(),
                max_records = self.retention.max_records,
                min_live_cursor = limit,
                "retention bound exceeded, pruning deferred for a slow subscriber"
            );
        }

        report
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(RetentionPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn append_n(log: &EventLog, class: &str, n: usize) -> Vec<u64> {
        (0..n)
            .map(|i| {
                log.append(
                    class,
                    EventOperation::Add,
                    &format!("ref-{}", i),
                    &format!("uuid-{}", i),
                )
                .id
            })
            .collect()
    }

    #[test]
    fn test_ids_monotonic_and_gapless() {
        let log = EventLog::default();
        assert_eq!(log.current_id(), 1);
        assert_eq!(log.last_id(), 0);

        let ids = append_n(&log, "VM", 5);
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(log.current_id(), 6);
        assert_eq!(log.last_id(), 5);
    }

    #[test]
    fn test_records_since() {
        let log = EventLog::default();
        append_n(&log, "VM", 5);

        let records = log.records_since(2).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].id, 3);
        assert_eq!(records[2].id, 5);

        assert!(log.records_since(5).unwrap().is_empty());
        assert!(log.records_since(0).unwrap().len() == 5);
    }

    #[test]
    fn test_prune_respects_retention_bound() {
        let log = EventLog::new(RetentionPolicy::with_max_records(3));
        append_n(&log, "VM", 5);

        // All records consumed; count bound forces removal down to 3.
        let report = log.prune(Some(5));
        assert_eq!(report.removed, 2);
        assert!(!report.deferred);
        assert_eq!(log.len(), 3);

        // Positions before the window are gone.
        assert!(matches!(log.records_since(0), Err(Error::Expired)));
        assert!(matches!(log.records_since(1), Err(Error::Expired)));
        // The boundary position itself is still reconstructable.
        assert_eq!(log.records_since(2).unwrap().len(), 3);
    }

    #[test]
    fn test_prune_never_passes_live_cursor() {
        let log = EventLog::new(RetentionPolicy::with_max_records(2));
        append_n(&log, "VM", 5);

        // A subscriber has only consumed through id 1: ids 2..=5 are live.
        let report = log.prune(Some(1));
        assert_eq!(report.removed, 1);
        assert!(report.deferred);
        assert_eq!(log.len(), 4);
        assert_eq!(log.records_since(1).unwrap().len(), 4);
    }

    #[test]
    fn test_prune_without_subscribers_is_bounded_only() {
        let log = EventLog::new(RetentionPolicy::with_max_records(10));
        append_n(&log, "VM", 5);

        // Under the bound: nothing to do even with no live cursors.
        let report = log.prune(None);
        assert_eq!(report.removed, 0);
        assert_eq!(log.len(), 5);

        append_n(&log, "VM", 10);
        let report = log.prune(None);
        assert_eq!(report.removed, 5);
        assert_eq!(log.len(), 10);
    }

    #[test]
    fn test_ids_never_reused_after_prune() {
        let log = EventLog::new(RetentionPolicy::with_max_records(1));
        append_n(&log, "VM", 3);
        log.prune(Some(3));

        let record = log.append("VM", EventOperation::Mod, "r", "u");
        assert_eq!(record.id, 4);
    }
}
