//! Event records, operations, and batches.

use serde::{Deserialize, Serialize};

/// Class name that matches every managed-object class, including classes
/// that do not exist yet when the subscription is created.
pub const WILDCARD_CLASS: &str = "*";

/// The kind of state transition an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventOperation {
    /// An object was created.
    Add,
    /// An object was modified. Also used for injected synthetic events.
    Mod,
    /// An object was destroyed.
    Del,
}

/// A single change event describing a state transition of a managed object.
///
/// Records are immutable once appended to the log. Ids are assigned by the
/// log, monotonically increasing and never reused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Monotonically increasing identifier, unique within one log instance.
    pub id: u64,
    /// Timestamp in microseconds since the Unix epoch.
    pub timestamp: u64,
    /// Class name of the managed object (e.g. "VM", "Network").
    pub class: String,
    /// The kind of change.
    pub operation: EventOperation,
    /// Opaque object reference, carried verbatim from the object model.
    pub object_ref: String,
    /// Opaque object UUID, carried verbatim from the object model.
    pub object_uuid: String,
}

impl EventRecord {
    /// Create a record with the current timestamp. The id is a placeholder
    /// until the log assigns the real one on append.
    pub fn new(
        class: impl Into<String>,
        operation: EventOperation,
        object_ref: impl Into<String>,
        object_uuid: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            timestamp: Self::current_timestamp(),
            class: class.into(),
            operation,
            object_ref: object_ref.into(),
            object_uuid: object_uuid.into(),
        }
    }

    /// Get current timestamp in microseconds.
    fn current_timestamp() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0)
    }
}

/// A finite, ordered, possibly-empty batch of event records plus the token
/// that resumes consumption after the last record in the batch.
///
/// An empty batch is a successful response (the long-poll timed out), not
/// an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventBatch {
    /// Records in ascending id order.
    pub records: Vec<EventRecord>,
    /// Resumption token for the position after the last record. Unchanged
    /// from the request position when the batch is empty.
    pub token: String,
}

impl EventBatch {
    /// Create a batch.
    pub fn new(records: Vec<EventRecord>, token: impl Into<String>) -> Self {
        Self {
            records,
            token: token.into(),
        }
    }

    /// Create an empty batch carrying an unchanged token.
    pub fn empty(token: impl Into<String>) -> Self {
        Self::new(Vec::new(), token)
    }

    /// Number of records in the batch.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the batch carries no records (timeout case).
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
