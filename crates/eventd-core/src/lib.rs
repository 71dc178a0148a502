//! Event bus core for a virtualization control plane.
//!
//! Sessions register interest in classes of managed objects, then
//! long-poll for ordered batches of change events, resuming from opaque
//! tokens. The bus durably orders events in one append-only log and lets
//! many independent subscribers consume them at independent rates.
//!
//! # Modules
//!
//! - [`log`] - Append-only ordered event log with retention
//! - [`filter`] - Class filters, including the `*` wildcard
//! - [`registry`] - Per-session subscriptions and delivery cursors
//! - [`dispatcher`] - Long-poll matching, parking, and targeted wakes
//! - [`token`] - Opaque resumption tokens
//! - [`bus`] - The facade tying the pieces together
//! - [`metrics`] - Atomic counters over the delivery pipeline
//! - [`error`] - Error taxonomy

pub mod bus;
pub mod dispatcher;
pub mod error;
pub mod filter;
pub mod log;
pub mod metrics;
pub mod registry;
pub mod token;

pub use bus::{BusConfig, EventBus, DEFAULT_MAX_BATCH, DEFAULT_MAX_POLL_TIMEOUT};
pub use dispatcher::Dispatcher;
pub use error::Error;
pub use filter::ClassFilter;
pub use log::{EventLog, PruneReport, RetentionPolicy};
pub use metrics::{new_shared_metrics, BusMetrics, MetricsSnapshot, SharedBusMetrics};
pub use registry::{Subscription, SubscriptionRegistry};
pub use token::{ResumePoint, TokenCodec};
