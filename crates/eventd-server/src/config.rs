//! Server configuration.

use std::time::Duration;

use clap::Parser;
use eventd_core::{BusConfig, RetentionPolicy};

/// Default server-side bound on a single long-poll, in seconds.
pub const DEFAULT_MAX_POLL_TIMEOUT_SECS: u64 = 30;

/// Default interval between retention passes, in seconds.
pub const DEFAULT_PRUNE_INTERVAL_SECS: u64 = 60;

/// Default maximum retained records.
pub const DEFAULT_MAX_RECORDS: usize = 100_000;

/// Default maximum record age, in seconds (1 hour).
pub const DEFAULT_MAX_AGE_SECS: u64 = 3600;

/// Default cap on records returned by one poll.
pub const DEFAULT_MAX_BATCH: usize = 1024;

/// eventd server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server-side bound on any long-poll, including `next`.
    pub max_poll_timeout: Duration,

    /// Interval between automatic retention passes. None disables them.
    pub prune_interval: Option<Duration>,

    /// Retention safety valve for the event log.
    pub retention: RetentionPolicy,

    /// Cap on records returned by one poll.
    pub max_batch: usize,
}

impl ServerConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self {
            max_poll_timeout: Duration::from_secs(DEFAULT_MAX_POLL_TIMEOUT_SECS),
            prune_interval: Some(Duration::from_secs(DEFAULT_PRUNE_INTERVAL_SECS)),
            retention: RetentionPolicy {
                max_records: DEFAULT_MAX_RECORDS,
                max_age: Duration::from_secs(DEFAULT_MAX_AGE_SECS),
            },
            max_batch: DEFAULT_MAX_BATCH,
        }
    }

    /// Set the long-poll bound.
    pub fn with_max_poll_timeout(mut self, timeout: Duration) -> Self {
        self.max_poll_timeout = timeout;
        self
    }

    /// Set the retention pass interval.
    pub fn with_prune_interval(mut self, interval: Duration) -> Self {
        self.prune_interval = Some(interval);
        self
    }

    /// Disable automatic retention passes.
    pub fn without_pruning(mut self) -> Self {
        self.prune_interval = None;
        self
    }

    /// Set the retention policy.
    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    /// Set the per-poll batch cap.
    pub fn with_max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = max_batch.max(1);
        self
    }

    /// Whether automatic retention passes are enabled.
    pub fn has_pruning(&self) -> bool {
        self.prune_interval.is_some()
    }

    /// Bus configuration derived from this server configuration.
    pub fn bus_config(&self) -> BusConfig {
        BusConfig {
            retention: self.retention.clone(),
            max_batch: self.max_batch,
            max_poll_timeout: self.max_poll_timeout,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Command-line arguments for the server.
#[derive(Parser, Debug)]
#[command(name = "eventd-server")]
#[command(version, about = "eventd event bus server", long_about = None)]
pub struct Args {
    /// Maximum long-poll duration in seconds.
    #[arg(long, default_value_t = DEFAULT_MAX_POLL_TIMEOUT_SECS)]
    pub max_poll_timeout: u64,

    /// Retention pass interval in seconds. Set to 0 to disable.
    #[arg(long, default_value_t = DEFAULT_PRUNE_INTERVAL_SECS)]
    pub prune_interval: u64,

    /// Maximum retained records.
    #[arg(long, default_value_t = DEFAULT_MAX_RECORDS)]
    pub max_records: usize,

    /// Maximum retained record age in seconds.
    #[arg(long, default_value_t = DEFAULT_MAX_AGE_SECS)]
    pub max_age: u64,

    /// Maximum records returned by one poll.
    #[arg(long, default_value_t = DEFAULT_MAX_BATCH)]
    pub max_batch: usize,
}

impl Args {
    /// Convert command-line arguments to server configuration.
    pub fn into_config(self) -> ServerConfig {
        let prune_interval = if self.prune_interval == 0 {
            None
        } else {
            Some(Duration::from_secs(self.prune_interval))
        };

        ServerConfig {
            max_poll_timeout: Duration::from_secs(self.max_poll_timeout),
            prune_interval,
            retention: RetentionPolicy {
                max_records: self.max_records,
                max_age: Duration::from_secs(self.max_age),
            },
            max_batch: self.max_batch.max(1),
        }
    }
}
