//! Per-node record of consecutive connection timeouts, gating status probes.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

pub const MAX_CONSECUTIVE_TIMEOUTS: u32 = 3;
pub const TIMEOUT_RETRY_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipPolicy {
    /// Any recorded timeout skips the node until the record is cleared.
    Permanent,
    /// Skip only while the node has reached `max_consecutive` timeouts and
    /// the last one happened less than `retry_interval` ago.
    RetryAfterInterval {
        max_consecutive: u32,
        retry_interval: Duration,
    },
}

impl Default for SkipPolicy {
    fn default() -> Self {
        SkipPolicy::RetryAfterInterval {
            max_consecutive: MAX_CONSECUTIVE_TIMEOUTS,
            retry_interval: TIMEOUT_RETRY_INTERVAL,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeoutRecord {
    pub last_failure: Instant,
    pub consecutive: u32,
}

#[derive(Debug, Default)]
pub struct TimeoutTracker {
    policy: SkipPolicy,
    records: Mutex<HashMap<String, TimeoutRecord>>,
}

impl TimeoutTracker {
    pub fn new(policy: SkipPolicy) -> Self {
        Self {
            policy,
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn should_skip(&self, node: &str) -> bool {
        self.should_skip_at(node, Instant::now())
    }

    pub fn should_skip_at(&self, node: &str, now: Instant) -> bool {
        let records = self.lock();
        let Some(record) = records.get(node) else {
            return false;
        };
        match self.policy {
            SkipPolicy::Permanent => true,
            SkipPolicy::RetryAfterInterval {
                max_consecutive,
                retry_interval,
            } => {
                record.consecutive >= max_consecutive
                    && now.saturating_duration_since(record.last_failure) < retry_interval
            }
        }
    }

    pub fn record_timeout(&self, node: &str) {
        self.record_timeout_at(node, Instant::now());
    }

    pub fn record_timeout_at(&self, node: &str, now: Instant) {
        let mut records = self.lock();
        let record = records.entry(node.to_string()).or_insert(TimeoutRecord {
            last_failure: now,
            consecutive: 0,
        });
        record.consecutive = record.consecutive.saturating_add(1);
        record.last_failure = now;
    }

    pub fn record_success(&self, node: &str) {
        self.lock().remove(node);
    }

    /// Forget every record (manual refresh).
    pub fn clear_all(&self) {
        self.lock().clear();
    }

    pub fn record(&self, node: &str) -> Option<TimeoutRecord> {
        self.lock().get(node).copied()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, TimeoutRecord>> {
        // a poisoned map only means a probe task panicked mid-update; the data is still usable
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
