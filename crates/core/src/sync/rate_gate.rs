//! Minimum-interval guard for local and remote writes.
//!
//! Timestamps live in the key-value store so the gate survives restarts. The
//! gate only throttles; it is never consulted for conflict detection.

use log::{debug, warn};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::errors::Result;
use crate::storage::{KeyValueStore, LAST_LOCAL_SAVE_KEY, LAST_REMOTE_SAVE_KEY};

/// Wall-clock source, replaceable in tests.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Manually advanced clock for deterministic scheduling.
#[derive(Debug, Default)]
pub struct ManualClock(AtomicI64);

impl ManualClock {
    pub fn at(millis: i64) -> Self {
        Self(AtomicI64::new(millis))
    }

    pub fn advance(&self, millis: i64) {
        self.0.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Write destination tracked by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Local,
    Remote,
}

impl Destination {
    fn key(self) -> &'static str {
        match self {
            Destination::Local => LAST_LOCAL_SAVE_KEY,
            Destination::Remote => LAST_REMOTE_SAVE_KEY,
        }
    }
}

/// Decision returned by [`RateGate::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Open,
    TooSoon { retry_in_ms: i64 },
}

#[derive(Clone)]
pub struct RateGate {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    min_interval_ms: i64,
}

impl RateGate {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, min_interval_ms: i64) -> Self {
        Self {
            store,
            clock,
            min_interval_ms,
        }
    }

    pub fn min_interval_ms(&self) -> i64 {
        self.min_interval_ms
    }

    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Last successful write to `destination`; unreadable values count as none.
    pub fn last_success(&self, destination: Destination) -> Option<i64> {
        match self.store.get(destination.key()) {
            Ok(Some(raw)) => raw.trim().parse::<i64>().ok(),
            Ok(None) => None,
            Err(e) => {
                warn!("[RateGate] Failed to read {}: {}", destination.key(), e);
                None
            }
        }
    }

    pub fn check(&self, destination: Destination) -> GateDecision {
        let Some(last) = self.last_success(destination) else {
            return GateDecision::Open;
        };
        let elapsed = self.clock.now_millis() - last;
        // A clock that moved backwards must not lock writes out.
        if elapsed < 0 || elapsed >= self.min_interval_ms {
            return GateDecision::Open;
        }
        let retry_in_ms = self.min_interval_ms - elapsed;
        debug!(
            "[RateGate] {:?} write {}ms after the previous one, retry in {}ms",
            destination, elapsed, retry_in_ms
        );
        GateDecision::TooSoon { retry_in_ms }
    }

    pub fn record_success(&self, destination: Destination) -> Result<()> {
        let now = self.clock.now_millis();
        self.store.set(destination.key(), &now.to_string())
    }

    pub fn reset(&self, destination: Destination) -> Result<()> {
        self.store.remove(destination.key())
    }
}
