//! Single-flight guard for backend operations
//!
//! A key is either free or held by exactly one [`GatePermit`]. A second caller
//! asking for a held key is turned away immediately; nothing is queued. The key
//! is released when the permit drops, so every exit path of the guarded
//! operation (success, error, early return, panic unwind) frees it.

use dashmap::DashSet;
use std::sync::Arc;
use tracing::debug;

/// Keyed single-flight gate
#[derive(Debug, Clone, Default)]
pub struct RequestGate {
    in_flight: Arc<DashSet<String>>,
}

impl RequestGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to take the slot for `key`
    ///
    /// Returns `None` when an operation with the same key is already running.
    pub fn try_acquire(&self, key: impl Into<String>) -> Option<GatePermit> {
        let key = key.into();
        if self.in_flight.insert(key.clone()) {
            debug!(key = %key, "Gate acquired");
            Some(GatePermit {
                key,
                in_flight: Arc::clone(&self.in_flight),
            })
        } else {
            debug!(key = %key, "Gate busy, rejecting call");
            None
        }
    }

    /// Check whether an operation holds `key`
    pub fn is_in_flight(&self, key: &str) -> bool {
        self.in_flight.contains(key)
    }

    /// Number of keys currently held
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }
}

/// Proof of holding a gate key; releases it on drop
#[derive(Debug)]
pub struct GatePermit {
    key: String,
    in_flight: Arc<DashSet<String>>,
}

impl GatePermit {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        self.in_flight.remove(&self.key);
        debug!(key = %self.key, "Gate released");
    }
}
