//! Snapshot publishing
//!
//! The poller publishes an immutable copy of the collection after every
//! tick into a single-slot mailbox. Consumers clone the `Arc` and never
//! hold the poll lock.

use crate::domain::DeviceCollection;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};

/// Immutable view of the collection after one tick
#[derive(Debug, Clone, Serialize)]
pub struct CollectionSnapshot {
    /// Tick number, starting at 1; 0 before the first poll
    pub tick: u64,
    pub taken_at: DateTime<Utc>,
    pub devices: DeviceCollection,
}

impl CollectionSnapshot {
    pub fn new(tick: u64, devices: DeviceCollection) -> Self {
        Self {
            tick,
            taken_at: Utc::now(),
            devices,
        }
    }
}

/// Single-slot mailbox holding the latest snapshot
#[derive(Debug)]
pub struct SnapshotSlot {
    latest: Mutex<Arc<CollectionSnapshot>>,
}

impl SnapshotSlot {
    pub fn new(initial: CollectionSnapshot) -> Self {
        Self {
            latest: Mutex::new(Arc::new(initial)),
        }
    }

    /// Replace the published snapshot
    pub fn publish(&self, snapshot: CollectionSnapshot) {
        let snapshot = Arc::new(snapshot);
        match self.latest.lock() {
            Ok(mut slot) => *slot = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }

    /// The most recent snapshot
    pub fn latest(&self) -> Arc<CollectionSnapshot> {
        match self.latest.lock() {
            Ok(slot) => Arc::clone(&slot),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }
}
