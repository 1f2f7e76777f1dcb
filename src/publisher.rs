//! Publisher contract and the in-process record store.
//!
//! The dispatcher is the only caller of a `Publisher`. `RecordStore` keeps the
//! set of currently announced records, which the responder answers from.

use async_trait::async_trait;
use hickory_proto::rr::{LowerName, Record, RecordType};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

use crate::metrics;

/// Announces and retracts records.
///
/// Both operations must be idempotent: publishing an announced record or
/// retracting one that was never announced is a no-op.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Announce a record.
    async fn publish(&self, record: Record);
    /// Retract a previously announced record.
    async fn unpublish(&self, record: Record);
}

#[async_trait]
impl<P: Publisher + ?Sized> Publisher for Arc<P> {
    async fn publish(&self, record: Record) {
        (**self).publish(record).await
    }

    async fn unpublish(&self, record: Record) {
        (**self).unpublish(record).await
    }
}

/// Thread-safe set of published records.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    inner: Arc<RwLock<StoreInner>>,
}

#[derive(Debug, Default)]
struct StoreInner {
    /// (owner, type) -> records with distinct data
    records: HashMap<(LowerName, RecordType), Vec<Record>>,

    /// Incremented on every change.
    serial: u32,
}

impl RecordStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record unless one with the same owner, type and data exists.
    /// Returns whether the store changed.
    pub fn insert(&self, record: Record) -> bool {
        let mut inner = self.inner.write();
        let key = (LowerName::new(record.name()), record.record_type());
        let entry = inner.records.entry(key).or_default();
        if entry.iter().any(|r| r.data() == record.data()) {
            return false;
        }
        entry.push(record);
        inner.serial = inner.serial.wrapping_add(1);
        true
    }

    /// Remove the record with the same owner, type and data. Returns whether
    /// the store changed.
    pub fn remove(&self, record: &Record) -> bool {
        let mut inner = self.inner.write();
        let key = (LowerName::new(record.name()), record.record_type());
        let Some(entry) = inner.records.get_mut(&key) else {
            return false;
        };
        let before = entry.len();
        entry.retain(|r| r.data() != record.data());
        let removed = entry.len() != before;
        if entry.is_empty() {
            inner.records.remove(&key);
        }
        if removed {
            inner.serial = inner.serial.wrapping_add(1);
        }
        removed
    }

    /// Records published under `name` with type `record_type`.
    pub fn lookup(&self, name: &LowerName, record_type: RecordType) -> Vec<Record> {
        let inner = self.inner.read();
        inner
            .records
            .get(&(name.clone(), record_type))
            .cloned()
            .unwrap_or_default()
    }

    /// Whether any record is published under `name`.
    pub fn has_name(&self, name: &LowerName) -> bool {
        let inner = self.inner.read();
        inner.records.keys().any(|(owner, _)| owner == name)
    }

    /// Number of published records.
    pub fn records_count(&self) -> usize {
        self.inner.read().records.values().map(Vec::len).sum()
    }

    /// Number of distinct owner names.
    pub fn names_count(&self) -> usize {
        let inner = self.inner.read();
        let names: HashSet<&LowerName> = inner.records.keys().map(|(owner, _)| owner).collect();
        names.len()
    }

    /// Current change serial.
    pub fn serial(&self) -> u32 {
        self.inner.read().serial
    }

    /// Emit current store metrics.
    pub fn emit_metrics(&self) {
        metrics::record_store_counts(self.records_count(), self.names_count());
    }
}

#[async_trait]
impl Publisher for RecordStore {
    async fn publish(&self, record: Record) {
        let name = record.name().to_string();
        let record_type = record.record_type();
        if self.insert(record) {
            info!(%name, %record_type, "published record");
        } else {
            debug!(%name, %record_type, "record already published");
        }
    }

    async fn unpublish(&self, record: Record) {
        if self.remove(&record) {
            info!(name = %record.name(), record_type = %record.record_type(), "unpublished record");
        } else {
            debug!(name = %record.name(), record_type = %record.record_type(), "record was not published");
        }
    }
}
