//! In-memory emergency store.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::domain::{BlockchainRef, EmergencyRecord, StorageError};
use crate::ports::EmergencyStore;

#[derive(Default)]
struct StoreInner {
    by_id: HashMap<String, EmergencyRecord>,
    by_ref: HashMap<BlockchainRef, String>,
}

/// Emergency store backed by hash maps.
///
/// Upserts are idempotent by emergency id; records are also indexed by
/// their chain location.
#[derive(Default)]
pub struct InMemoryEmergencyStore {
    inner: RwLock<StoreInner>,
}

impl InMemoryEmergencyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored emergencies.
    pub fn len(&self) -> usize {
        self.inner.read().by_id.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record by emergency id.
    pub fn get(&self, emergency_id: &str) -> Option<EmergencyRecord> {
        self.inner.read().by_id.get(emergency_id).cloned()
    }
}

#[async_trait]
impl EmergencyStore for InMemoryEmergencyStore {
    async fn upsert_emergency(&self, record: &EmergencyRecord) -> Result<(), StorageError> {
        let mut inner = self.inner.write();
        let id = record.payload.emergency_id.clone();

        if let Some(previous) = inner.by_id.get(&id).and_then(|r| r.blockchain_ref) {
            if Some(previous) != record.blockchain_ref {
                inner.by_ref.remove(&previous);
            }
        }
        if let Some(r) = record.blockchain_ref {
            inner.by_ref.insert(r, id.clone());
        }
        inner.by_id.insert(id, record.clone());
        Ok(())
    }

    async fn find_by_blockchain_ref(
        &self,
        blockchain_ref: &BlockchainRef,
    ) -> Result<Option<EmergencyRecord>, StorageError> {
        let inner = self.inner.read();
        Ok(inner
            .by_ref
            .get(blockchain_ref)
            .and_then(|id| inner.by_id.get(id))
            .cloned())
    }
}
