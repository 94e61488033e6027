//! In-memory object store
//!
//! Lock-sharded map, safe for concurrent `put` from many workers.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

use crate::domain::{ContentId, MetaObject, ObjectStore};
use crate::{Result, StorageError};

/// Concurrent in-memory store keyed by content identifier
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<DashMap<ContentId, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all stored identifiers (unordered)
    pub fn ids(&self) -> Vec<ContentId> {
        self.objects.iter().map(|entry| entry.key().clone()).collect()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, object: &MetaObject) -> Result<ContentId> {
        self.objects
            .entry(object.id().clone())
            .or_insert_with(|| object.bytes().to_vec());
        Ok(object.id().clone())
    }

    async fn get(&self, id: &ContentId) -> Result<MetaObject> {
        let bytes = self
            .objects
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StorageError::object_not_found(id))?;
        MetaObject::from_bytes(bytes)
    }

    async fn contains(&self, id: &ContentId) -> Result<bool> {
        Ok(self.objects.contains_key(id))
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.objects.len())
    }
}
