//! MemoryStore: process-local fragment storage.
//!
//! Metadata and blobs are kept in two separate maps, mirroring the durable
//! backend's split. Each owner keeps its own insertion order so listings come
//! back in creation order.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use super::{validate_key, validate_owner, FragmentList, FragmentStore};
use crate::error::{FragmentError, Result};
use crate::fragment::Fragment;

#[derive(Debug, Default)]
struct OwnerSpace {
    order: Vec<String>,
    records: HashMap<String, Fragment>,
}

#[derive(Debug, Default)]
struct Inner {
    metadata: HashMap<String, OwnerSpace>,
    blobs: HashMap<(String, String), Bytes>,
}

/// In-memory fragment store. Clone the `Arc` around it, not the store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FragmentStore for MemoryStore {
    async fn write_fragment(&self, fragment: &Fragment) -> Result<()> {
        validate_key(fragment.owner_id(), fragment.id())?;

        let mut inner = self.inner.write().await;
        let space = inner
            .metadata
            .entry(fragment.owner_id().to_string())
            .or_default();
        if space
            .records
            .insert(fragment.id().to_string(), fragment.clone())
            .is_none()
        {
            space.order.push(fragment.id().to_string());
        }
        Ok(())
    }

    async fn read_fragment(&self, owner_id: &str, id: &str) -> Result<Option<Fragment>> {
        validate_key(owner_id, id)?;

        let inner = self.inner.read().await;
        Ok(inner
            .metadata
            .get(owner_id)
            .and_then(|space| space.records.get(id))
            .cloned())
    }

    async fn write_fragment_data(&self, owner_id: &str, id: &str, data: Bytes) -> Result<()> {
        validate_key(owner_id, id)?;

        let mut inner = self.inner.write().await;
        inner
            .blobs
            .insert((owner_id.to_string(), id.to_string()), data);
        Ok(())
    }

    async fn read_fragment_data(&self, owner_id: &str, id: &str) -> Result<Option<Bytes>> {
        validate_key(owner_id, id)?;

        let inner = self.inner.read().await;
        Ok(inner
            .blobs
            .get(&(owner_id.to_string(), id.to_string()))
            .cloned())
    }

    async fn list_fragments(&self, owner_id: &str, expand: bool) -> Result<FragmentList> {
        validate_owner(owner_id)?;

        let inner = self.inner.read().await;
        let Some(space) = inner.metadata.get(owner_id) else {
            return Ok(if expand {
                FragmentList::Expanded(Vec::new())
            } else {
                FragmentList::Ids(Vec::new())
            });
        };

        if expand {
            Ok(FragmentList::Expanded(
                space
                    .order
                    .iter()
                    .filter_map(|id| space.records.get(id).cloned())
                    .collect(),
            ))
        } else {
            Ok(FragmentList::Ids(space.order.clone()))
        }
    }

    async fn delete_fragment(&self, owner_id: &str, id: &str) -> Result<()> {
        validate_key(owner_id, id)?;

        let mut inner = self.inner.write().await;
        let removed = inner
            .metadata
            .get_mut(owner_id)
            .and_then(|space| {
                let record = space.records.remove(id)?;
                space.order.retain(|existing| existing != id);
                Some(record)
            })
            .is_some();
        if !removed {
            return Err(FragmentError::not_found(id));
        }
        inner.blobs.remove(&(owner_id.to_string(), id.to_string()));

        if inner
            .metadata
            .get(owner_id)
            .is_some_and(|space| space.records.is_empty())
        {
            inner.metadata.remove(owner_id);
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
