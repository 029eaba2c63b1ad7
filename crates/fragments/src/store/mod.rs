//! Storage backends for fragment metadata and blobs.
//!
//! Metadata records and blobs live in logically separate stores but share the
//! compound key `(owner_id, id)`. Two variants implement [`FragmentStore`]:
//!
//! - [`MemoryStore`]: process-local maps, nothing survives a restart.
//! - [`RemoteStore`]: metadata in an HTTP table service, blobs in an
//!   S3-style object store.
//!
//! The variant is picked once at startup from [`StoreConfig`](crate::StoreConfig)
//! via [`open_store`] and handed to the entity layer as `Arc<dyn FragmentStore>`.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;

use crate::config::{BackendKind, StoreConfig};
use crate::error::{FragmentError, Result};
use crate::fragment::Fragment;

pub mod memory;
pub mod remote;

pub use memory::MemoryStore;
pub use remote::RemoteStore;

/// Result of listing an owner's fragments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FragmentList {
    /// Fragment ids only.
    Ids(Vec<String>),
    /// Full metadata records.
    Expanded(Vec<Fragment>),
}

impl FragmentList {
    pub fn len(&self) -> usize {
        match self {
            FragmentList::Ids(ids) => ids.len(),
            FragmentList::Expanded(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The ids in list order, whichever shape the list has.
    pub fn ids(&self) -> Vec<&str> {
        match self {
            FragmentList::Ids(ids) => ids.iter().map(String::as_str).collect(),
            FragmentList::Expanded(records) => records.iter().map(Fragment::id).collect(),
        }
    }
}

/// Trait for fragment storage backends.
///
/// "Not present" is `Ok(None)`, never an error. Key-bearing calls fail with
/// [`FragmentError::Key`] on empty keys. Metadata and blob calls may fail
/// independently; callers must not assume a pair of writes is atomic.
#[async_trait]
pub trait FragmentStore: Send + Sync {
    /// Upsert a metadata record under `(owner_id, id)`.
    async fn write_fragment(&self, fragment: &Fragment) -> Result<()>;

    /// Read a metadata record.
    async fn read_fragment(&self, owner_id: &str, id: &str) -> Result<Option<Fragment>>;

    /// Upsert the blob for a key.
    async fn write_fragment_data(&self, owner_id: &str, id: &str, data: Bytes) -> Result<()>;

    /// Read the blob for a key.
    async fn read_fragment_data(&self, owner_id: &str, id: &str) -> Result<Option<Bytes>>;

    /// List an owner's fragments in insertion order. Unknown owners get an empty list.
    async fn list_fragments(&self, owner_id: &str, expand: bool) -> Result<FragmentList>;

    /// Remove metadata and blob. Fails with `NotFound` if no metadata exists.
    async fn delete_fragment(&self, owner_id: &str, id: &str) -> Result<()>;

    /// Short name for logs.
    fn backend_name(&self) -> &'static str;
}

/// Reject empty keys before touching a backend.
pub(crate) fn validate_key(owner_id: &str, id: &str) -> Result<()> {
    if owner_id.is_empty() || id.is_empty() {
        return Err(FragmentError::Key {
            owner_id: owner_id.to_string(),
            id: id.to_string(),
        });
    }
    Ok(())
}

pub(crate) fn validate_owner(owner_id: &str) -> Result<()> {
    if owner_id.is_empty() {
        return Err(FragmentError::Key {
            owner_id: String::new(),
            id: String::new(),
        });
    }
    Ok(())
}

/// Build the backend selected by `config`.
pub fn open_store(config: &StoreConfig) -> anyhow::Result<Arc<dyn FragmentStore>> {
    let store: Arc<dyn FragmentStore> = match config.backend {
        BackendKind::Memory => Arc::new(MemoryStore::new()),
        BackendKind::Remote => Arc::new(RemoteStore::new(config.remote_config()?)?),
    };
    tracing::info!(backend = store.backend_name(), "fragment store ready");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("owner", "id").is_ok());
        assert!(matches!(
            validate_key("", "id"),
            Err(FragmentError::Key { .. })
        ));
        assert!(matches!(
            validate_key("owner", ""),
            Err(FragmentError::Key { .. })
        ));
    }

    #[test]
    fn test_fragment_list_serializes_as_array() {
        let list = FragmentList::Ids(vec!["a".into(), "b".into()]);
        assert_eq!(serde_json::to_string(&list).unwrap(), r#"["a","b"]"#);
        assert_eq!(list.ids(), vec!["a", "b"]);
        assert!(!list.is_empty());
        assert!(FragmentList::Expanded(vec![]).is_empty());
    }

    #[test]
    fn test_open_memory_store() {
        let store = open_store(&StoreConfig::default()).unwrap();
        assert_eq!(store.backend_name(), "memory");
    }

    #[test]
    fn test_open_remote_without_endpoints_fails() {
        let config = StoreConfig {
            backend: BackendKind::Remote,
            ..StoreConfig::default()
        };
        assert!(open_store(&config).is_err());
    }
}
