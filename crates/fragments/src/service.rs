//! Fragments: the operations the request layer calls.
//!
//! Each call is one logical operation against the injected store. Writes are
//! last-writer-wins per `(owner_id, id)`: two concurrent updates to the same
//! fragment may interleave their blob and metadata writes, and nothing here
//! detects that.

use std::sync::Arc;

use bytes::Bytes;

use crate::convert::{self, Converted};
use crate::error::{FragmentError, Result};
use crate::fragment::{Fragment, NewFragment};
use crate::store::{FragmentList, FragmentStore};

/// Service facade over a fragment store.
#[derive(Clone)]
pub struct Fragments {
    store: Arc<dyn FragmentStore>,
}

impl std::fmt::Debug for Fragments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fragments")
            .field("backend", &self.store.backend_name())
            .finish()
    }
}

impl Fragments {
    pub fn new(store: Arc<dyn FragmentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &dyn FragmentStore {
        self.store.as_ref()
    }

    /// Create a fragment with its data.
    ///
    /// The blob is written before the metadata, so a failure in between leaves
    /// an unreferenced blob rather than a record without data.
    #[tracing::instrument(skip(self, data), fields(bytes = data.len()))]
    pub async fn create(&self, owner_id: &str, content_type: &str, data: Bytes) -> Result<Fragment> {
        if !Fragment::is_supported_type(content_type) {
            return Err(FragmentError::UnsupportedType(content_type.to_string()));
        }
        if data.is_empty() {
            return Err(FragmentError::Validation("data is required".into()));
        }

        let mut fragment = Fragment::new(NewFragment::new(owner_id, content_type))?;
        let data = convert::normalize_image(content_type, data)?;
        fragment.set_data(self.store(), data).await?;
        fragment.save(self.store()).await?;

        tracing::info!(id = fragment.id(), size = fragment.size(), "fragment created");
        Ok(fragment)
    }

    /// Metadata plus the stored bytes.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, owner_id: &str, id: &str) -> Result<(Fragment, Bytes)> {
        let fragment = Fragment::by_id(self.store(), owner_id, id).await?;
        let data = fragment.get_data(self.store()).await?;
        Ok((fragment, data))
    }

    /// Stored bytes rendered as `extension`.
    #[tracing::instrument(skip(self))]
    pub async fn get_converted(&self, owner_id: &str, id: &str, extension: &str) -> Result<Converted> {
        let (fragment, data) = self.get(owner_id, id).await?;
        convert::convert(data, fragment.content_type(), Some(extension))
    }

    /// Metadata only.
    #[tracing::instrument(skip(self))]
    pub async fn info(&self, owner_id: &str, id: &str) -> Result<Fragment> {
        Fragment::by_id(self.store(), owner_id, id).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn list(&self, owner_id: &str, expand: bool) -> Result<FragmentList> {
        Fragment::by_user(self.store(), owner_id, expand).await
    }

    /// Replace a fragment's data. The declared type must equal the stored type.
    #[tracing::instrument(skip(self, data), fields(bytes = data.len()))]
    pub async fn update(
        &self,
        owner_id: &str,
        id: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<Fragment> {
        let mut fragment = Fragment::by_id(self.store(), owner_id, id).await?;
        if fragment.content_type() != content_type {
            return Err(FragmentError::TypeMismatch {
                stored: fragment.content_type().to_string(),
                requested: content_type.to_string(),
            });
        }
        if data.is_empty() {
            return Err(FragmentError::Validation("data is required".into()));
        }

        let data = convert::normalize_image(content_type, data)?;
        fragment.set_data(self.store(), data).await?;
        fragment.save(self.store()).await?;

        tracing::info!(size = fragment.size(), "fragment updated");
        Ok(fragment)
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove(&self, owner_id: &str, id: &str) -> Result<()> {
        Fragment::delete(self.store(), owner_id, id).await?;
        tracing::info!("fragment removed");
        Ok(())
    }
}
