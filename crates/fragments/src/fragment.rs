//! The Fragment entity: validated metadata plus the operations that persist it.
//!
//! A fragment's metadata and blob are written by separate calls. `set_data`
//! writes the blob and refreshes `size`/`updated` in memory; `save` writes the
//! metadata. Between the two calls the stored pair is inconsistent, and a
//! concurrent writer to the same key may interleave its own pair.

use bytes::Bytes;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{FragmentError, Result};
use crate::media::{self, MediaType, SUPPORTED_TYPES};
use crate::store::{FragmentList, FragmentStore};

/// Construction input for [`Fragment::new`].
///
/// Only `owner_id` and `content_type` are required; everything else defaults
/// (fresh UUID, current time, zero size).
#[derive(Debug, Clone, Default)]
pub struct NewFragment {
    pub owner_id: String,
    pub content_type: String,
    pub id: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    pub size: u64,
}

impl NewFragment {
    pub fn new(owner_id: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            content_type: content_type.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_created(mut self, created: DateTime<Utc>) -> Self {
        self.created = Some(created);
        self
    }

    pub fn with_updated(mut self, updated: DateTime<Utc>) -> Self {
        self.updated = Some(updated);
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }
}

/// Fragment metadata.
///
/// Serialised with the field names `id, ownerId, created, updated, type, size`;
/// timestamps as RFC-1123 strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "FragmentRecord")]
pub struct Fragment {
    id: String,
    owner_id: String,
    #[serde(with = "rfc1123")]
    created: DateTime<Utc>,
    #[serde(with = "rfc1123")]
    updated: DateTime<Utc>,
    #[serde(rename = "type")]
    content_type: String,
    size: u64,
    #[serde(skip)]
    media: Option<MediaType>,
}

/// Wire shape, validated into a [`Fragment`] on deserialisation.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FragmentRecord {
    id: String,
    owner_id: String,
    #[serde(with = "rfc1123")]
    created: DateTime<Utc>,
    #[serde(with = "rfc1123")]
    updated: DateTime<Utc>,
    #[serde(rename = "type")]
    content_type: String,
    size: u64,
}

impl TryFrom<FragmentRecord> for Fragment {
    type Error = FragmentError;

    fn try_from(record: FragmentRecord) -> Result<Self> {
        Fragment::new(NewFragment {
            owner_id: record.owner_id,
            content_type: record.content_type,
            id: Some(record.id),
            created: Some(record.created),
            updated: Some(record.updated),
            size: record.size,
        })
    }
}

// Timestamps carry whole seconds so they survive the RFC-1123 round trip.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

impl Fragment {
    /// Validate input and build a fragment.
    pub fn new(input: NewFragment) -> Result<Self> {
        let id = input.id.unwrap_or_else(|| Uuid::new_v4().to_string());
        if input.owner_id.is_empty() || id.is_empty() {
            return Err(FragmentError::Validation(format!(
                "ownerId and id strings are required, got ownerId={:?}, id={:?}",
                input.owner_id, id
            )));
        }

        if input.content_type.trim().is_empty() {
            return Err(FragmentError::Validation("type string is required".into()));
        }
        let media = MediaType::parse(&input.content_type)?;
        if !SUPPORTED_TYPES.contains(&media.essence()) {
            return Err(FragmentError::Validation(format!(
                "this type is not supported, got type={}",
                input.content_type
            )));
        }

        let stamp = now();
        let created = input.created.unwrap_or(stamp);
        let updated = input.updated.unwrap_or(stamp).max(created);

        Ok(Self {
            id,
            owner_id: input.owner_id,
            created,
            updated,
            content_type: input.content_type,
            size: input.size,
            media: Some(media),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn updated(&self) -> DateTime<Utc> {
        self.updated
    }

    /// The full declared type, parameters included.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// The declared type without parameters: `text/html; charset=utf-8` -> `text/html`.
    pub fn mime_type(&self) -> &str {
        match &self.media {
            Some(media) => media.essence(),
            None => self.content_type.split(';').next().unwrap_or_default().trim(),
        }
    }

    pub fn is_text(&self) -> bool {
        self.mime_type().starts_with("text/")
    }

    pub fn is_image(&self) -> bool {
        self.media.as_ref().is_some_and(MediaType::is_image)
    }

    /// Types this fragment can be converted to.
    pub fn formats(&self) -> &'static [&'static str] {
        media::formats(self.mime_type())
    }

    /// See [`media::is_supported_type`].
    pub fn is_supported_type(value: &str) -> bool {
        media::is_supported_type(value)
    }

    fn touch(&mut self) {
        self.updated = now().max(self.created);
    }

    /// All fragments for an owner, as ids or full records.
    pub async fn by_user(
        store: &dyn FragmentStore,
        owner_id: &str,
        expand: bool,
    ) -> Result<FragmentList> {
        store.list_fragments(owner_id, expand).await
    }

    /// A single fragment's metadata.
    pub async fn by_id(store: &dyn FragmentStore, owner_id: &str, id: &str) -> Result<Fragment> {
        store
            .read_fragment(owner_id, id)
            .await?
            .ok_or_else(|| FragmentError::not_found(id))
    }

    /// Remove a fragment's metadata and blob.
    pub async fn delete(store: &dyn FragmentStore, owner_id: &str, id: &str) -> Result<()> {
        store.delete_fragment(owner_id, id).await
    }

    /// Refresh `updated` and persist the metadata.
    pub async fn save(&mut self, store: &dyn FragmentStore) -> Result<()> {
        self.touch();
        store.write_fragment(self).await
    }

    /// Fetch the blob. A missing blob is reported as `NotFound`.
    pub async fn get_data(&self, store: &dyn FragmentStore) -> Result<Bytes> {
        store
            .read_fragment_data(&self.owner_id, &self.id)
            .await?
            .ok_or_else(|| FragmentError::not_found(&self.id))
    }

    /// Write a new blob and refresh `size`/`updated`. Does not persist metadata.
    pub async fn set_data(&mut self, store: &dyn FragmentStore, data: Bytes) -> Result<()> {
        if data.is_empty() {
            return Err(FragmentError::Validation("data is required".into()));
        }
        store
            .write_fragment_data(&self.owner_id, &self.id, data.clone())
            .await?;
        self.size = data.len() as u64;
        self.touch();
        Ok(())
    }
}

/// RFC-1123 timestamps (`Tue, 15 Nov 1994 08:12:31 GMT`).
mod rfc1123 {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&value.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}
