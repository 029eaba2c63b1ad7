//! RemoteStore: durable fragment storage over HTTP.
//!
//! Metadata goes to a JSON table service, blobs to an S3-style object store:
//!
//! ```text
//! {table_url}/{table}/items/{owner}          GET     -> [record, ...] (insertion order)
//! {table_url}/{table}/items/{owner}/{id}     PUT/GET/DELETE  JSON record
//! {object_url}/{bucket}/{owner}/{id}         PUT/GET/DELETE  raw bytes
//! ```
//!
//! A 404 from either service means "not present". Anything else that is not a
//! success, including a request that exceeds the configured timeout, is a
//! `Storage` error. The two services fail independently.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};

use super::{validate_key, validate_owner, FragmentList, FragmentStore};
use crate::config::RemoteConfig;
use crate::error::{FragmentError, Result};
use crate::fragment::Fragment;

/// Fragment store backed by a remote table service and object store.
#[derive(Debug, Clone)]
pub struct RemoteStore {
    http: Client,
    table_base: Url,
    table: String,
    object_base: Url,
    bucket: String,
}

impl RemoteStore {
    /// Build a store from validated connection parameters.
    pub fn new(config: &RemoteConfig) -> anyhow::Result<Self> {
        use anyhow::Context;

        let table_base = parse_base(&config.table_url).context("invalid table_url")?;
        let object_base = parse_base(&config.object_url).context("invalid object_url")?;
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            table_base,
            table: config.table.clone(),
            object_base,
            bucket: config.bucket.clone(),
        })
    }

    fn owner_url(&self, owner_id: &str) -> Url {
        with_segments(&self.table_base, &[self.table.as_str(), "items", owner_id])
    }

    fn record_url(&self, owner_id: &str, id: &str) -> Url {
        with_segments(&self.table_base, &[self.table.as_str(), "items", owner_id, id])
    }

    fn object_url(&self, owner_id: &str, id: &str) -> Url {
        with_segments(&self.object_base, &[self.bucket.as_str(), owner_id, id])
    }
}

fn parse_base(raw: &str) -> anyhow::Result<Url> {
    let url = Url::parse(raw)?;
    if url.cannot_be_a_base() {
        anyhow::bail!("{raw} cannot be used as a base URL");
    }
    Ok(url)
}

// Segments are percent-encoded by the url crate.
fn with_segments(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

/// Send a request; 404 becomes `None`, other failures become `Storage`.
async fn send(op: &'static str, request: RequestBuilder) -> Result<Option<Response>> {
    let response = request
        .send()
        .await
        .map_err(|e| FragmentError::storage(op, e))?;
    if response.status() == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    let response = response
        .error_for_status()
        .map_err(|e| FragmentError::storage(op, e))?;
    Ok(Some(response))
}

#[async_trait]
impl FragmentStore for RemoteStore {
    async fn write_fragment(&self, fragment: &Fragment) -> Result<()> {
        validate_key(fragment.owner_id(), fragment.id())?;

        let url = self.record_url(fragment.owner_id(), fragment.id());
        tracing::debug!(%url, "writing fragment metadata");
        send("write_fragment", self.http.put(url).json(fragment))
            .await?
            .ok_or_else(|| FragmentError::storage("write_fragment", "table not found"))?;
        Ok(())
    }

    async fn read_fragment(&self, owner_id: &str, id: &str) -> Result<Option<Fragment>> {
        validate_key(owner_id, id)?;

        let url = self.record_url(owner_id, id);
        let Some(response) = send("read_fragment", self.http.get(url)).await? else {
            return Ok(None);
        };
        let fragment = response
            .json::<Fragment>()
            .await
            .map_err(|e| FragmentError::storage("read_fragment", e))?;
        Ok(Some(fragment))
    }

    async fn write_fragment_data(&self, owner_id: &str, id: &str, data: Bytes) -> Result<()> {
        validate_key(owner_id, id)?;

        let url = self.object_url(owner_id, id);
        tracing::debug!(%url, bytes = data.len(), "writing fragment data");
        send("write_fragment_data", self.http.put(url).body(data))
            .await?
            .ok_or_else(|| FragmentError::storage("write_fragment_data", "bucket not found"))?;
        Ok(())
    }

    async fn read_fragment_data(&self, owner_id: &str, id: &str) -> Result<Option<Bytes>> {
        validate_key(owner_id, id)?;

        let url = self.object_url(owner_id, id);
        let Some(response) = send("read_fragment_data", self.http.get(url)).await? else {
            return Ok(None);
        };
        let data = response
            .bytes()
            .await
            .map_err(|e| FragmentError::storage("read_fragment_data", e))?;
        Ok(Some(data))
    }

    async fn list_fragments(&self, owner_id: &str, expand: bool) -> Result<FragmentList> {
        validate_owner(owner_id)?;

        let url = self.owner_url(owner_id);
        let records = match send("list_fragments", self.http.get(url)).await? {
            Some(response) => response
                .json::<Vec<Fragment>>()
                .await
                .map_err(|e| FragmentError::storage("list_fragments", e))?,
            None => Vec::new(),
        };

        Ok(if expand {
            FragmentList::Expanded(records)
        } else {
            FragmentList::Ids(records.iter().map(|f| f.id().to_string()).collect())
        })
    }

    async fn delete_fragment(&self, owner_id: &str, id: &str) -> Result<()> {
        validate_key(owner_id, id)?;

        // Metadata goes first. A failed blob removal after this point leaves an
        // unreferenced blob, never a record pointing at nothing.
        send("delete_fragment", self.http.delete(self.record_url(owner_id, id)))
            .await?
            .ok_or_else(|| FragmentError::not_found(id))?;

        let object = self.object_url(owner_id, id);
        match send("delete_fragment_data", self.http.delete(object.clone())).await {
            Ok(Some(_)) => Ok(()),
            Ok(None) => {
                tracing::debug!(%object, "no blob to delete");
                Ok(())
            }
            Err(e) => {
                tracing::error!(%object, error = %e, "metadata deleted but blob removal failed");
                Err(e)
            }
        }
    }

    fn backend_name(&self) -> &'static str {
        "remote"
    }
}
