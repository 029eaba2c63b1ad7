//! Storage configuration with environment variable and file-based loading.
//!
//! Environment variables:
//! - `FRAGMENTS_BACKEND`: `memory` (default) or `remote`
//! - `FRAGMENTS_TABLE_URL`: base URL of the metadata table service
//! - `FRAGMENTS_TABLE`: table name (default `fragments`)
//! - `FRAGMENTS_OBJECT_URL`: base URL of the object store
//! - `FRAGMENTS_BUCKET`: bucket name (default `fragments`)
//! - `FRAGMENTS_TIMEOUT_MS`: per-request timeout for remote calls

use std::env;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Which backend variant to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Memory,
    Remote,
}

impl std::str::FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(BackendKind::Memory),
            "remote" => Ok(BackendKind::Remote),
            other => bail!("unknown storage backend: {other}"),
        }
    }
}

/// Connection parameters for the durable backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the metadata table service.
    pub table_url: String,

    /// Table holding fragment metadata.
    #[serde(default = "default_table")]
    pub table: String,

    /// Base URL of the object store.
    pub object_url: String,

    /// Bucket holding fragment blobs.
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl RemoteConfig {
    pub fn new(table_url: impl Into<String>, object_url: impl Into<String>) -> Self {
        Self {
            table_url: table_url.into(),
            table: default_table(),
            object_url: object_url.into(),
            bucket: default_bucket(),
            timeout_ms: default_timeout_ms(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_table() -> String {
    "fragments".to_string()
}

fn default_bucket() -> String {
    "fragments".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

/// Storage configuration: the backend choice plus remote parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: BackendKind,

    /// Required when `backend = "remote"`.
    #[serde(default)]
    pub remote: Option<RemoteConfig>,
}

impl StoreConfig {
    /// An in-memory configuration.
    pub fn memory() -> Self {
        Self::default()
    }

    /// A remote configuration.
    pub fn remote(remote: RemoteConfig) -> Self {
        Self {
            backend: BackendKind::Remote,
            remote: Some(remote),
        }
    }

    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Overlay any `FRAGMENTS_*` storage variables onto this config.
    ///
    /// Returns the names of the variables that were applied.
    pub fn apply_env(&mut self) -> Result<Vec<&'static str>> {
        let mut applied = Vec::new();

        if let Ok(v) = env::var("FRAGMENTS_BACKEND") {
            self.backend = v.parse()?;
            applied.push("FRAGMENTS_BACKEND");
        }

        let table_url = env::var("FRAGMENTS_TABLE_URL").ok();
        let object_url = env::var("FRAGMENTS_OBJECT_URL").ok();
        if table_url.is_some() || object_url.is_some() {
            let remote = self
                .remote
                .get_or_insert_with(|| RemoteConfig::new(String::new(), String::new()));
            if let Some(v) = table_url {
                remote.table_url = v;
                applied.push("FRAGMENTS_TABLE_URL");
            }
            if let Some(v) = object_url {
                remote.object_url = v;
                applied.push("FRAGMENTS_OBJECT_URL");
            }
        }

        if let Some(remote) = self.remote.as_mut() {
            if let Ok(v) = env::var("FRAGMENTS_TABLE") {
                remote.table = v;
                applied.push("FRAGMENTS_TABLE");
            }
            if let Ok(v) = env::var("FRAGMENTS_BUCKET") {
                remote.bucket = v;
                applied.push("FRAGMENTS_BUCKET");
            }
            if let Ok(v) = env::var("FRAGMENTS_TIMEOUT_MS") {
                remote.timeout_ms = v
                    .parse()
                    .with_context(|| format!("invalid FRAGMENTS_TIMEOUT_MS: {v}"))?;
                applied.push("FRAGMENTS_TIMEOUT_MS");
            }
        }

        Ok(applied)
    }

    /// Load configuration from a TOML file's `[store]` section.
    ///
    /// ```toml
    /// [store]
    /// backend = "remote"
    ///
    /// [store.remote]
    /// table_url = "http://127.0.0.1:8000"
    /// object_url = "http://127.0.0.1:9000"
    /// ```
    ///
    /// Falls back to the environment when the section is missing.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        let table: toml::Table = contents
            .parse()
            .with_context(|| format!("failed to parse TOML: {}", path.display()))?;

        match table.get("store") {
            Some(section) => section
                .clone()
                .try_into::<StoreConfig>()
                .context("failed to parse [store] section"),
            None => Self::from_env(),
        }
    }

    /// The remote parameters, validated for use.
    pub fn remote_config(&self) -> Result<&RemoteConfig> {
        let Some(remote) = self.remote.as_ref() else {
            bail!("remote backend selected but no [store.remote] settings given");
        };
        if remote.table_url.is_empty() {
            bail!("remote backend requires table_url");
        }
        if remote.object_url.is_empty() {
            bail!("remote backend requires object_url");
        }
        if remote.table.is_empty() || remote.bucket.is_empty() {
            bail!("remote backend requires non-empty table and bucket names");
        }
        Ok(remote)
    }
}
