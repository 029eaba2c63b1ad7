//! Fragments: small owner-scoped text and image snippets.
//!
//! Each fragment is a metadata record plus a blob of bytes, both keyed by
//! `(owner_id, id)`. Storage is pluggable:
//! - **MemoryStore**: process-local, for tests and development
//! - **RemoteStore**: metadata in an HTTP table service, blobs in an object store
//!
//! Stored data can be served as-is or converted to another representation
//! (markdown to html, html to text, between image formats).
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use fragments::{Fragments, MemoryStore};
//!
//! # async fn demo() -> fragments::Result<()> {
//! let service = Fragments::new(Arc::new(MemoryStore::new()));
//!
//! let fragment = service
//!     .create("owner", "text/markdown", Bytes::from_static(b"# Hello"))
//!     .await?;
//! println!("Stored {} ({} bytes)", fragment.id(), fragment.size());
//!
//! let html = service.get_converted("owner", fragment.id(), "html").await?;
//! println!("{}", String::from_utf8_lossy(&html.data));
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! [`StoreConfig::from_env`] reads `FRAGMENTS_BACKEND` (`memory` or `remote`)
//! and the remote settings; [`open_store`] turns a config into a backend.

pub mod config;
pub mod convert;
pub mod error;
pub mod fragment;
pub mod media;
pub mod service;
pub mod store;

// Re-exports for convenience
pub use config::{BackendKind, RemoteConfig, StoreConfig};
pub use convert::Converted;
pub use error::{ErrorKind, FragmentError, Result};
pub use fragment::{Fragment, NewFragment};
pub use service::Fragments;
pub use store::{open_store, FragmentList, FragmentStore, MemoryStore, RemoteStore};
