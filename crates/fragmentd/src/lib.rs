//! fragmentd: the HTTP face of the `fragments` crate.
//!
//! The binary in `main.rs` wires configuration, logging and the store
//! together; the pieces live here so integration tests can drive the
//! router directly.

pub mod auth;
pub mod config;
pub mod response;
pub mod telemetry;
pub mod web;

pub use auth::{owner_id, Owner, Users};
pub use config::{ConfigError, ConfigSources, ServerConfig};
pub use web::{router, AppState};
