//! Error taxonomy for fragment operations.
//!
//! Every failure the core can produce is a distinct variant so callers
//! (the HTTP layer, tests) can branch on the kind without looking at text.

use thiserror::Error;

/// Errors surfaced by the fragment core.
#[derive(Debug, Error)]
pub enum FragmentError {
    /// Malformed construction input (bad id, empty payload, unparsable type).
    #[error("invalid fragment: {0}")]
    Validation(String),

    /// A storage call received an empty owner id or fragment id.
    #[error("ownerId and id must be non-empty strings, got ownerId={owner_id:?}, id={id:?}")]
    Key { owner_id: String, id: String },

    /// No record exists for the requested key.
    #[error("fragment {id} not found")]
    NotFound { id: String },

    /// The content type is not in the supported-type registry.
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    /// The type is supported, but cannot be rendered as the requested extension.
    #[error("cannot convert {from} to .{extension}")]
    UnsupportedConversion { from: String, extension: String },

    /// An update declared a different type than the stored fragment has.
    #[error("type mismatch: fragment is {stored}, request is {requested}")]
    TypeMismatch { stored: String, requested: String },

    /// The payload claims a convertible type but could not be decoded or encoded.
    #[error("conversion failed: {0}")]
    Conversion(String),

    /// Backend I/O failure, distinct from "not present".
    #[error("storage failure during {op}: {message}")]
    Storage { op: &'static str, message: String },
}

/// Discriminant of [`FragmentError`], handy for logging and status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Key,
    NotFound,
    UnsupportedType,
    UnsupportedConversion,
    TypeMismatch,
    Conversion,
    Storage,
}

impl FragmentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FragmentError::Validation(_) => ErrorKind::Validation,
            FragmentError::Key { .. } => ErrorKind::Key,
            FragmentError::NotFound { .. } => ErrorKind::NotFound,
            FragmentError::UnsupportedType(_) => ErrorKind::UnsupportedType,
            FragmentError::UnsupportedConversion { .. } => ErrorKind::UnsupportedConversion,
            FragmentError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            FragmentError::Conversion(_) => ErrorKind::Conversion,
            FragmentError::Storage { .. } => ErrorKind::Storage,
        }
    }

    pub(crate) fn not_found(id: impl Into<String>) -> Self {
        FragmentError::NotFound { id: id.into() }
    }

    pub(crate) fn storage(op: &'static str, message: impl ToString) -> Self {
        FragmentError::Storage {
            op,
            message: message.to_string(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = FragmentError> = std::result::Result<T, E>;
