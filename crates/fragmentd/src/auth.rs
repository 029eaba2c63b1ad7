//! HTTP Basic authentication against the configured user table.
//!
//! Owner ids are the hex SHA-256 of the user's email, so stored records never
//! carry the address itself.

use std::collections::{BTreeMap, HashMap};

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::response::ApiError;
use crate::web::AppState;

/// Hash an email into an owner id.
pub fn owner_id(email: &str) -> String {
    hex::encode(Sha256::digest(email.as_bytes()))
}

/// Known users, email to password.
#[derive(Debug, Clone, Default)]
pub struct Users {
    passwords: HashMap<String, String>,
}

impl Users {
    pub fn from_config(users: &BTreeMap<String, String>) -> Self {
        Self::from_pairs(users.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            passwords: pairs
                .into_iter()
                .map(|(email, password)| (email.to_string(), password.to_string()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.passwords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passwords.is_empty()
    }

    /// The owner id for valid credentials.
    ///
    /// Passwords are compared as SHA-256 digests in constant time, so the
    /// comparison leaks neither length nor matching prefix.
    pub fn authenticate(&self, email: &str, password: &str) -> Option<String> {
        let expected = self.passwords.get(email)?;
        passwords_match(expected, password).then(|| owner_id(email))
    }
}

fn passwords_match(expected: &str, supplied: &str) -> bool {
    let expected = Sha256::digest(expected.as_bytes());
    let supplied = Sha256::digest(supplied.as_bytes());
    expected.as_slice().ct_eq(supplied.as_slice()).into()
}

/// Decode an `Authorization: Basic ...` value into `(user, password)`.
pub fn parse_basic(value: &str) -> Option<(String, String)> {
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

/// The authenticated caller's owner id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner(pub String);

impl FromRequestParts<AppState> for Owner {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let credentials = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_basic);

        let Some((email, password)) = credentials else {
            tracing::debug!("missing or malformed credentials");
            return Err(ApiError::Unauthorized);
        };

        match state.users.authenticate(&email, &password) {
            Some(owner) => Ok(Owner(owner)),
            None => {
                tracing::warn!("authentication failed");
                Err(ApiError::Unauthorized)
            }
        }
    }
}
