//! HTTP routes for fragments.
//!
//! Everything under `/v1` requires Basic auth; the authenticated owner scopes
//! every lookup, so one user can never address another user's fragments.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{rejection::BytesRejection, DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use bytes::Bytes;
use fragments::{FragmentList, Fragments};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::auth::{Owner, Users};
use crate::response::{self, ApiError};

/// Shared state for web handlers
#[derive(Clone)]
pub struct AppState {
    pub fragments: Fragments,
    pub users: Arc<Users>,
}

impl AppState {
    pub fn new(fragments: Fragments, users: Users) -> Self {
        Self {
            fragments,
            users: Arc::new(users),
        }
    }
}

pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/v1/fragments", get(list_fragments).post(create_fragment))
        .route(
            "/v1/fragments/{id}",
            get(get_fragment).put(update_fragment).delete(delete_fragment),
        )
        .route("/v1/fragments/{id}/info", get(fragment_info))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Response {
    let mut response = response::ok(json!({
        "version": env!("CARGO_PKG_VERSION"),
    }))
    .into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-cache"),
    );
    response
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

#[derive(Debug, Deserialize)]
struct ListParams {
    expand: Option<String>,
}

async fn list_fragments(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Query(params): Query<ListParams>,
) -> Result<Response, ApiError> {
    let expand = matches!(params.expand.as_deref(), Some("1") | Some("true"));
    let list = state.fragments.list(&owner, expand).await?;
    tracing::debug!(count = list.len(), expand, "listed fragments");

    let fragments = match list {
        FragmentList::Ids(ids) => json!(ids),
        FragmentList::Expanded(records) => json!(records),
    };
    Ok(response::ok(json!({ "fragments": fragments })).into_response())
}

fn content_type(headers: &HeaderMap) -> &str {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

async fn create_fragment(
    State(state): State<AppState>,
    Owner(owner): Owner,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, ApiError> {
    let body = body?;
    let fragment = state
        .fragments
        .create(&owner, content_type(&headers), body)
        .await?;

    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");
    let location = format!("http://{host}/v1/fragments/{}", fragment.id());

    let mut response = (
        StatusCode::CREATED,
        response::ok(json!({ "fragment": fragment })),
    )
        .into_response();
    if let Ok(value) = header::HeaderValue::from_str(&location) {
        response.headers_mut().insert(header::LOCATION, value);
    }
    Ok(response)
}

/// `GET /v1/fragments/{id}` serves the stored bytes; `{id}.{ext}` converts them.
async fn get_fragment(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(raw): Path<String>,
) -> Result<Response, ApiError> {
    let (data, content_type) = match raw.rsplit_once('.') {
        Some((id, extension)) => {
            let converted = state
                .fragments
                .get_converted(&owner, id, extension)
                .await?;
            (converted.data, converted.content_type)
        }
        None => {
            let (fragment, data) = state.fragments.get(&owner, &raw).await?;
            (data, fragment.content_type().to_string())
        }
    };

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(data))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()))
}

async fn fragment_info(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let fragment = state.fragments.info(&owner, &id).await?;
    Ok(response::ok(json!({ "fragment": fragment })).into_response())
}

async fn update_fragment(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, ApiError> {
    let body = body?;
    let fragment = state
        .fragments
        .update(&owner, &id, body, content_type(&headers))
        .await?;
    Ok(response::ok(json!({ "fragment": fragment })).into_response())
}

async fn delete_fragment(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    state.fragments.remove(&owner, &id).await?;
    Ok(response::ok(serde_json::Value::Null).into_response())
}
