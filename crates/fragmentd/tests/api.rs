//! HTTP tests driving the router in-process.
//!
//! These tests verify:
//! - Basic auth gates every /v1 route
//! - Create/read/update/delete round trips through the JSON envelopes
//! - Error kinds map to the expected statuses
//! - Owners are isolated from each other

use std::sync::Arc;

use anyhow::Result;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use fragmentd::{owner_id, router, AppState, Users};
use fragments::{Fragments, MemoryStore};
use serde_json::Value;
use tower::ServiceExt;

const USER1: (&str, &str) = ("user1@email.com", "password1");
const USER2: (&str, &str) = ("user2@email.com", "password2");

fn app_with_limit(max_body_bytes: usize) -> Router {
    let state = AppState::new(
        Fragments::new(Arc::new(MemoryStore::new())),
        Users::from_pairs([USER1, USER2]),
    );
    router(state, max_body_bytes)
}

fn app() -> Router {
    app_with_limit(5 * 1024 * 1024)
}

fn basic((email, password): (&str, &str)) -> String {
    format!("Basic {}", STANDARD.encode(format!("{email}:{password}")))
}

fn request(method: &str, uri: &str, user: Option<(&str, &str)>) -> axum::http::request::Builder {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::HOST, "localhost:8080");
    match user {
        Some(user) => builder.header(header::AUTHORIZATION, basic(user)),
        None => builder,
    }
}

async fn send(app: &Router, req: Request<Body>) -> Result<Response> {
    Ok(app.clone().oneshot(req).await?)
}

async fn body_bytes(response: Response) -> Result<Vec<u8>> {
    Ok(to_bytes(response.into_body(), usize::MAX).await?.to_vec())
}

async fn body_json(response: Response) -> Result<Value> {
    Ok(serde_json::from_slice(&body_bytes(response).await?)?)
}

/// POST a fragment as `user` and return its id.
async fn create(app: &Router, user: (&str, &str), content_type: &str, body: &str) -> Result<String> {
    let req = request("POST", "/v1/fragments", Some(user))
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body.to_string()))?;
    let response = send(app, req).await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await?;
    Ok(json["fragment"]["id"]
        .as_str()
        .expect("fragment id in response")
        .to_string())
}

#[tokio::test]
async fn test_health_check() -> Result<()> {
    let app = app();
    let response = send(&app, request("GET", "/", None).body(Body::empty())?).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
    let json = body_json(response).await?;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    Ok(())
}

#[tokio::test]
async fn test_unknown_route_is_404_envelope() -> Result<()> {
    let app = app();
    let response = send(&app, request("GET", "/no-such-route", None).body(Body::empty())?).await?;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await?;
    assert_eq!(json["status"], "error");
    assert_eq!(json["error"]["code"], 404);
    Ok(())
}

#[tokio::test]
async fn test_requires_credentials() -> Result<()> {
    let app = app();

    let response = send(&app, request("GET", "/v1/fragments", None).body(Body::empty())?).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));

    let response = send(
        &app,
        request("GET", "/v1/fragments", Some((USER1.0, "wrong"))).body(Body::empty())?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await?["status"], "error");
    Ok(())
}

#[tokio::test]
async fn test_create_returns_location_and_metadata() -> Result<()> {
    let app = app();
    let req = request("POST", "/v1/fragments", Some(USER1))
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("This is a fragment"))?;
    let response = send(&app, req).await?;

    assert_eq!(response.status(), StatusCode::CREATED);
    let location = response.headers()[header::LOCATION].to_str()?.to_string();
    let json = body_json(response).await?;
    let fragment = &json["fragment"];

    assert_eq!(json["status"], "ok");
    assert_eq!(fragment["type"], "text/plain");
    assert_eq!(fragment["size"], 18);
    assert_eq!(fragment["ownerId"], owner_id(USER1.0));
    assert!(fragment["created"].as_str().unwrap().ends_with("GMT"));
    assert_eq!(
        location,
        format!(
            "http://localhost:8080/v1/fragments/{}",
            fragment["id"].as_str().unwrap()
        )
    );
    Ok(())
}

#[tokio::test]
async fn test_create_rejects_unsupported_and_empty() -> Result<()> {
    let app = app();

    let req = request("POST", "/v1/fragments", Some(USER1))
        .header(header::CONTENT_TYPE, "application/msword")
        .body(Body::from("doc"))?;
    let response = send(&app, req).await?;
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body_json(response).await?["error"]["code"], 415);

    let req = request("POST", "/v1/fragments", Some(USER1))
        .body(Body::from("no content type"))?;
    let response = send(&app, req).await?;
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let req = request("POST", "/v1/fragments", Some(USER1))
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::empty())?;
    let response = send(&app, req).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn test_body_over_limit_is_413() -> Result<()> {
    let app = app_with_limit(16);
    let req = request("POST", "/v1/fragments", Some(USER1))
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("x".repeat(64)))?;
    let response = send(&app, req).await?;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body_json(response).await?["status"], "error");
    Ok(())
}

#[tokio::test]
async fn test_get_raw_and_info() -> Result<()> {
    let app = app();
    let id = create(&app, USER1, "text/plain; charset=utf-8", "hello there").await?;

    let response = send(
        &app,
        request("GET", &format!("/v1/fragments/{id}"), Some(USER1)).body(Body::empty())?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );
    assert_eq!(body_bytes(response).await?, b"hello there");

    let response = send(
        &app,
        request("GET", &format!("/v1/fragments/{id}/info"), Some(USER1)).body(Body::empty())?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await?;
    assert_eq!(json["fragment"]["id"], id.as_str());
    assert_eq!(json["fragment"]["size"], 11);
    Ok(())
}

#[tokio::test]
async fn test_get_converted() -> Result<()> {
    let app = app();
    let id = create(&app, USER1, "text/markdown", "# Hello").await?;

    let response = send(
        &app,
        request("GET", &format!("/v1/fragments/{id}.html"), Some(USER1)).body(Body::empty())?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/html; charset=utf-8"
    );
    assert_eq!(body_bytes(response).await?, b"<h1>Hello</h1>\n");

    let response = send(
        &app,
        request("GET", &format!("/v1/fragments/{id}.png"), Some(USER1)).body(Body::empty())?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await?;
    assert_eq!(body["status"], "error");
    assert_eq!(body["error"]["code"], 404);

    let response = send(
        &app,
        request("GET", "/v1/fragments/missing.html", Some(USER1)).body(Body::empty())?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_list_ids_and_expanded() -> Result<()> {
    let app = app();

    let response = send(&app, request("GET", "/v1/fragments", Some(USER1)).body(Body::empty())?).await?;
    let json = body_json(response).await?;
    assert_eq!(json["fragments"], serde_json::json!([]));

    let first = create(&app, USER1, "text/plain", "one").await?;
    let second = create(&app, USER1, "application/json", "{}").await?;

    let response = send(&app, request("GET", "/v1/fragments", Some(USER1)).body(Body::empty())?).await?;
    let json = body_json(response).await?;
    assert_eq!(json["fragments"], serde_json::json!([first, second]));

    let response = send(
        &app,
        request("GET", "/v1/fragments?expand=1", Some(USER1)).body(Body::empty())?,
    )
    .await?;
    let json = body_json(response).await?;
    let records = json["fragments"].as_array().expect("array of records");
    assert_eq!(records.len(), 2);
    assert_eq!(records[1]["type"], "application/json");
    assert_eq!(records[1]["size"], 2);
    Ok(())
}

#[tokio::test]
async fn test_update() -> Result<()> {
    let app = app();
    let id = create(&app, USER1, "text/markdown", "# Before").await?;

    let req = request("PUT", &format!("/v1/fragments/{id}"), Some(USER1))
        .header(header::CONTENT_TYPE, "text/markdown")
        .body(Body::from("# After, and longer"))?;
    let response = send(&app, req).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await?;
    assert_eq!(json["fragment"]["size"], 19);

    let req = request("PUT", &format!("/v1/fragments/{id}"), Some(USER1))
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("plain now"))?;
    let response = send(&app, req).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &app,
        request("GET", &format!("/v1/fragments/{id}"), Some(USER1)).body(Body::empty())?,
    )
    .await?;
    assert_eq!(body_bytes(response).await?, b"# After, and longer");

    let req = request("PUT", "/v1/fragments/missing", Some(USER1))
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("x"))?;
    assert_eq!(send(&app, req).await?.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_delete() -> Result<()> {
    let app = app();
    let id = create(&app, USER1, "text/plain", "short-lived").await?;
    let uri = format!("/v1/fragments/{id}");

    let response = send(&app, request("DELETE", &uri, Some(USER1)).body(Body::empty())?).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await?, serde_json::json!({ "status": "ok" }));

    let response = send(&app, request("GET", &uri, Some(USER1)).body(Body::empty())?).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&app, request("DELETE", &uri, Some(USER1)).body(Body::empty())?).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_owners_are_isolated() -> Result<()> {
    let app = app();
    let id = create(&app, USER1, "text/plain", "mine").await?;
    let uri = format!("/v1/fragments/{id}");

    let response = send(&app, request("GET", &uri, Some(USER2)).body(Body::empty())?).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&app, request("DELETE", &uri, Some(USER2)).body(Body::empty())?).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&app, request("GET", "/v1/fragments", Some(USER2)).body(Body::empty())?).await?;
    assert_eq!(body_json(response).await?["fragments"], serde_json::json!([]));

    let response = send(&app, request("GET", &uri, Some(USER1)).body(Body::empty())?).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}
