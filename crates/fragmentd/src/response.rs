//! JSON envelopes and the mapping from errors to HTTP statuses.
//!
//! Success bodies look like `{"status": "ok", ...}`; failures look like
//! `{"status": "error", "error": {"code": 404, "message": "..."}}`.

use axum::{
    extract::rejection::BytesRejection,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use fragments::{ErrorKind, FragmentError};
use serde_json::{json, Map, Value};

/// Wrap `body` (a JSON object) in a success envelope.
pub fn ok(body: Value) -> Json<Value> {
    let mut envelope = match body {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("data".to_string(), other);
            map
        }
    };
    envelope.insert("status".to_string(), Value::from("ok"));
    Json(Value::Object(envelope))
}

/// An error envelope with the given status.
pub fn error(status: StatusCode, message: impl Into<String>) -> Response {
    let body = json!({
        "status": "error",
        "error": {
            "code": status.as_u16(),
            "message": message.into(),
        }
    });
    (status, Json(body)).into_response()
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound | ErrorKind::UnsupportedConversion => StatusCode::NOT_FOUND,
        ErrorKind::UnsupportedType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        ErrorKind::Validation | ErrorKind::TypeMismatch | ErrorKind::Key => StatusCode::BAD_REQUEST,
        ErrorKind::Conversion => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Anything a handler can fail with.
#[derive(Debug)]
pub enum ApiError {
    Fragment(FragmentError),
    Unauthorized,
    NotFound,
    Body(BytesRejection),
}

impl From<FragmentError> for ApiError {
    fn from(err: FragmentError) -> Self {
        ApiError::Fragment(err)
    }
}

impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        ApiError::Body(rejection)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Fragment(err) => {
                let status = status_for(err.kind());
                if status.is_server_error() {
                    tracing::error!(error = %err, "request failed");
                    // Backend details stay in the log.
                    return error(status, "unable to complete request");
                }
                tracing::warn!(error = %err, status = status.as_u16(), "request rejected");
                error(status, err.to_string())
            }
            ApiError::Unauthorized => {
                let mut response = error(StatusCode::UNAUTHORIZED, "unauthorized");
                response.headers_mut().insert(
                    header::WWW_AUTHENTICATE,
                    header::HeaderValue::from_static("Basic realm=\"fragments\""),
                );
                response
            }
            ApiError::NotFound => error(StatusCode::NOT_FOUND, "not found"),
            ApiError::Body(rejection) => {
                let status = rejection.status();
                tracing::warn!(status = status.as_u16(), "request body rejected");
                if status == StatusCode::PAYLOAD_TOO_LARGE {
                    error(status, "request body too large")
                } else {
                    error(status, rejection.body_text())
                }
            }
        }
    }
}
