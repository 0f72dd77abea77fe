//! HTTP surface
//!
//! - `GET /` status and capability report
//! - `GET|POST /capture` capture a still, returns `image/jpeg`
//! - `GET /metrics` capture counters

use crate::error::CaptureError;
use crate::params::CaptureRequest;
use crate::service::CaptureService;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn router(service: Arc<CaptureService>) -> Router {
    Router::new()
        .route("/", get(status))
        .route("/capture", get(capture).post(capture))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

async fn status(State(service): State<Arc<CaptureService>>) -> Json<serde_json::Value> {
    Json(service.status().to_json())
}

async fn metrics(State(service): State<Arc<CaptureService>>) -> Response {
    Json(service.metrics()).into_response()
}

async fn capture(
    State(service): State<Arc<CaptureService>>,
    Query(query): Query<CaptureRequest>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = query.or(form_values(&headers, &body));

    match service.capture(&request).await {
        Ok(image) => ([(header::CONTENT_TYPE, "image/jpeg")], image.bytes).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Values from an urlencoded form body; anything else contributes nothing.
fn form_values(headers: &HeaderMap, body: &[u8]) -> CaptureRequest {
    let is_form = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));
    if !is_form || body.is_empty() {
        return CaptureRequest::default();
    }

    serde_urlencoded::from_bytes(body).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "Ignoring unparseable form body");
        CaptureRequest::default()
    })
}

impl IntoResponse for CaptureError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            CaptureError::Validation(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            CaptureError::Unavailable(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": self.to_string() }),
            ),
            CaptureError::Execution { message, details } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": message, "details": details }),
            ),
            CaptureError::Timeout(_) => (
                StatusCode::GATEWAY_TIMEOUT,
                json!({ "error": "capture timeout" }),
            ),
            CaptureError::Io(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "internal error", "details": e.to_string() }),
            ),
        };

        tracing::debug!(status = %status, kind = self.kind(), "Capture error response");

        (status, Json(body)).into_response()
    }
}
