//! Built-in HTTP handlers: liveness, teapot and the unmatched-route fallback.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, MethodRouter},
    Json,
};
use serde::Serialize;
use tracing::warn;

use crate::config::AppConfig;
use crate::metrics;

/// Liveness response.
#[derive(Debug, Serialize)]
pub struct PingResponse {
    /// Application name.
    pub name: String,
    /// Application version.
    pub version: String,
    /// Environment the app was built for.
    pub environment: String,
    /// Milliseconds since the route was registered.
    pub uptime_ms: u64,
}

/// Error envelope shared by every built-in error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// HTTP status code.
    pub status: u16,
    /// Error details.
    pub error: ErrorDetail,
}

/// Machine readable code plus a human message.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    /// Stable error code.
    pub code: String,
    /// Human readable message.
    pub message: String,
}

/// Build a JSON error response.
pub fn error_response(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    let body = ErrorResponse {
        status: status.as_u16(),
        error: ErrorDetail {
            code: code.to_string(),
            message: message.into(),
        },
    };
    (status, Json(body)).into_response()
}

/// `GET /ping` bound to the resolved configuration.
pub fn ping(config: Arc<AppConfig>) -> MethodRouter {
    let started = Instant::now();
    get(move || {
        let config = config.clone();
        async move {
            Json(PingResponse {
                name: config.name.clone(),
                version: config.version.clone(),
                environment: config.environment.to_string(),
                uptime_ms: started.elapsed().as_millis() as u64,
            })
        }
    })
}

/// `GET /teapot`, always 418.
pub fn teapot() -> MethodRouter {
    get(|| async { error_response(StatusCode::IM_A_TEAPOT, "im_a_teapot", "I'm a teapot") })
}

/// Fallback for requests no route matched.
pub async fn unmatched(method: Method, uri: Uri) -> Response {
    warn!("unmatched route: {} {}", method, uri.path());
    metrics::inc_unmatched_routes();

    error_response(
        StatusCode::NOT_FOUND,
        "route_not_found",
        format!("Cannot {} {}", method, uri.path()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn error_response_has_envelope() {
        let response = error_response(StatusCode::BAD_REQUEST, "bad", "nope");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], 400);
        assert_eq!(json["error"]["code"], "bad");
        assert_eq!(json["error"]["message"], "nope");
    }

    #[tokio::test]
    async fn unmatched_reports_method_and_path() {
        let response = unmatched(Method::DELETE, Uri::from_static("/nowhere?x=1")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "route_not_found");
        assert_eq!(json["error"]["message"], "Cannot DELETE /nowhere");
    }
}
