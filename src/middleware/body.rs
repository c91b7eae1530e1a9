//! Body parsing stages.
//!
//! A parsing stage buffers a matching request body (bounded by the configured
//! limit), stores the parsed value in the request extensions and hands the raw
//! bytes on unchanged. Handlers read the parsed value with the [`JsonBody`] or
//! [`FormBody`] extractors. With a stage disabled, the body reaches handlers raw
//! and the extension is absent.

use axum::{
    async_trait,
    body::{to_bytes, Body, Bytes},
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::{from_fn_with_state, Next},
    response::Response,
    Router,
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::error_response;
use crate::metrics;

/// Parsed `application/json` body.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonBody(pub Value);

/// Parsed `application/x-www-form-urlencoded` body, pairs in wire order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormBody(pub Vec<(String, String)>);

impl FormBody {
    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

fn media_type(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    let essence = value.split(';').next()?.trim().to_ascii_lowercase();
    Some(essence)
}

fn is_json(headers: &HeaderMap) -> bool {
    media_type(headers)
        .map(|m| m == "application/json" || (m.starts_with("application/") && m.ends_with("+json")))
        .unwrap_or(false)
}

fn is_url_encoded(headers: &HeaderMap) -> bool {
    media_type(headers)
        .map(|m| m == "application/x-www-form-urlencoded")
        .unwrap_or(false)
}

fn too_large(limit: usize) -> Response {
    metrics::inc_rejected_bodies("too_large");
    error_response(
        StatusCode::PAYLOAD_TOO_LARGE,
        "entity_too_large",
        format!("request body exceeds {limit} bytes"),
    )
}

/// Buffer the body, rejecting anything declared or found to exceed `limit`.
async fn buffer(request: Request, limit: usize) -> Result<(Parts, Bytes), Response> {
    let declared = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > limit) {
        return Err(too_large(limit));
    }

    let (parts, body) = request.into_parts();
    match to_bytes(body, limit).await {
        Ok(bytes) => Ok((parts, bytes)),
        Err(err) => {
            warn!("failed to read request body: {}", err);
            Err(too_large(limit))
        }
    }
}

/// Middleware parsing JSON bodies.
pub async fn parse_json(State(limit): State<usize>, request: Request, next: Next) -> Response {
    if !is_json(request.headers()) {
        return next.run(request).await;
    }

    let (mut parts, bytes) = match buffer(request, limit).await {
        Ok(buffered) => buffered,
        Err(response) => return response,
    };

    if !bytes.is_empty() {
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(value) => {
                parts.extensions.insert(JsonBody(value));
            }
            Err(err) => {
                warn!("rejecting malformed JSON body: {}", err);
                metrics::inc_rejected_bodies("invalid_json");
                return error_response(StatusCode::BAD_REQUEST, "invalid_json", err.to_string());
            }
        }
    }

    debug!(bytes = bytes.len(), "parsed JSON body");
    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

/// Middleware parsing URL-encoded bodies.
pub async fn parse_url_encoded(
    State(limit): State<usize>,
    request: Request,
    next: Next,
) -> Response {
    if !is_url_encoded(request.headers()) {
        return next.run(request).await;
    }

    let (mut parts, bytes) = match buffer(request, limit).await {
        Ok(buffered) => buffered,
        Err(response) => return response,
    };

    if !bytes.is_empty() {
        let pairs = url::form_urlencoded::parse(&bytes).into_owned().collect();
        parts.extensions.insert(FormBody(pairs));
    }

    debug!(bytes = bytes.len(), "parsed URL-encoded body");
    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

/// Wrap `router` with the JSON body stage.
pub fn apply_json(router: Router, limit: usize) -> Router {
    router.layer(from_fn_with_state(limit, parse_json))
}

/// Wrap `router` with the URL-encoded body stage.
pub fn apply_url_encoded(router: Router, limit: usize) -> Router {
    router.layer(from_fn_with_state(limit, parse_url_encoded))
}

#[async_trait]
impl<S> FromRequestParts<S> for JsonBody
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<JsonBody>().cloned().ok_or_else(|| {
            error_response(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "json_body_required",
                "expected a parsed JSON body",
            )
        })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for FormBody
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<FormBody>().cloned().ok_or_else(|| {
            error_response(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "form_body_required",
                "expected a parsed URL-encoded body",
            )
        })
    }
}
