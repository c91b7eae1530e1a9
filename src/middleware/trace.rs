//! Request tracing: request ids and a per-request span.
//!
//! Every request gets an id in the configured header (a UUID v4 unless the client
//! sent one and incoming ids are trusted). The id is attached to the request span
//! and echoed on the response so downstream stages and callers can correlate.

use axum::{
    extract::{Request, State},
    http::HeaderName,
    middleware::map_request_with_state,
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info_span;

use crate::config::TraceConfig;

async fn strip_incoming_id(State(header): State<HeaderName>, mut request: Request) -> Request {
    request.headers_mut().remove(&header);
    request
}

/// Wrap `router` with the request tracing stage.
pub fn apply(router: Router, config: &TraceConfig) -> Router {
    let header = config.request_id_header.clone();
    let span_header = header.clone();

    let stack = ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(header.clone(), MakeRequestUuid))
        .layer(
            TraceLayer::new_for_http().make_span_with(move |request: &Request| {
                let request_id = request
                    .headers()
                    .get(&span_header)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(PropagateRequestIdLayer::new(header.clone()));

    let router = router.layer(stack);

    if config.trust_incoming {
        router
    } else {
        router.layer(map_request_with_state(header, strip_incoming_id))
    }
}
