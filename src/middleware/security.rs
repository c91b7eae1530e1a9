//! Security headers added to every response.
//!
//! Headers a handler already set are left untouched.

use axum::{
    extract::{Request, State},
    http::{header, HeaderName, HeaderValue},
    middleware::{from_fn_with_state, Next},
    response::Response,
    Router,
};

use crate::config::SecurityConfig;

/// Headers set on every response.
pub const DEFAULT_HEADERS: &[(&str, &str)] = &[
    (
        "content-security-policy",
        "default-src 'self';base-uri 'self';font-src 'self' https: data:;\
         form-action 'self';frame-ancestors 'self';img-src 'self' data:;\
         object-src 'none';script-src 'self';script-src-attr 'none';\
         style-src 'self' https: 'unsafe-inline';upgrade-insecure-requests",
    ),
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-origin"),
    ("origin-agent-cluster", "?1"),
    ("referrer-policy", "no-referrer"),
    ("x-content-type-options", "nosniff"),
    ("x-dns-prefetch-control", "off"),
    ("x-download-options", "noopen"),
    ("x-frame-options", "SAMEORIGIN"),
    ("x-permitted-cross-domain-policies", "none"),
    ("x-xss-protection", "0"),
];

const HSTS_VALUE: &str = "max-age=15552000; includeSubDomains";

/// Middleware adding the security headers.
pub async fn security_headers(
    State(config): State<SecurityConfig>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.remove("x-powered-by");
    for &(name, value) in DEFAULT_HEADERS {
        headers
            .entry(HeaderName::from_static(name))
            .or_insert(HeaderValue::from_static(value));
    }

    if config.hsts {
        headers
            .entry(header::STRICT_TRANSPORT_SECURITY)
            .or_insert(HeaderValue::from_static(HSTS_VALUE));
    }

    response
}

/// Wrap `router` with the security headers stage.
pub fn apply(router: Router, config: SecurityConfig) -> Router {
    router.layer(from_fn_with_state(config, security_headers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use axum::body::Body;
    use axum::routing::get;
    use tower::ServiceExt;

    async fn call(router: Router) -> Response {
        router
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn adds_defaults_without_hsts() {
        let app = apply(Router::new().route("/", get(|| async { "ok" })), SecurityConfig { hsts: false });
        let response = call(app).await;

        assert_eq!(response.headers()["x-content-type-options"], "nosniff");
        assert_eq!(response.headers()["x-frame-options"], "SAMEORIGIN");
        assert!(response.headers().get("strict-transport-security").is_none());
    }

    #[tokio::test]
    async fn adds_hsts_when_enabled() {
        let app = apply(Router::new().route("/", get(|| async { "ok" })), SecurityConfig { hsts: true });
        let response = call(app).await;

        assert_eq!(response.headers()["strict-transport-security"], HSTS_VALUE);
    }

    #[tokio::test]
    async fn keeps_handler_values_and_strips_powered_by() {
        let handler = || async {
            (
                [("x-frame-options", "DENY"), ("x-powered-by", "axum")],
                "ok",
            )
        };
        let app = apply(Router::new().route("/", get(handler)), SecurityConfig { hsts: false });
        let response = call(app).await;

        assert_eq!(response.headers()["x-frame-options"], "DENY");
        assert!(response.headers().get("x-powered-by").is_none());
    }
}
