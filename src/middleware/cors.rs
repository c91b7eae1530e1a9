//! CORS (Cross-Origin Resource Sharing) stage.

use std::time::Duration;

use axum::Router;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer, ExposeHeaders};

use crate::config::CorsConfig;

/// Creates a CORS layer from the resolved policy.
///
/// An empty origin list allows any origin. An empty allowed-header list mirrors the
/// headers requested in the preflight.
pub fn create_cors_layer(config: &CorsConfig) -> CorsLayer {
    let origin = if config.allows_any_origin() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(config.origins.clone())
    };

    let headers = if config.allowed_headers.is_empty() {
        AllowHeaders::mirror_request()
    } else {
        AllowHeaders::list(config.allowed_headers.clone())
    };

    let layer = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(AllowMethods::list(config.methods.clone()))
        .allow_headers(headers)
        .expose_headers(ExposeHeaders::list(config.exposed_headers.clone()))
        .allow_credentials(config.credentials);

    match config.max_age_secs {
        Some(secs) => layer.max_age(Duration::from_secs(secs)),
        None => layer,
    }
}

/// Wrap `router` with the CORS stage.
pub fn apply(router: Router, config: &CorsConfig) -> Router {
    router.layer(create_cors_layer(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, AppOptions, CorsOptions, Environment};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use tower::ServiceExt;

    fn cors_config(options: CorsOptions) -> CorsConfig {
        let options = AppOptions {
            cors: options,
            ..Default::default()
        };
        AppConfig::resolve(options, Environment::Test).unwrap().cors
    }

    fn router(config: &CorsConfig) -> Router {
        apply(Router::new().route("/", get(|| async { "ok" })), config)
    }

    #[tokio::test]
    async fn any_origin_by_default() {
        let app = router(&cors_config(CorsOptions::default()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("origin", "https://anywhere.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()["access-control-allow-origin"], "*");
    }

    #[tokio::test]
    async fn preflight_for_listed_origin() {
        let config = cors_config(CorsOptions {
            origins: Some(vec!["https://app.example".to_string()]),
            credentials: Some(true),
            max_age_secs: Some(600),
            ..Default::default()
        });
        let app = router(&config);

        let response = app
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/")
                    .header("origin", "https://app.example")
                    .header("access-control-request-method", "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "https://app.example"
        );
        assert_eq!(response.headers()["access-control-allow-credentials"], "true");
        assert_eq!(response.headers()["access-control-max-age"], "600");
    }

    #[tokio::test]
    async fn unlisted_origin_gets_no_allow_header() {
        let config = cors_config(CorsOptions {
            origins: Some(vec!["https://app.example".to_string()]),
            ..Default::default()
        });
        let app = router(&config);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("origin", "https://evil.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.headers().get("access-control-allow-origin").is_none());
    }
}
