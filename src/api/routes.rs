//! Built-in route definitions.

use std::sync::Arc;

use axum::Router;

use super::handlers::{ping, teapot};
use crate::config::AppConfig;

/// Path of the liveness route.
pub const PING_PATH: &str = "/ping";
/// Path of the teapot route.
pub const TEAPOT_PATH: &str = "/teapot";

/// Create the diagnostic router (`/ping`, `/teapot`).
///
/// Any other request, including another method on a diagnostic path, is handed
/// to `rest`.
pub fn diagnostic_routes(config: Arc<AppConfig>, rest: Router) -> Router {
    Router::new()
        .route(PING_PATH, ping(config).fallback_service(rest.clone()))
        .route(TEAPOT_PATH, teapot().fallback_service(rest.clone()))
        .fallback_service(rest)
}
