//! HTTP API module for the built-in diagnostic and fallback routes.

pub mod handlers;
pub mod routes;

pub use handlers::{error_response, unmatched};
pub use routes::diagnostic_routes;
