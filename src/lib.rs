//! Axum application factory.
//!
//! Wraps axum with a fixed boilerplate pipeline so every service built with it
//! starts from the same shape:
//!
//! ```text
//! request tracing → security headers → CORS → [JSON body] → on-behalf-of
//!   → [URL-encoded body] → request logging
//!   → GET /ping, GET /teapot → caller routes → unmatched fallback
//! ```
//!
//! The caller supplies a transformer that adds its own routes and layers. The
//! factory builds and returns the app; binding a listener is left to the caller.
//!
//! # Modules
//!
//! - [`app`]: the factory, the application type and the stage pipeline
//! - [`config`]: options, environment and resolved configuration
//! - [`error`]: unified error types
//! - [`middleware`]: the built-in stages
//! - [`api`]: built-in routes and the fallback
//! - [`guard`]: process-wide crash guard
//! - [`metrics`]: request metrics
//! - [`utils`]: utility functions

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod guard;
pub mod metrics;
pub mod middleware;
pub mod utils;

pub use app::{create_app, App, AppFactory, BodyParsing, Stage, Transformer};
pub use config::{AppConfig, AppOptions, Environment};
pub use error::{AppError, ConfigError, Result};
pub use guard::CrashPolicy;
