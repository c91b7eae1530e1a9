//! Built-in middleware stages.
//!
//! Each stage module exposes an `apply` function wrapping a [`Router`](axum::Router)
//! with that stage's layer.

pub mod body;
pub mod cors;
pub mod identity;
pub mod logging;
pub mod security;
pub mod trace;

pub use body::{FormBody, JsonBody};
pub use identity::OnBehalfOf;
