//! On-behalf-of identity stage.
//!
//! Services calling each other on behalf of an end user forward that user's id in
//! the `x-on-behalf-of` header. The stage lifts it into the request extensions.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::{request::Parts, StatusCode},
    middleware::{from_fn, Next},
    response::Response,
    Router,
};
use tracing::debug;

use crate::api::error_response;

/// Header carrying the delegated identity.
pub const ON_BEHALF_OF_HEADER: &str = "x-on-behalf-of";

/// Identity the request is made on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnBehalfOf(pub String);

impl OnBehalfOf {
    /// The identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Middleware reading [`ON_BEHALF_OF_HEADER`].
pub async fn on_behalf_of(mut request: Request, next: Next) -> Response {
    let identity = request
        .headers()
        .get(ON_BEHALF_OF_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);

    if let Some(identity) = identity {
        debug!(on_behalf_of = %identity, "request carries delegated identity");
        request.extensions_mut().insert(OnBehalfOf(identity));
    }

    next.run(request).await
}

/// Wrap `router` with the on-behalf-of stage.
pub fn apply(router: Router) -> Router {
    router.layer(from_fn(on_behalf_of))
}

#[async_trait]
impl<S> FromRequestParts<S> for OnBehalfOf
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<OnBehalfOf>().cloned().ok_or_else(|| {
            error_response(
                StatusCode::BAD_REQUEST,
                "missing_on_behalf_of",
                format!("missing {ON_BEHALF_OF_HEADER} header"),
            )
        })
    }
}
