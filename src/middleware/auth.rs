use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::access::{Action, PageParams};
use crate::error::ApiError;
use crate::gate::{Admission, Rejection, INVALID_BEARER};
use crate::server::AppState;

/// Resource name a route was mounted for, attached as a request extension.
#[derive(Debug, Clone, Copy)]
pub struct ResourceRoute(pub &'static str);

/// Gate admission for the current request.
///
/// Taking `Admitted` as a handler argument runs the authorization gate before
/// the handler body; a rejection short-circuits with 401.
#[derive(Debug)]
pub struct Admitted(pub Admission);

#[async_trait]
impl FromRequestParts<AppState> for Admitted {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let ResourceRoute(resource) = parts
            .extensions
            .get::<ResourceRoute>()
            .copied()
            .ok_or_else(|| {
                tracing::error!("Route for {} has no resource attached", parts.uri.path());
                ApiError::internal_server_error("Route is not bound to a resource")
            })?;

        let action = Action::for_method(&parts.method);
        let authorization = match parts.headers.get(AUTHORIZATION) {
            Some(value) => Some(
                value
                    .to_str()
                    .map_err(|_| Rejection::MissingOrMalformedCredential(INVALID_BEARER))?,
            ),
            None => None,
        };
        let params = Query::<PageParams>::try_from_uri(&parts.uri)
            .map(|Query(params)| params)
            .unwrap_or_default();

        let admission = state
            .gate
            .admit(authorization, resource, action, &params)
            .await?;
        Ok(Admitted(admission))
    }
}
