//! Caller identity extraction

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use shared_protocol::CallerIdentity;

use crate::error::ApiError;
use crate::state::AppState;

/// Identity placed on the request by the outer auth layer, if any.
///
/// Rejects with 401 when the server requires a caller and none is present.
#[derive(Debug, Clone)]
pub struct Caller(pub Option<CallerIdentity>);

impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let caller = parts.extensions.get::<CallerIdentity>().cloned();
        if state.require_caller && caller.is_none() {
            return Err(ApiError::Unauthenticated);
        }
        Ok(Caller(caller))
    }
}
