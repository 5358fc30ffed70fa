//! Authorization gate
//!
//! `authenticate` turns the `access_token` cookie into an [`AuthContext`] in the request
//! extensions; `require_role` / `require_admin` read that context and must therefore be
//! layered inside `authenticate`. Any failure short-circuits before the handler runs.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use super::cookies::{read_cookie, ACCESS_COOKIE};
use super::response::ApiError;
use crate::session::AuthContext;
use crate::storage::models::Role;
use crate::AppState;

/// Reject the request unless it carries a valid, unexpired access token cookie.
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = read_cookie(request.headers(), ACCESS_COOKIE)
        .ok_or_else(|| ApiError::unauthenticated("missing access token"))?;

    let ctx = state.sessions.authenticate(&token).map_err(|e| {
        tracing::debug!(error = %e, "Rejected access token");
        ApiError::unauthenticated("invalid or expired access token")
    })?;

    request.extensions_mut().insert(ctx);
    Ok(next.run(request).await)
}

/// Attach an [`AuthContext`] when the access token is valid; pass through either way.
pub async fn identify(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = read_cookie(request.headers(), ACCESS_COOKIE) {
        match state.sessions.authenticate(&token) {
            Ok(ctx) => {
                request.extensions_mut().insert(ctx);
            }
            Err(e) => tracing::debug!(error = %e, "Ignoring unusable access token"),
        }
    }
    next.run(request).await
}

/// Reject the request unless the authenticated caller has `role`.
pub async fn require_role(role: Role, request: Request, next: Next) -> Result<Response, ApiError> {
    match request.extensions().get::<AuthContext>() {
        Some(ctx) if ctx.has_role(role) => Ok(next.run(request).await),
        Some(ctx) => {
            tracing::warn!(user_id = %ctx.identity_id, required = %role, "Role check failed");
            Err(ApiError::forbidden("insufficient role"))
        }
        None => Err(ApiError::forbidden("no authenticated caller")),
    }
}

pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    require_role(Role::Admin, request, next).await
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or_else(|| ApiError::unauthenticated("authentication required"))
    }
}
