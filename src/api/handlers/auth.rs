use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::AppendHeaders;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{run_blocking, session_error, MessageResponse, UserResponse};
use crate::api::cookies::{expired_cookie, read_cookie, token_cookie, ACCESS_COOKIE, REFRESH_COOKIE};
use crate::api::response::{ApiError, AppJson, JSend};
use crate::session::{AuthContext, NewIdentity};
use crate::AppState;

type SetCookies<const N: usize> = AppendHeaders<[(header::HeaderName, String); N]>;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LoginRequest {
    /// Only meaningful under the per-device session policy
    #[serde(default)]
    pub device_id: Option<String>,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub access_expires_at: DateTime<Utc>,
    pub message: String,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn register(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<JSend<UserResponse>>), ApiError> {
    let worker = Arc::clone(&state);
    let user = run_blocking(move || {
        worker
            .sessions
            .register(NewIdentity {
                email: req.email,
                name: req.name,
                password: req.password,
            })
            .map_err(session_error)
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        JSend::success(UserResponse::from_user(user, state.clock.now())),
    ))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<(SetCookies<2>, Json<JSend<SessionResponse>>), ApiError> {
    let worker = Arc::clone(&state);
    let pair = run_blocking(move || {
        worker
            .sessions
            .login(&req.email, &req.password, req.device_id.as_deref())
            .map_err(session_error)
    })
    .await?;

    let http = &state.config.http;
    let cookies = AppendHeaders([
        (
            header::SET_COOKIE,
            token_cookie(
                http,
                ACCESS_COOKIE,
                &pair.access.token,
                state.config.tokens.access_ttl_seconds as i64,
            ),
        ),
        (
            header::SET_COOKIE,
            token_cookie(
                http,
                REFRESH_COOKIE,
                &pair.refresh.token,
                state.config.tokens.refresh_ttl_seconds as i64,
            ),
        ),
    ]);

    Ok((
        cookies,
        JSend::success(SessionResponse {
            access_expires_at: pair.access.expires_at,
            message: "login successful".to_string(),
        }),
    ))
}

pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<(SetCookies<1>, Json<JSend<SessionResponse>>), ApiError> {
    let token = read_cookie(&headers, REFRESH_COOKIE)
        .ok_or_else(|| ApiError::unauthenticated("missing refresh token"))?;

    let access = state.sessions.refresh(&token).map_err(session_error)?;

    let cookie = token_cookie(
        &state.config.http,
        ACCESS_COOKIE,
        &access.token,
        state.config.tokens.access_ttl_seconds as i64,
    );

    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        JSend::success(SessionResponse {
            access_expires_at: access.expires_at,
            message: "token refreshed".to_string(),
        }),
    ))
}

/// Always clears the cookies; evicts the cached session only when the caller is identifiable.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    ctx: Option<AuthContext>,
) -> Result<(SetCookies<2>, Json<JSend<MessageResponse>>), ApiError> {
    let message = match ctx {
        Some(ctx) => {
            state
                .sessions
                .logout(ctx.identity_id, ctx.device_id.as_deref())
                .map_err(session_error)?;
            "logged out"
        }
        None => "logged out (no active session)",
    };

    let http = &state.config.http;
    Ok((
        AppendHeaders([
            (header::SET_COOKIE, expired_cookie(http, ACCESS_COOKIE)),
            (header::SET_COOKIE, expired_cookie(http, REFRESH_COOKIE)),
        ]),
        JSend::success(MessageResponse::new(message)),
    ))
}

pub async fn me(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
) -> Result<Json<JSend<UserResponse>>, ApiError> {
    let user = state.sessions.me(ctx.identity_id).map_err(session_error)?;
    Ok(JSend::success(UserResponse::from_user(
        user,
        state.clock.now(),
    )))
}
