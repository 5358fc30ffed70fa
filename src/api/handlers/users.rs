use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{session_error, UserResponse};
use crate::api::response::{ApiError, AppJson, JSend};
use crate::AppState;

#[derive(Debug, Deserialize, Serialize)]
pub struct UpdateUserRequest {
    pub is_premium: bool,
    pub role: String,
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<Vec<UserResponse>>>, ApiError> {
    let now = state.clock.now();
    let users = state
        .sessions
        .list_users()
        .map_err(session_error)?
        .into_iter()
        .map(|user| UserResponse::from_user(user, now))
        .collect();

    Ok(JSend::success(users))
}

pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    AppJson(req): AppJson<UpdateUserRequest>,
) -> Result<Json<JSend<UserResponse>>, ApiError> {
    let user = state
        .sessions
        .update_user(&id, &req.role, req.is_premium)
        .map_err(session_error)?;

    Ok(JSend::success(UserResponse::from_user(
        user,
        state.clock.now(),
    )))
}
