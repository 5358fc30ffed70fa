mod auth;
mod health;
mod orders;
mod users;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::response::ApiError;
use crate::entitlement::OrderError;
use crate::session::SessionError;
use crate::storage::models::{Role, User};

pub use auth::{login, logout, me, refresh_token, register};
pub use health::health;
pub use orders::{attach_payment_proof, create_order, list_orders, list_user_orders, verify_order};
pub use users::{list_users, update_user};

const INTERNAL_MESSAGE: &str = "internal server error";

/// Outward view of an identity. Never carries the password hash.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub created_at: DateTime<Utc>,
    pub email: String,
    pub id: Uuid,
    pub is_premium: bool,
    pub name: String,
    pub premium_active: bool,
    pub premium_expires_at: Option<DateTime<Utc>>,
    pub role: Role,
    pub updated_at: DateTime<Utc>,
}

impl UserResponse {
    fn from_user(user: User, now: DateTime<Utc>) -> Self {
        Self {
            premium_active: user.premium_active_at(now),
            created_at: user.created_at,
            email: user.email,
            id: user.id,
            is_premium: user.is_premium,
            name: user.name,
            premium_expires_at: user.premium_expires_at,
            role: user.role,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Map a SessionError to an ApiError
fn session_error(e: SessionError) -> ApiError {
    match e {
        SessionError::EmailTaken => ApiError::conflict("email_taken", "email already registered"),
        SessionError::InvalidCredentials => ApiError::invalid_credentials(),
        SessionError::InvalidFormat(message) => ApiError::invalid_format(message),
        SessionError::NotFound => ApiError::not_found("user not found"),
        SessionError::Revoked => ApiError::revoked(),
        SessionError::Token(e) => {
            tracing::debug!(error = %e, "Rejected token");
            ApiError::unauthenticated("invalid or expired token")
        }
        SessionError::Cache(_) | SessionError::Database(_) | SessionError::Password(_) => {
            tracing::error!(error = %e, "Session operation failed");
            ApiError::internal(INTERNAL_MESSAGE)
        }
    }
}

/// Map an OrderError to an ApiError
fn order_error(e: OrderError) -> ApiError {
    match e {
        OrderError::Database(e) => {
            tracing::error!(error = %e, "Order operation failed");
            ApiError::internal(INTERNAL_MESSAGE)
        }
        OrderError::Forbidden => ApiError::forbidden("access denied"),
        OrderError::InvalidFormat(message) => ApiError::invalid_format(message),
        OrderError::NotFound(what) => ApiError::not_found(format!("{what} not found")),
    }
}

/// Run CPU-heavy work (argon2) off the async workers.
async fn run_blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| {
        tracing::error!(error = %e, "Blocking task panicked");
        ApiError::internal(INTERNAL_MESSAGE)
    })?
}
