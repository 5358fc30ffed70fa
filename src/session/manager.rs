//! Login, refresh, logout and the identity operations that go with them.
//!
//! The refresh token itself is stateless; what makes logout and "one session per key"
//! enforceable is that a refresh token is only honoured while it is byte-equal to the value
//! held in the [`SessionCache`] under its session key.

use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use super::cache::{CacheError, SessionCache};
use super::context::AuthContext;
use super::policy::SessionPolicy;
use crate::clock::Clock;
use crate::storage::models::{PasswordDigest, Role, User};
use crate::storage::{Database, DatabaseError};
use crate::tokens::{IssuedToken, PasswordError, Passwords, TokenError, TokenPair, TokenService};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("email already registered")]
    EmailTaken,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("{0}")]
    InvalidFormat(String),
    #[error("user not found")]
    NotFound,
    #[error("Password error: {0}")]
    Password(#[from] PasswordError),
    #[error("session revoked or superseded")]
    Revoked,
    #[error("Token error: {0}")]
    Token(#[from] TokenError),
}

/// Registration input
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub email: String,
    pub name: String,
    pub password: String,
}

pub struct SessionManager {
    cache: Arc<dyn SessionCache>,
    clock: Arc<dyn Clock>,
    db: Database,
    passwords: Passwords,
    policy: SessionPolicy,
    tokens: TokenService,
}

impl SessionManager {
    pub fn new(
        db: Database,
        cache: Arc<dyn SessionCache>,
        tokens: TokenService,
        passwords: Passwords,
        policy: SessionPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cache,
            clock,
            db,
            passwords,
            policy,
            tokens,
        }
    }

    pub fn policy(&self) -> SessionPolicy {
        self.policy
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    /// Verify credentials, mint a token pair and make its refresh token the live session.
    ///
    /// Any session previously stored under the same key is replaced and stops refreshing.
    pub fn login(
        &self,
        email: &str,
        password: &str,
        device: Option<&str>,
    ) -> Result<TokenPair, SessionError> {
        let user = match self.db.get_user_by_email(&normalize_email(email))? {
            Some(user) => user,
            None => {
                self.passwords.verify_dummy(password);
                return Err(SessionError::InvalidCredentials);
            }
        };

        if !self.passwords.verify(user.password_hash.as_str(), password) {
            return Err(SessionError::InvalidCredentials);
        }

        let identity_id = user.id.to_string();
        let device_claim = self.policy.device_claim(device);
        let pair = self
            .tokens
            .mint(&identity_id, user.role, device_claim.as_deref())?;

        let key = self.policy.session_key(&identity_id, device_claim.as_deref());
        self.cache
            .set(&key, &pair.refresh.token, self.tokens.refresh_ttl())?;

        tracing::debug!(user_id = %identity_id, role = %user.role, "Created session");
        Ok(pair)
    }

    /// Exchange a live refresh token for a new access token. The refresh token is not rotated.
    pub fn refresh(&self, refresh_token: &str) -> Result<IssuedToken, SessionError> {
        let claims = self.tokens.verify_refresh(refresh_token)?;
        let identity_id = parse_identity(&claims.sub)?;

        let key = self.policy.key_for(identity_id, claims.did.as_deref());
        let live = self.cache.get(&key)?;
        match live {
            Some(cached) if constant_time_eq(cached.as_bytes(), refresh_token.as_bytes()) => {}
            _ => {
                tracing::debug!(user_id = %identity_id, "Rejected revoked refresh token");
                return Err(SessionError::Revoked);
            }
        }

        let user = self
            .db
            .get_user(&claims.sub)?
            .ok_or(SessionError::NotFound)?;

        let access = self
            .tokens
            .mint_access(&claims.sub, user.role, claims.did.as_deref())?;

        tracing::debug!(user_id = %identity_id, "Refreshed access token");
        Ok(access)
    }

    /// Evict the session for an identity. Idempotent.
    pub fn logout(&self, identity_id: Uuid, device: Option<&str>) -> Result<bool, SessionError> {
        let key = self.policy.key_for(identity_id, device);
        let removed = self.cache.delete(&key)?;
        tracing::debug!(user_id = %identity_id, removed, "Logged out");
        Ok(removed)
    }

    /// Verify an access token and turn it into a request identity.
    ///
    /// Stateless: the session cache is not consulted, so an access token stays usable
    /// until it expires even after logout.
    pub fn authenticate(&self, access_token: &str) -> Result<AuthContext, SessionError> {
        let claims = self.tokens.verify_access(access_token)?;
        let identity_id = parse_identity(&claims.sub)?;

        Ok(AuthContext {
            device_id: claims.did,
            identity_id,
            role: claims.role,
        })
    }

    // ========================================================================
    // Identities
    // ========================================================================

    pub fn register(&self, new: NewIdentity) -> Result<User, SessionError> {
        let name = new.name.trim().to_string();
        let email = normalize_email(&new.email);

        if name.chars().count() < 3 {
            return Err(SessionError::InvalidFormat(
                "name must be at least 3 characters".to_string(),
            ));
        }
        if !looks_like_email(&email) {
            return Err(SessionError::InvalidFormat("invalid email address".to_string()));
        }
        if new.password.chars().count() < 6 {
            return Err(SessionError::InvalidFormat(
                "password must be at least 6 characters".to_string(),
            ));
        }

        let now = self.clock.now();
        let user = User {
            created_at: now,
            email,
            id: Uuid::new_v4(),
            is_premium: false,
            name,
            password_hash: PasswordDigest::new(self.passwords.hash(&new.password)?),
            premium_expires_at: None,
            role: Role::User,
            updated_at: now,
        };

        if !self.db.insert_user(&user)? {
            return Err(SessionError::EmailTaken);
        }

        tracing::info!(user_id = %user.id, "Registered user");
        Ok(user)
    }

    pub fn me(&self, identity_id: Uuid) -> Result<User, SessionError> {
        self.db
            .get_user(&identity_id.to_string())?
            .ok_or(SessionError::NotFound)
    }

    pub fn list_users(&self) -> Result<Vec<User>, SessionError> {
        Ok(self.db.list_users()?)
    }

    /// Admin override of role and premium flag.
    ///
    /// Clearing the flag also clears any expiry; setting it keeps the current expiry.
    pub fn update_user(
        &self,
        id: &str,
        role: &str,
        is_premium: bool,
    ) -> Result<User, SessionError> {
        let identity_id = Uuid::parse_str(id)
            .map_err(|_| SessionError::InvalidFormat("invalid user id format".to_string()))?;
        let role: Role = role.parse().map_err(SessionError::InvalidFormat)?;

        let now = self.clock.now();
        let user = self
            .db
            .update_user(&identity_id.to_string(), |user| {
                user.role = role;
                user.is_premium = is_premium;
                if !is_premium {
                    user.premium_expires_at = None;
                }
                user.updated_at = now;
            })?
            .ok_or(SessionError::NotFound)?;

        tracing::info!(user_id = %user.id, role = %user.role, is_premium, "Updated user");
        Ok(user)
    }
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

fn parse_identity(sub: &str) -> Result<Uuid, TokenError> {
    Uuid::parse_str(sub).map_err(|_| TokenError::Malformed("subject is not a valid id".to_string()))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
