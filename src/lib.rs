//! tryout-auth - Session authentication and premium entitlements for a tryout platform
//!
//! This crate provides:
//! - Registration and argon2id password verification
//! - HS256 access/refresh token pairs delivered as HttpOnly cookies
//! - A session cache that makes refresh tokens revocable (one live session per key)
//! - Cookie-based authentication and role gates for axum routes
//! - Orders whose verification grants premium access in one transaction
//! - redb embedded database (ACID, MVCC, crash-safe)
//! - REST API

pub mod api;
pub mod clock;
pub mod config;
pub mod entitlement;
pub mod expiration;
pub mod session;
pub mod storage;
#[cfg(test)]
pub mod testutil;
pub mod tokens;

use std::sync::Arc;

use clock::{Clock, SystemClock};
use config::Config;
use entitlement::EntitlementWorkflow;
use session::{RedbSessionCache, SessionManager};
use storage::Database;
use tokens::{PasswordError, Passwords, TokenService};

/// Shared application state
pub struct AppState {
    pub clock: Arc<dyn Clock>,
    pub config: Config,
    pub db: Database,
    pub orders: EntitlementWorkflow,
    pub sessions: SessionManager,
}

impl AppState {
    /// Wire the services together around one clock and one database.
    pub fn new(config: Config, db: Database, clock: Arc<dyn Clock>, passwords: Passwords) -> Self {
        let tokens = TokenService::new(
            config.tokens.signing_key.clone(),
            Arc::clone(&clock),
            config.tokens.access_ttl(),
            config.tokens.refresh_ttl(),
        );
        let cache = Arc::new(RedbSessionCache::new(db.clone(), Arc::clone(&clock)));
        let sessions = SessionManager::new(
            db.clone(),
            cache,
            tokens,
            passwords,
            config.sessions.policy,
            Arc::clone(&clock),
        );
        let orders = EntitlementWorkflow::new(db.clone(), Arc::clone(&clock));

        Self {
            clock,
            config,
            db,
            orders,
            sessions,
        }
    }

    /// Production wiring: wall clock and default argon2id cost.
    pub fn from_config(config: Config, db: Database) -> Result<Self, PasswordError> {
        Ok(Self::new(config, db, Arc::new(SystemClock), Passwords::new()?))
    }
}
