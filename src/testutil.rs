//! Shared test helpers, available to all `#[cfg(test)]` modules in the crate.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tempfile::TempDir;
use uuid::Uuid;

use crate::clock::{Clock, ManualClock};
use crate::config::{Config, HttpConfig, NodeConfig, SessionConfig, TokenConfig};
use crate::storage::models::{ItemType, Order, OrderStatus, PasswordDigest, Role, User};
use crate::storage::Database;
use crate::tokens::{Passwords, SigningKey, TokenService};
use crate::AppState;

pub const TEST_SECRET: &str = "test-secret-key-that-is-long-enough-for-hs256";

/// Open a fresh database in a temporary directory.
///
/// Returns both the `Database` and the `TempDir` guard; the caller must
/// keep the `TempDir` alive for the duration of the test.
pub fn setup_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::open(temp_dir.path()).unwrap();
    (db, temp_dir)
}

/// A minimal `Config` suitable for unit tests.
pub fn test_config() -> Config {
    Config {
        http: HttpConfig::default(),
        node: NodeConfig {
            bind_address: "127.0.0.1:3000".to_string(),
            data_dir: "/tmp/test".to_string(),
        },
        sessions: SessionConfig::default(),
        test_mode: false,
        tokens: TokenConfig::new(SigningKey::new(TEST_SECRET)),
    }
}

/// Argon2id with the cheapest parameters the crate accepts.
pub fn test_passwords() -> Passwords {
    Passwords::with_cost(1024, 1, 1).unwrap()
}

/// Token service with the production lifetimes (15 minutes / 7 days) on the given clock.
pub fn test_token_service(clock: Arc<dyn Clock>) -> TokenService {
    TokenService::new(
        SigningKey::new(TEST_SECRET),
        clock,
        Duration::minutes(15),
        Duration::days(7),
    )
}

/// Build a full `Arc<AppState>` around the given database and clock.
pub fn test_state(db: Database, clock: Arc<ManualClock>) -> Arc<AppState> {
    Arc::new(AppState::new(test_config(), db, clock, test_passwords()))
}

/// Create a `User` with the given email and role. The password hash is a placeholder.
pub fn make_user(email: &str, role: Role) -> User {
    let now = Utc::now();
    User {
        created_at: now,
        email: email.to_string(),
        id: Uuid::new_v4(),
        is_premium: false,
        name: format!("user {email}"),
        password_hash: PasswordDigest::new("not-a-real-hash"),
        premium_expires_at: None,
        role,
        updated_at: now,
    }
}

/// Create a pending `Order` owned by `user_id`.
pub fn make_order(user_id: Uuid, item_type: ItemType) -> Order {
    let now = Utc::now();
    Order {
        amount: 49_000.0,
        created_at: now,
        id: Uuid::new_v4(),
        item_id: Uuid::new_v4(),
        item_type,
        payment_proof_url: None,
        status: OrderStatus::Pending,
        updated_at: now,
        user_id,
    }
}
