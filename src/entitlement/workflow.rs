//! Orders and the premium entitlements they pay for.
//!
//! Orders are created by their owner, get a payment-proof URL attached, and are verified
//! by an admin. Verification grants (or re-extends) the owner's premium window and marks
//! the order completed in a single storage transaction.

use chrono::{DateTime, Months, Utc};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::clock::Clock;
use crate::session::AuthContext;
use crate::storage::models::{ItemType, Order, OrderStatus, User};
use crate::storage::{Database, DatabaseError, GrantOutcome};

/// Horizon used for item types that predate expiring premium windows
const LEGACY_GRANT_YEARS: u32 = 100;

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("access denied")]
    Forbidden,
    #[error("{0}")]
    InvalidFormat(String),
    #[error("{0} not found")]
    NotFound(&'static str),
}

/// Order creation input
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub amount: f64,
    pub item_id: String,
    pub item_type: String,
}

/// Result of a successful verification
#[derive(Debug, Clone)]
pub struct Entitlement {
    pub order: Order,
    pub user: User,
}

pub struct EntitlementWorkflow {
    clock: Arc<dyn Clock>,
    db: Database,
}

impl EntitlementWorkflow {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self { clock, db }
    }

    pub fn create_order(&self, owner: Uuid, new: NewOrder) -> Result<Order, OrderError> {
        let item_type = new.item_type.trim();
        if item_type.is_empty() {
            return Err(OrderError::InvalidFormat("item_type is required".to_string()));
        }
        let item_id = Uuid::parse_str(new.item_id.trim())
            .map_err(|_| OrderError::InvalidFormat("invalid item id format".to_string()))?;
        if !new.amount.is_finite() || new.amount <= 0.0 {
            return Err(OrderError::InvalidFormat(
                "amount must be greater than 0".to_string(),
            ));
        }

        let now = self.clock.now();
        let order = Order {
            amount: new.amount,
            created_at: now,
            id: Uuid::new_v4(),
            item_id,
            item_type: ItemType::from(item_type.to_string()),
            payment_proof_url: None,
            status: OrderStatus::Pending,
            updated_at: now,
            user_id: owner,
        };
        self.db.put_order(&order)?;

        tracing::debug!(order_id = %order.id, user_id = %owner, item_type = %order.item_type.as_str(), "Created order");
        Ok(order)
    }

    /// Attach a payment-proof URL. Only the owner or an admin may do this.
    pub fn attach_payment_proof(
        &self,
        order_id: &str,
        url: &str,
        caller: &AuthContext,
    ) -> Result<Order, OrderError> {
        let url = url.trim();
        if !(url.starts_with("https://") || url.starts_with("http://"))
            || url.chars().any(char::is_whitespace)
        {
            return Err(OrderError::InvalidFormat("url must be an http(s) URL".to_string()));
        }

        // The owner never changes, so this check can read outside the write
        let order = self.load_order(order_id)?;
        if !caller.can_access(order.user_id) {
            return Err(OrderError::Forbidden);
        }

        let now = self.clock.now();
        let order = self
            .db
            .update_order(&order.id.to_string(), |order| {
                order.payment_proof_url = Some(url.to_string());
                order.updated_at = now;
            })?
            .ok_or(OrderError::NotFound("order"))?;

        tracing::debug!(order_id = %order.id, "Attached payment proof");
        Ok(order)
    }

    /// Grant the owner premium access for what the order bought and mark it completed.
    ///
    /// The order and its owner are read and written in one storage transaction, so a
    /// concurrent proof upload or admin edit can't overwrite the grant with a stale copy.
    /// Re-verifying a completed order succeeds and restarts the window from now.
    pub fn verify_order(&self, order_id: &str) -> Result<Entitlement, OrderError> {
        let id = parse_order_id(order_id)?;
        let now = self.clock.now();

        let outcome = self.db.commit_entitlement(&id, |user, order| {
            if order.status == OrderStatus::Completed {
                tracing::warn!(order_id = %order.id, "Re-verifying completed order; extending premium window again");
            }

            user.is_premium = true;
            user.premium_expires_at = Some(premium_expiry(&order.item_type, now));
            user.updated_at = now;

            order.status = OrderStatus::Completed;
            order.updated_at = now;
        })?;

        let (order, user) = match outcome {
            GrantOutcome::Granted { order, user } => (order, user),
            GrantOutcome::OrderMissing => return Err(OrderError::NotFound("order")),
            GrantOutcome::UserMissing => return Err(OrderError::NotFound("user for this order")),
        };

        tracing::info!(
            order_id = %order.id,
            user_id = %user.id,
            premium_expires_at = ?user.premium_expires_at,
            "Verified order and granted premium"
        );
        Ok(Entitlement { order, user })
    }

    /// Orders owned by `user_id`, visible to that user and to admins
    pub fn orders_for_user(
        &self,
        user_id: &str,
        caller: &AuthContext,
    ) -> Result<Vec<Order>, OrderError> {
        let owner = Uuid::parse_str(user_id)
            .map_err(|_| OrderError::InvalidFormat("invalid user id format".to_string()))?;
        if !caller.can_access(owner) {
            return Err(OrderError::Forbidden);
        }
        Ok(self.db.get_orders_by_user(&owner.to_string())?)
    }

    pub fn all_orders(&self) -> Result<Vec<Order>, OrderError> {
        Ok(self.db.get_all_orders()?)
    }

    fn load_order(&self, order_id: &str) -> Result<Order, OrderError> {
        self.db
            .get_order(&parse_order_id(order_id)?)?
            .ok_or(OrderError::NotFound("order"))
    }
}

/// Canonical form of an order ID from a path segment
fn parse_order_id(order_id: &str) -> Result<String, OrderError> {
    Uuid::parse_str(order_id)
        .map(|id| id.to_string())
        .map_err(|_| OrderError::InvalidFormat("invalid order id format".to_string()))
}

/// When a premium grant bought with `item_type` at `now` runs out
pub fn premium_expiry(item_type: &ItemType, now: DateTime<Utc>) -> DateTime<Utc> {
    let months = match item_type {
        ItemType::PremiumMonthly => 1,
        ItemType::PremiumYearly => 12,
        ItemType::Test | ItemType::Legacy(_) => LEGACY_GRANT_YEARS * 12,
    };
    now.checked_add_months(Months::new(months))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
