use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Access role carried by an identity and by its access tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(format!("invalid role: {other}")),
        }
    }
}

/// Argon2 PHC string of an identity's password.
///
/// Written out in full only to non-human-readable formats (the MessagePack rows in redb);
/// JSON and `Debug` see `[REDACTED]`.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct PasswordDigest(String);

impl PasswordDigest {
    pub fn new(phc: impl Into<String>) -> Self {
        Self(phc.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Serialize for PasswordDigest {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(REDACTED)
        } else {
            serializer.serialize_str(&self.0)
        }
    }
}

impl fmt::Debug for PasswordDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

const REDACTED: &str = "[REDACTED]";

/// A registered identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub created_at: DateTime<Utc>,
    /// Normalized (trimmed, lowercase) and globally unique
    pub email: String,
    pub id: Uuid,
    pub is_premium: bool,
    pub name: String,
    pub password_hash: PasswordDigest,
    /// `None` with `is_premium` set means a grant with no end date
    pub premium_expires_at: Option<DateTime<Utc>>,
    pub role: Role,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether the premium entitlement is in force at `now`.
    pub fn premium_active_at(&self, now: DateTime<Utc>) -> bool {
        self.is_premium && self.premium_expires_at.map_or(true, |exp| exp > now)
    }
}

/// What an order buys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ItemType {
    PremiumMonthly,
    PremiumYearly,
    Test,
    /// Item types from before premium windows existed; kept verbatim
    Legacy(String),
}

impl ItemType {
    pub fn as_str(&self) -> &str {
        match self {
            ItemType::PremiumMonthly => "premium_monthly",
            ItemType::PremiumYearly => "premium_yearly",
            ItemType::Test => "test",
            ItemType::Legacy(s) => s,
        }
    }
}

impl From<String> for ItemType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "premium_monthly" => ItemType::PremiumMonthly,
            "premium_yearly" => ItemType::PremiumYearly,
            "test" => ItemType::Test,
            _ => ItemType::Legacy(s),
        }
    }
}

impl From<ItemType> for String {
    fn from(item: ItemType) -> Self {
        match item {
            ItemType::Legacy(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

/// Order lifecycle. Only ever moves pending -> completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Completed,
    #[default]
    Pending,
}

/// A purchase awaiting (or past) manual payment verification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub amount: f64,
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
    pub item_id: Uuid,
    pub item_type: ItemType,
    pub payment_proof_url: Option<String>,
    pub status: OrderStatus,
    pub updated_at: DateTime<Utc>,
    /// Owning identity
    pub user_id: Uuid,
}

/// A session cache entry: the refresh token currently valid for one session key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedSession {
    pub expires_at: DateTime<Utc>,
    pub value: String,
}
