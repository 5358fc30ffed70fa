use redb::TableDefinition;

/// Identities: user_id -> User (msgpack)
pub const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

/// Unique index: normalized email -> user_id
pub const USER_EMAILS: TableDefinition<&str, &str> = TableDefinition::new("user_emails");

/// Orders: order_id -> Order (msgpack)
pub const ORDERS: TableDefinition<&str, &[u8]> = TableDefinition::new("orders");

/// Secondary index: user_id -> Vec<order_id> (for listing orders by owner)
pub const USER_ORDERS: TableDefinition<&str, &[u8]> = TableDefinition::new("user_orders");

/// Session cache: session key -> CachedSession (msgpack)
pub const SESSIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("sessions");

/// Expiration index: "{expires_ms:020}:{session_key}" -> session key
pub const SESSION_EXPIRY: TableDefinition<&str, &str> = TableDefinition::new("session_expiry");
