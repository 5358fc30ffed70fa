use uuid::Uuid;

use crate::storage::models::Role;

/// Identity attached to a request once its access token has been verified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub device_id: Option<String>,
    pub identity_id: Uuid,
    pub role: Role,
}

impl AuthContext {
    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    /// Whether this caller may act on resources owned by `owner`
    pub fn can_access(&self, owner: Uuid) -> bool {
        self.is_admin() || self.identity_id == owner
    }
}
