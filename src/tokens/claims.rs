//! Typed token payloads.
//!
//! Access and refresh tokens share a signing scheme but never a payload type: the role
//! exists only on [`AccessClaims`], and the `typ` field is checked on decode so one kind
//! can't be replayed as the other.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::storage::models::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Claims carried by a short-lived access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Device the session was opened from (per-device session policy only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub did: Option<String>,
    /// Expiry, seconds since the Unix epoch
    pub exp: i64,
    /// Issued-at, seconds since the Unix epoch
    pub iat: i64,
    pub jti: String,
    pub role: Role,
    /// Identity ID
    pub sub: String,
    pub typ: TokenType,
}

/// Claims carried by a refresh token. Deliberately role-free.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub did: Option<String>,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
    pub sub: String,
    pub typ: TokenType,
}

/// Common view over both claim sets, used by the generic signer/verifier.
pub trait Claims: Serialize + DeserializeOwned {
    const TYPE: TokenType;

    fn expires_at(&self) -> i64;
}

impl Claims for AccessClaims {
    const TYPE: TokenType = TokenType::Access;

    fn expires_at(&self) -> i64 {
        self.exp
    }
}

impl Claims for RefreshClaims {
    const TYPE: TokenType = TokenType::Refresh;

    fn expires_at(&self) -> i64 {
        self.exp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_claims_reject_role_shape_mismatch() {
        // An access payload decodes as refresh claims (extra fields are ignored) but keeps
        // its own type tag, which is what the verifier checks.
        let access = AccessClaims {
            did: None,
            exp: 10,
            iat: 0,
            jti: "j".to_string(),
            role: Role::Admin,
            sub: "u1".to_string(),
            typ: TokenType::Access,
        };
        let json = serde_json::to_vec(&access).unwrap();
        let as_refresh: RefreshClaims = serde_json::from_slice(&json).unwrap();
        assert_eq!(as_refresh.typ, TokenType::Access);
    }

    #[test]
    fn test_device_claim_omitted_when_absent() {
        let claims = RefreshClaims {
            did: None,
            exp: 10,
            iat: 0,
            jti: "j".to_string(),
            sub: "u1".to_string(),
            typ: TokenType::Refresh,
        };
        let json = serde_json::to_string(&claims).unwrap();
        assert!(!json.contains("did"));
        assert!(json.contains("\"typ\":\"refresh\""));
    }
}
