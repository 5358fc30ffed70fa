//! Minting and verification of signed bearer tokens.
//!
//! Tokens are JWS compact serializations (`header.payload.signature`, base64url without
//! padding) signed with HMAC-SHA256. The verifier only accepts `alg: HS256`; any other
//! header algorithm, `none` included, is rejected before the signature is looked at.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use super::claims::{AccessClaims, Claims, RefreshClaims, TokenType};
use super::generator::generate_token_id;
use crate::clock::Clock;
use crate::storage::models::Role;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "HS256";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("expected {expected:?} token, got {got:?}")]
    WrongType { expected: TokenType, got: TokenType },
}

/// HMAC secret shared by access and refresh tokens
#[derive(Clone)]
pub struct SigningKey(Arc<[u8]>);

impl SigningKey {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self(Arc::from(secret.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.0).expect("HMAC can take key of any size")
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningKey([REDACTED])")
    }
}

#[derive(Deserialize)]
struct TypeView {
    typ: TokenType,
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    #[serde(default)]
    typ: Option<String>,
}

/// A signed token and when it stops being accepted
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub expires_at: DateTime<Utc>,
    pub token: String,
}

/// The pair handed out at login
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

#[derive(Clone)]
pub struct TokenService {
    access_ttl: Duration,
    clock: Arc<dyn Clock>,
    key: SigningKey,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(
        key: SigningKey,
        clock: Arc<dyn Clock>,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            access_ttl,
            clock,
            key,
            refresh_ttl,
        }
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Mint a fresh access + refresh pair for an identity
    pub fn mint(
        &self,
        identity_id: &str,
        role: Role,
        device: Option<&str>,
    ) -> Result<TokenPair, TokenError> {
        let access = self.mint_access(identity_id, role, device)?;

        let now = self.clock.now();
        let expires_at = now + self.refresh_ttl;
        let claims = RefreshClaims {
            did: device.map(str::to_string),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            jti: generate_token_id(),
            sub: identity_id.to_string(),
            typ: TokenType::Refresh,
        };
        let refresh = IssuedToken {
            expires_at: from_timestamp(claims.exp),
            token: self.sign(&claims)?,
        };

        Ok(TokenPair { access, refresh })
    }

    /// Mint an access token only (used on refresh; refresh tokens are not rotated)
    pub fn mint_access(
        &self,
        identity_id: &str,
        role: Role,
        device: Option<&str>,
    ) -> Result<IssuedToken, TokenError> {
        let now = self.clock.now();
        let expires_at = now + self.access_ttl;
        let claims = AccessClaims {
            did: device.map(str::to_string),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            jti: generate_token_id(),
            role,
            sub: identity_id.to_string(),
            typ: TokenType::Access,
        };

        Ok(IssuedToken {
            expires_at: from_timestamp(claims.exp),
            token: self.sign(&claims)?,
        })
    }

    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        self.verify(token)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        self.verify(token)
    }

    fn sign<C: Claims>(&self, claims: &C) -> Result<String, TokenError> {
        let header = Header {
            alg: ALGORITHM.to_string(),
            typ: Some("JWT".to_string()),
        };
        let header_json =
            serde_json::to_vec(&header).map_err(|e| TokenError::Malformed(e.to_string()))?;
        let claims_json =
            serde_json::to_vec(claims).map_err(|e| TokenError::Malformed(e.to_string()))?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header_json),
            URL_SAFE_NO_PAD.encode(claims_json)
        );

        let mut mac = self.key.mac();
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();

        Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature)))
    }

    fn verify<C: Claims>(&self, token: &str) -> Result<C, TokenError> {
        let mut parts = token.split('.');
        let (header_b64, claims_b64, signature_b64) =
            match (parts.next(), parts.next(), parts.next(), parts.next()) {
                (Some(h), Some(c), Some(s), None) => (h, c, s),
                _ => return Err(TokenError::Malformed("expected three segments".to_string())),
            };

        // Pin the algorithm before trusting anything else in the token
        let header: Header = decode_segment(header_b64)?;
        if header.alg != ALGORITHM {
            return Err(TokenError::UnsupportedAlgorithm(header.alg));
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|e| TokenError::Malformed(e.to_string()))?;

        let mut mac = self.key.mac();
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(claims_b64.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        // Type tag first: refresh claims carry no role, so a full decode would fail as Malformed
        let TypeView { typ } = decode_segment(claims_b64)?;
        if typ != C::TYPE {
            return Err(TokenError::WrongType {
                expected: C::TYPE,
                got: typ,
            });
        }
        let claims: C = decode_segment(claims_b64)?;

        if self.clock.now().timestamp() >= claims.expires_at() {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}

fn decode_segment<T: serde::de::DeserializeOwned>(segment: &str) -> Result<T, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| TokenError::Malformed(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| TokenError::Malformed(e.to_string()))
}

fn from_timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
