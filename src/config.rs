use thiserror::Error;

use crate::session::SessionPolicy;
use crate::tokens::SigningKey;

/// Shortest signing key accepted outside test mode (HS256 wants at least the hash width)
const MIN_SIGNING_KEY_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http: HttpConfig,
    pub node: NodeConfig,
    pub sessions: SessionConfig,
    /// Relaxes signing key validation. Must never be true in production.
    pub test_mode: bool,
    pub tokens: TokenConfig,
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub bind_address: String,
    pub data_dir: String,
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Origin allowed to make credentialed cross-origin requests
    pub cors_origin: String,
    /// Adds `Secure` to every cookie we set
    pub cookie_secure: bool,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub policy: SessionPolicy,
    pub sweep_interval_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub access_ttl_seconds: u64,
    pub refresh_ttl_seconds: u64,
    pub signing_key: SigningKey,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            cors_origin: "http://localhost:5173".to_string(),
            cookie_secure: false,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            policy: SessionPolicy::SingleSession,
            sweep_interval_seconds: 60,
        }
    }
}

impl TokenConfig {
    pub fn new(signing_key: SigningKey) -> Self {
        Self {
            access_ttl_seconds: 900,       // 15 minutes
            refresh_ttl_seconds: 604_800, // 7 days
            signing_key,
        }
    }

    pub fn access_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.access_ttl_seconds as i64)
    }

    pub fn refresh_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.refresh_ttl_seconds as i64)
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string());

        let secret = std::env::var("JWT_SECRET_KEY").map_err(|_| {
            ConfigError::ValidationError("JWT_SECRET_KEY must be set".to_string())
        })?;

        let test_mode = env_flag("TEST_MODE");

        let policy = match std::env::var("SESSION_POLICY") {
            Ok(value) => value.parse().map_err(ConfigError::ValidationError)?,
            Err(_) => SessionPolicy::default(),
        };

        let mut tokens = TokenConfig::new(SigningKey::new(secret.as_bytes()));
        tokens.access_ttl_seconds = env_number("ACCESS_TOKEN_TTL_SECONDS", 900)?;
        tokens.refresh_ttl_seconds = env_number("REFRESH_TOKEN_TTL_SECONDS", 604_800)?;

        let config = Config {
            http: HttpConfig {
                cors_origin: std::env::var("CORS_ORIGIN")
                    .unwrap_or_else(|_| HttpConfig::default().cors_origin),
                cookie_secure: env_flag("COOKIE_SECURE"),
            },
            node: NodeConfig {
                bind_address,
                data_dir,
            },
            sessions: SessionConfig {
                policy,
                sweep_interval_seconds: env_number("SESSION_SWEEP_INTERVAL_SECONDS", 60)?,
            },
            test_mode,
            tokens,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tokens.signing_key.is_empty() {
            return Err(ConfigError::ValidationError(
                "JWT_SECRET_KEY cannot be empty".to_string(),
            ));
        }

        if self.tokens.signing_key.len() < MIN_SIGNING_KEY_BYTES {
            if !self.test_mode {
                return Err(ConfigError::ValidationError(format!(
                    "JWT_SECRET_KEY must be at least {MIN_SIGNING_KEY_BYTES} bytes"
                )));
            }
            tracing::warn!("Short JWT_SECRET_KEY accepted because TEST_MODE is enabled");
        }

        if self.tokens.access_ttl_seconds == 0 || self.tokens.refresh_ttl_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "token TTLs must be greater than zero".to_string(),
            ));
        }

        if self.tokens.access_ttl_seconds > self.tokens.refresh_ttl_seconds {
            tracing::warn!(
                "ACCESS_TOKEN_TTL_SECONDS ({}) exceeds REFRESH_TOKEN_TTL_SECONDS ({})",
                self.tokens.access_ttl_seconds,
                self.tokens.refresh_ttl_seconds
            );
        }

        if self.sessions.sweep_interval_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "SESSION_SWEEP_INTERVAL_SECONDS must be greater than zero".to_string(),
            ));
        }

        if self.http.cors_origin.parse::<axum::http::HeaderValue>().is_err() {
            return Err(ConfigError::ValidationError(format!(
                "CORS_ORIGIN is not a valid header value: {}",
                self.http.cors_origin
            )));
        }

        Ok(())
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false)
}

fn env_number(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::ValidationError(format!("{name} must be a number"))),
        Err(_) => Ok(default),
    }
}
