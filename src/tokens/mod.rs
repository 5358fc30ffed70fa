pub mod claims;
pub mod generator;
pub mod password;
pub mod service;

pub use claims::{AccessClaims, RefreshClaims, TokenType};
pub use password::{PasswordError, Passwords};
pub use service::{IssuedToken, SigningKey, TokenError, TokenPair, TokenService};
