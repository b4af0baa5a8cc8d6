//! Authentication: signed bearer tokens and password hashing.

pub mod password;
pub mod token;

pub use password::{hash_password, verify_password};
pub use token::{extract_bearer_token, Claims, JwtAuth};

/// Errors from token or password handling.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("Token encoding failed: {0}")]
    Token(String),
    #[error("Password hashing failed: {0}")]
    Hash(String),
}
