use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tickerchat_core::Identity;

use crate::AuthError;

/// Claims carried by an issued token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: i64,
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

/// HS256 token issuer and verifier.
#[derive(Clone)]
pub struct JwtAuth {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for JwtAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtAuth")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl JwtAuth {
    /// Tokens valid for one day.
    pub fn new(secret: &str) -> Self {
        Self::with_ttl(secret, Duration::days(1))
    }

    pub fn with_ttl(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    /// Issue a token for `identity`.
    pub fn issue_token(&self, identity: &Identity) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            id: identity.id,
            username: identity.username.clone(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Token(e.to_string()))
    }

    /// Verify a token and return who it was issued to.
    pub fn verify_token(&self, token: &str) -> Result<Identity, AuthError> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        Ok(Identity {
            id: data.claims.id,
            username: data.claims.username,
        })
    }
}

/// Extracts the bearer token from an Authorization header value.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Identity {
        Identity {
            id: 1,
            username: "alice".to_string(),
        }
    }

    #[test]
    fn test_issue_and_verify() {
        let auth = JwtAuth::new("test-secret");
        let token = auth.issue_token(&alice()).unwrap();
        assert_eq!(auth.verify_token(&token).unwrap(), alice());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = JwtAuth::new("one").issue_token(&alice()).unwrap();
        let result = JwtAuth::new("two").verify_token(&token);
        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn test_expired_token_rejected() {
        let auth = JwtAuth::with_ttl("test-secret", Duration::hours(-2));
        let token = auth.issue_token(&alice()).unwrap();
        assert!(auth.verify_token(&token).is_err());
    }

    #[test]
    fn test_garbage_token_rejected() {
        let auth = JwtAuth::new("test-secret");
        assert!(auth.verify_token("not-a-token").is_err());
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc123"), Some("abc123"));
        assert_eq!(extract_bearer_token("bearer xyz789"), Some("xyz789"));
        assert_eq!(extract_bearer_token("Bearer "), None);
        assert_eq!(extract_bearer_token("Basic abc123"), None);
    }
}
