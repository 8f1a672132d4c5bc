//! JWT service for session token issuance and verification
//!
//! Tokens are HS256-signed and carry the account id, issue time, expiry and
//! a unique token id. They are stateless: nothing is stored server side and
//! a token stays valid until it expires.

use anyhow::Result;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Default token lifetime: 7 days
pub const DEFAULT_TOKEN_EXPIRY: u64 = 7 * 24 * 60 * 60;

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Shared secret used to sign and verify tokens
    pub secret: String,
    /// Token expiration time in seconds (default: 7 days)
    pub token_expiry: u64,
}

impl JwtConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            token_expiry: DEFAULT_TOKEN_EXPIRY,
        }
    }

    /// Create a new JwtConfig from environment variables
    ///
    /// # Environment Variables
    /// - `JWT_SECRET`: Signing secret (required)
    /// - `JWT_EXPIRY_SECONDS`: Token expiry in seconds (default: 604800)
    pub fn from_env() -> Result<Self> {
        let secret = std::env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable not set"))?;

        let token_expiry = std::env::var("JWT_EXPIRY_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TOKEN_EXPIRY);

        Ok(JwtConfig {
            secret,
            token_expiry,
        })
    }
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Account ID
    pub sub: Uuid,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
    /// Token ID
    pub jti: Uuid,
}

/// Token verification failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token signature or encoding is invalid")]
    Invalid,
    #[error("Token has expired")]
    Expired,
}

/// JWT service
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    config: JwtConfig,
}

/// Seconds since the Unix epoch
pub fn unix_now() -> Result<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| anyhow::anyhow!("Failed to get current time: {}", e))?
        .as_secs())
}

impl JwtService {
    /// Initialize a new JWT service
    pub fn new(config: JwtConfig) -> Result<Self> {
        if config.secret.is_empty() {
            anyhow::bail!("JWT secret must not be empty");
        }

        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        // Expiry is checked against the caller's clock in `verify_at`
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(JwtService {
            encoding_key,
            decoding_key,
            validation,
            config,
        })
    }

    /// Issue a token for an account, valid from now
    pub fn issue(&self, account_id: Uuid) -> Result<String> {
        self.issue_at(account_id, unix_now()?)
    }

    /// Issue a token as if the current time were `now`
    pub fn issue_at(&self, account_id: Uuid, now: u64) -> Result<String> {
        let exp = now
            .checked_add(self.config.token_expiry)
            .ok_or_else(|| anyhow::anyhow!("Token expiry overflows the clock"))?;

        let claims = Claims {
            sub: account_id,
            iat: now,
            exp,
            jti: Uuid::new_v4(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok(token)
    }

    /// Verify a token and return the account id it was issued for
    pub fn verify(&self, token: &str) -> Result<Uuid, TokenError> {
        let now = unix_now().map_err(|_| TokenError::Invalid)?;
        self.verify_at(token, now)
    }

    /// Verify a token against the clock value `now`
    pub fn verify_at(&self, token: &str, now: u64) -> Result<Uuid, TokenError> {
        let claims = self.decode_claims(token)?;

        if now > claims.exp {
            debug!("Rejected token {} expired at {}", claims.jti, claims.exp);
            return Err(TokenError::Expired);
        }

        Ok(claims.sub)
    }

    /// Decode and check the signature without looking at the expiry
    pub fn decode_claims(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("Rejected token: {}", e);
                TokenError::Invalid
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const HOUR: u64 = 60 * 60;
    const DAY: u64 = 24 * HOUR;
    const T: u64 = 1_700_000_000;

    fn service() -> JwtService {
        JwtService::new(JwtConfig::new("test-secret")).unwrap()
    }

    #[test]
    fn test_issued_token_verifies_to_account() {
        let jwt = service();
        let account_id = Uuid::new_v4();

        let token = jwt.issue(account_id).unwrap();
        assert_eq!(jwt.verify(&token), Ok(account_id));
    }

    #[test]
    fn test_token_lifetime_boundaries() {
        let jwt = service();
        let account_id = Uuid::new_v4();
        let token = jwt.issue_at(account_id, T).unwrap();

        assert_eq!(jwt.verify_at(&token, T + 6 * DAY + 23 * HOUR), Ok(account_id));
        assert_eq!(jwt.verify_at(&token, T + 7 * DAY), Ok(account_id));
        assert_eq!(
            jwt.verify_at(&token, T + 7 * DAY + HOUR),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn test_tokens_for_same_account_differ() {
        let jwt = service();
        let account_id = Uuid::new_v4();

        let first = jwt.issue_at(account_id, T).unwrap();
        let second = jwt.issue_at(account_id, T).unwrap();
        assert_ne!(first, second);
        assert_eq!(jwt.verify_at(&first, T), jwt.verify_at(&second, T));
    }

    #[test]
    fn test_expiry_past_the_clock_range_is_rejected() {
        let jwt = JwtService::new(JwtConfig {
            secret: "test-secret".to_string(),
            token_expiry: u64::MAX,
        })
        .unwrap();

        assert!(jwt.issue_at(Uuid::new_v4(), T).is_err());
    }

    #[test]
    fn test_foreign_signature_is_invalid() {
        let other = JwtService::new(JwtConfig::new("another-secret")).unwrap();
        let token = other.issue(Uuid::new_v4()).unwrap();

        assert_eq!(service().verify(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn test_tampered_token_is_invalid() {
        let jwt = service();
        let token = jwt.issue(Uuid::new_v4()).unwrap();
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        parts[1] = format!("{}A", parts[1]);

        assert_eq!(jwt.verify(&parts.join(".")), Err(TokenError::Invalid));
        assert_eq!(jwt.verify("not-a-token"), Err(TokenError::Invalid));
    }

    #[test]
    fn test_empty_secret_is_rejected() {
        assert!(JwtService::new(JwtConfig::new("")).is_err());
    }

    #[test]
    #[serial]
    fn test_jwt_config_from_env() {
        unsafe {
            std::env::set_var("JWT_SECRET", "env-secret");
            std::env::remove_var("JWT_EXPIRY_SECONDS");
        }

        let config = JwtConfig::from_env().unwrap();
        assert_eq!(config.secret, "env-secret");
        assert_eq!(config.token_expiry, DEFAULT_TOKEN_EXPIRY);

        unsafe {
            std::env::remove_var("JWT_SECRET");
        }
        assert!(JwtConfig::from_env().is_err());
    }
}
