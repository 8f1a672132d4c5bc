//! Password hashing
//!
//! Argon2id with a random salt per password. Hashes are stored as PHC
//! strings, which embed the algorithm version and parameters.

use anyhow::Result;
use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::SaltString,
};

/// Argon2 cost parameters
#[derive(Debug, Clone)]
pub struct HashingConfig {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Number of passes
    pub iterations: u32,
    /// Degree of parallelism
    pub parallelism: u32,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

/// Password hasher
#[derive(Debug, Clone)]
pub struct PasswordService {
    params: Params,
    /// Hash of a throwaway password, verified against when no account
    /// matches so unknown emails cost as much as wrong passwords
    dummy_hash: String,
}

impl PasswordService {
    pub fn new(config: &HashingConfig) -> Result<Self> {
        let params = Params::new(
            config.memory_kib,
            config.iterations,
            config.parallelism,
            None,
        )
        .map_err(|e| anyhow::anyhow!("Invalid Argon2 parameters: {}", e))?;

        let mut service = Self {
            params,
            dummy_hash: String::new(),
        };
        service.dummy_hash = service.hash("unused-account-placeholder")?;

        Ok(service)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a password with a fresh salt
    pub fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut rand::thread_rng());
        let password_hash = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
            .to_string();

        Ok(password_hash)
    }

    /// Verify a password against a stored hash.
    ///
    /// The parameters encoded in the stored hash are used, so hashes made
    /// with older settings keep verifying after the configuration changes.
    pub fn verify(&self, password: &str, password_hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(password_hash)
            .map_err(|e| anyhow::anyhow!("Failed to parse password hash: {}", e))?;

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Spend one verification on the placeholder hash and discard the result
    pub fn verify_dummy(&self, password: &str) {
        let _ = self.verify(password, &self.dummy_hash);
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn light() -> PasswordService {
        PasswordService::new(&HashingConfig {
            memory_kib: 8 * 1024,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap()
    }

    fn standard() -> PasswordService {
        PasswordService::new(&HashingConfig::default()).unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let service = standard();
        let hash = service.hash("secret1").unwrap();

        assert!(hash.starts_with("$argon2id$v=19$"));
        assert!(service.verify("secret1", &hash).unwrap());
        assert!(!service.verify("secret2", &hash).unwrap());
    }

    #[test]
    fn test_same_password_gets_distinct_salts() {
        let service = light();
        let first = service.hash("secret1").unwrap();
        let second = service.hash("secret1").unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn test_hash_from_other_parameters_still_verifies() {
        let hash = light().hash("secret1").unwrap();

        assert!(standard().verify("secret1", &hash).unwrap());
    }

    #[test]
    fn test_malformed_hash_is_an_error() {
        assert!(light().verify("secret1", "plain").is_err());
    }

    #[test]
    fn test_placeholder_hash_uses_configured_cost() {
        let service = light();
        let parsed = PasswordHash::new(&service.dummy_hash).unwrap();

        assert_eq!(parsed.params.get_decimal("m"), Some(8 * 1024));
        assert_eq!(parsed.params.get_decimal("t"), Some(1));
        assert!(!service.verify("unused-account", &service.dummy_hash).unwrap());
        service.verify_dummy("anything");
    }
}
