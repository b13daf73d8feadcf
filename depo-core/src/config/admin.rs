//! Admin API credentials.

use argon2::password_hash::{SaltString, rand_core::OsRng};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

/// The argon2 PHC string guarding the admin API.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub secret_hash: String,
}

impl AdminConfig {
    pub fn new(secret_hash: String) -> Self {
        Self { secret_hash }
    }

    /// Hash a plaintext secret with a fresh salt.
    pub fn hash_secret(plaintext: &str) -> Result<String, argon2::password_hash::Error> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
    }

    /// Whether `value` is already a PHC hash rather than a plaintext secret.
    pub fn is_hashed(value: &str) -> bool {
        PasswordHash::new(value).is_ok()
    }

    /// Check the `Depo-Admin-Authorization` value against the stored hash.
    ///
    /// An unparsable stored hash rejects everything.
    pub fn verify_secret(&self, plaintext: &str) -> bool {
        let Ok(parsed_hash) = PasswordHash::new(&self.secret_hash) else {
            return false;
        };
        Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed_hash)
            .is_ok()
    }
}
