//! PIN validation and hashing
//!
//! The PIN is never held or persisted in plaintext. It is hashed with
//! Argon2id into a PHC string, which is what the `pin` storage key holds.

use std::fmt;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use zeroize::Zeroizing;

use crate::config::HashingConfig;
use crate::error::{GuardError, Result};

/// Minimum PIN length, in characters
pub const MIN_PIN_LENGTH: usize = 4;

/// Check that a PIN satisfies the length rule
pub fn validate_pin(pin: &str) -> Result<()> {
    if pin.chars().count() < MIN_PIN_LENGTH {
        return Err(GuardError::PinTooShort(MIN_PIN_LENGTH));
    }
    Ok(())
}

/// Argon2id PHC string of a PIN
#[derive(Clone, PartialEq, Eq)]
pub struct PinHash(String);

impl PinHash {
    /// Hash a PIN with the given cost parameters
    pub fn create(pin: &str, hashing: &HashingConfig) -> Result<Self> {
        let params = Params::new(
            hashing.memory_kib,
            hashing.iterations,
            hashing.parallelism,
            None,
        )
        .map_err(|e| GuardError::Hashing(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let salt = SaltString::generate(&mut OsRng);
        let pin_bytes = Zeroizing::new(pin.as_bytes().to_vec());

        let hash = argon2
            .hash_password(&pin_bytes, &salt)
            .map_err(|e| GuardError::Hashing(e.to_string()))?
            .to_string();

        Ok(Self(hash))
    }

    /// Accept a stored value if it is an Argon2 PHC string
    pub fn parse(stored: &str) -> Option<Self> {
        let parsed = PasswordHash::new(stored).ok()?;
        if !parsed.algorithm.as_str().starts_with("argon2") {
            return None;
        }
        Some(Self(stored.to_string()))
    }

    /// Constant-time check of a candidate PIN against this hash
    pub fn verify(&self, candidate: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(&self.0) else {
            return false;
        };
        let candidate = Zeroizing::new(candidate.as_bytes().to_vec());
        // Cost parameters are read back from the PHC string
        Argon2::default()
            .verify_password(&candidate, &parsed)
            .is_ok()
    }

    /// The PHC string, as persisted
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PinHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PinHash(..)")
    }
}
