//! Master password to vault key, via Argon2id.
//!
//! The same password and salt always yield the same 256-bit key, so the salt
//! has to outlive every secret encrypted under it.

use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::keys::{MasterKey, Salt, KEY_LENGTH};
use vaultbox_common::{Error, Result};

/// Parameters for Argon2id key derivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB (e.g., 65536 = 64 MiB).
    pub memory_cost: u32,
    /// Number of iterations.
    pub time_cost: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl KdfParams {
    /// Parameters used for every vault unless configured otherwise.
    ///
    /// One pass over 64 MiB with four lanes.
    pub fn standard() -> Self {
        Self {
            memory_cost: 65536, // 64 MiB
            time_cost: 1,
            parallelism: 4,
        }
    }

    /// Cheap parameters for tests and constrained hosts.
    ///
    /// Not suitable for protecting real data.
    pub fn lightweight() -> Self {
        Self {
            memory_cost: 1024, // 1 MiB
            time_cost: 1,
            parallelism: 1,
        }
    }

    /// Check that the parameters are usable.
    ///
    /// # Errors
    /// - Returns a validation error if any cost is zero
    pub fn validate(&self) -> Result<()> {
        if self.memory_cost == 0 || self.time_cost == 0 || self.parallelism == 0 {
            return Err(Error::Validation(
                "KDF costs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::standard()
    }
}

/// Derive a master key from a password and salt using Argon2id.
///
/// # Preconditions
/// - `password` must not be empty
///
/// # Postconditions
/// - The derived key is deterministic given the same inputs
///
/// # Errors
/// - Returns a validation error if password is empty
/// - Returns an encryption error if Argon2id parameters are invalid
pub fn derive_key(password: &[u8], salt: &Salt, params: &KdfParams) -> Result<MasterKey> {
    if password.is_empty() {
        return Err(Error::Validation("Password cannot be empty".to_string()));
    }

    let argon2_params = Params::new(
        params.memory_cost,
        params.time_cost,
        params.parallelism,
        Some(KEY_LENGTH),
    )
    .map_err(|e| Error::Encryption(format!("Invalid KDF parameters: {}", e)))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key_bytes = [0u8; KEY_LENGTH];
    let key = argon2
        .hash_password_into(password, salt.as_bytes(), &mut key_bytes)
        .map(|()| MasterKey::from_bytes(key_bytes))
        .map_err(|e| Error::Encryption(format!("Key derivation failed: {}", e)));

    // The stack copy must not outlive the call.
    key_bytes.zeroize();

    key
}

/// Generate a fresh salt for a new vault.
pub fn generate_salt() -> Result<Salt> {
    Salt::generate()
}
