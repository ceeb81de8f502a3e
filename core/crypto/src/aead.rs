//! Authenticated encryption using AES-256-GCM.
//!
//! Every call to [`encrypt`] draws a fresh 96-bit nonce from the OS CSPRNG
//! and prepends it to the sealed payload:
//!
//! ```text
//! [ 12-byte nonce | ciphertext | 16-byte tag ]
//! ```
//!
//! The cipher holds no state; callers supply the key on every call.

use aes_gcm::aead::{rand_core::RngCore, Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};

use crate::keys::KEY_LENGTH;
use vaultbox_common::{DecryptionFailure, Error, Result, SensitiveBytes};

/// Nonce size for AES-256-GCM (12 bytes).
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size (16 bytes).
pub const TAG_SIZE: usize = 16;

fn cipher_for(key: &[u8]) -> Result<Aes256Gcm> {
    if key.len() != KEY_LENGTH {
        return Err(Error::Encryption(format!(
            "Invalid key length: expected {}, got {}",
            KEY_LENGTH,
            key.len()
        )));
    }

    Aes256Gcm::new_from_slice(key)
        .map_err(|e| Error::Encryption(format!("Cipher initialization failed: {}", e)))
}

/// Encrypt plaintext using AES-256-GCM.
///
/// # Postconditions
/// - Returns nonce || ciphertext || tag
/// - The output length is plaintext length + NONCE_SIZE + TAG_SIZE
///
/// # Errors
/// - Returns an encryption error if the key length is incorrect
/// - Returns an encryption error if the entropy source fails
pub fn encrypt(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = cipher_for(key)?;

    let mut nonce = [0u8; NONCE_SIZE];
    OsRng
        .try_fill_bytes(&mut nonce)
        .map_err(|e| Error::Encryption(format!("Failed to generate nonce: {}", e)))?;

    let sealed = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| Error::Encryption(format!("Encryption failed: {}", e)))?;

    let mut result = Vec::with_capacity(NONCE_SIZE + sealed.len());
    result.extend_from_slice(&nonce);
    result.extend_from_slice(&sealed);

    Ok(result)
}

/// Decrypt a blob produced by [`encrypt`].
///
/// # Errors
/// - `Decryption(Malformed)` if the blob cannot hold a nonce and a tag
/// - `Decryption(Integrity)` if authentication fails (tampered data or wrong key)
/// - Returns an encryption error if the key length is incorrect
pub fn decrypt(key: &[u8], blob: &[u8]) -> Result<SensitiveBytes> {
    let cipher = cipher_for(key)?;

    if blob.len() < NONCE_SIZE + TAG_SIZE {
        return Err(Error::Decryption(DecryptionFailure::Malformed));
    }

    let (nonce, sealed) = blob.split_at(NONCE_SIZE);

    cipher
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map(SensitiveBytes::new)
        .map_err(|_| Error::Decryption(DecryptionFailure::Integrity))
}
