//! Cryptographic primitives for Vaultbox.
//!
//! This module provides:
//! - Key derivation using Argon2id
//! - Authenticated envelope encryption using AES-256-GCM
//! - Key types with automatic zeroization
//!
//! # Security Guarantees
//! - All key material is zeroized on drop
//! - Decrypted plaintext is returned in a zeroizing buffer
//! - No plaintext or key material is ever logged

pub mod aead;
pub mod kdf;
pub mod keys;

pub use aead::{decrypt, encrypt, NONCE_SIZE, TAG_SIZE};
pub use kdf::{derive_key, generate_salt, KdfParams};
pub use keys::{MasterKey, Salt, KEY_LENGTH, SALT_LENGTH};
