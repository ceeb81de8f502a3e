//! Vault engine for Vaultbox.
//!
//! This module provides:
//! - The lock/unlock state machine holding the master key in memory
//! - Inactivity auto-lock
//! - Secret operations with transparent envelope encryption
//!
//! # Architecture
//! `VaultState` owns key custody. `SecretService` borrows a copy of the key
//! for each operation and moves plaintext in and ciphertext out of a
//! `SecretStore`.

mod autolock;
pub mod config;
pub mod models;
pub mod secrets;
pub mod state;

pub use config::VaultSettings;
pub use models::{CreateSecretRequest, SecretResponse, UpdateSecretRequest, VaultStatus};
pub use secrets::SecretService;
pub use state::VaultState;
