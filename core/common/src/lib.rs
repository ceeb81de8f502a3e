//! Common utilities and types shared across Vaultbox crates.
//!
//! This module provides the closed error taxonomy and the identifier and
//! buffer types used by the crypto, storage and vault layers.

pub mod error;
pub mod types;

pub use error::{DecryptionFailure, Error, ErrorKind, Outcome, Result};
pub use types::{SecretId, SensitiveBytes};
