//! Persistence collaborators for Vaultbox.
//!
//! This module provides a trait-based interface for secret record storage
//! and two implementations: an in-memory store and a SQLite store.
//!
//! # Design Principles
//! - Stores only ever see ciphertext; encryption happens above this layer
//! - Async operations: all I/O is async, blocking drivers run off the runtime
//! - Unified error semantics: missing records are always `NotFound`

pub mod memory;
pub mod provider;
pub mod sqlite;

pub use memory::MemoryStore;
pub use provider::{NewSecret, SecretRecord, SecretStore};
pub use sqlite::SqliteStore;
