//! Common error types for Vaultbox.

use thiserror::Error;

/// Why a ciphertext could not be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecryptionFailure {
    /// Blob is too short to contain a nonce and authentication tag.
    #[error("ciphertext is malformed")]
    Malformed,

    /// Authentication tag did not verify (tampered data or wrong key).
    #[error("integrity check failed")]
    Integrity,
}

/// Top-level error type for Vaultbox operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A required field is missing or empty.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// No key is available because the vault is locked.
    #[error("Vault is locked")]
    VaultLocked,

    /// Unknown secret identity.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Ciphertext could not be authenticated or parsed.
    #[error("Decryption failed: {0}")]
    Decryption(DecryptionFailure),

    /// Entropy source or cipher initialization failed.
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Persistence layer failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Classify this error for callers that branch on kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::VaultLocked => ErrorKind::VaultLocked,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Decryption(_) => ErrorKind::Decryption,
            Error::Encryption(_) => ErrorKind::Encryption,
            Error::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Message safe to show to an untrusted caller.
    ///
    /// Expected conditions are reported verbatim. Internal failures collapse
    /// to a generic message so no internal detail leaks.
    pub fn public_message(&self) -> String {
        match self.kind().outcome() {
            Outcome::Internal => "Internal error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

/// Discriminant of [`Error`] without its context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    VaultLocked,
    NotFound,
    Decryption,
    Encryption,
    Storage,
}

impl ErrorKind {
    /// Map the kind onto a transport-neutral request outcome.
    pub fn outcome(self) -> Outcome {
        match self {
            ErrorKind::Validation => Outcome::BadRequest,
            ErrorKind::VaultLocked => Outcome::Unauthorized,
            ErrorKind::NotFound => Outcome::NotFound,
            ErrorKind::Decryption | ErrorKind::Encryption | ErrorKind::Storage => {
                Outcome::Internal
            }
        }
    }
}

/// Outcome a request layer reports for a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    BadRequest,
    Unauthorized,
    NotFound,
    Internal,
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
