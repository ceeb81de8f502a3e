//! Vault lock state machine.
//!
//! The vault starts Locked. `unlock` derives the master key from the password
//! and the vault salt and moves to Unlocked; `lock`, or the auto-lock task
//! after a period of inactivity, zeroizes the key and moves back to Locked.
//!
//! # Concurrency
//! The phase and salt sit behind a tokio `RwLock`. Readers (`is_unlocked`,
//! `get_key`, `status`) share it; transitions take it exclusively. Activity
//! timestamps live behind a separate short mutex so that `get_key` can record
//! activity while only holding the read side.

use chrono::{DateTime, Utc};
use std::mem;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use zeroize::{Zeroize, Zeroizing};

use crate::autolock::AutoLockHandle;
use crate::config::VaultSettings;
use crate::models::VaultStatus;
use vaultbox_common::{Error, Result};
use vaultbox_crypto::{derive_key, MasterKey, Salt};

/// Lock phase. The key exists only inside `Unlocked`.
enum Phase {
    Locked,
    Unlocked {
        key: MasterKey,
        auto_lock: AutoLockHandle,
    },
}

struct Inner {
    phase: Phase,
    salt: Option<Salt>,
    /// Incremented on every successful unlock.
    epoch: u64,
}

#[derive(Debug, Clone, Copy)]
struct Activity {
    at: Instant,
    wall: DateTime<Utc>,
}

impl Activity {
    fn now() -> Self {
        Self {
            at: Instant::now(),
            wall: Utc::now(),
        }
    }
}

/// Result of an auto-lock attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Expiry {
    /// The vault was locked by this attempt.
    Locked,
    /// Activity happened since the idle check; keep watching.
    Active,
    /// The epoch ended through another transition.
    Superseded,
}

/// State shared between the vault handle and its auto-lock task.
pub(crate) struct Shared {
    settings: VaultSettings,
    inner: RwLock<Inner>,
    activity: Mutex<Activity>,
}

impl Shared {
    fn activity(&self) -> Activity {
        *self
            .activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn touch(&self) {
        *self
            .activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Activity::now();
    }

    /// Whether the time since the last activity reached the auto-lock duration.
    pub(crate) fn idle_expired(&self) -> bool {
        self.activity().at.elapsed() >= self.settings.auto_lock()
    }

    /// Lock on behalf of the auto-lock task of `epoch`.
    ///
    /// Gives up as soon as `token` is cancelled, so an owner holding the write
    /// lock while waiting for the task to exit never deadlocks with it.
    pub(crate) async fn expire(&self, epoch: u64, token: &CancellationToken) -> Expiry {
        let mut inner = tokio::select! {
            biased;
            _ = token.cancelled() => return Expiry::Superseded,
            guard = self.inner.write() => guard,
        };

        if token.is_cancelled() || inner.epoch != epoch {
            return Expiry::Superseded;
        }
        if !self.idle_expired() {
            return Expiry::Active;
        }

        match mem::replace(&mut inner.phase, Phase::Locked) {
            Phase::Unlocked { mut key, auto_lock } => {
                key.zeroize();
                // This is our own handle; dropping it detaches the running task.
                drop(auto_lock);
                Expiry::Locked
            }
            Phase::Locked => Expiry::Superseded,
        }
    }
}

/// The vault: lock state, salt, in-memory master key and activity tracking.
///
/// Construct one per process and share it behind an `Arc`.
pub struct VaultState {
    shared: Arc<Shared>,
}

impl VaultState {
    /// Create a locked vault.
    ///
    /// # Errors
    /// - Returns a validation error if the settings are unusable
    pub fn new(settings: VaultSettings) -> Result<Self> {
        settings.validate()?;

        Ok(Self {
            shared: Arc::new(Shared {
                settings,
                inner: RwLock::new(Inner {
                    phase: Phase::Locked,
                    salt: None,
                    epoch: 0,
                }),
                activity: Mutex::new(Activity::now()),
            }),
        })
    }

    /// Settings this vault was created with.
    pub fn settings(&self) -> &VaultSettings {
        &self.shared.settings
    }

    /// Unlock the vault, or re-key an already unlocked vault.
    ///
    /// Generates the salt on first use. There is no password verifier: a
    /// wrong password yields a key under which existing secrets fail to
    /// decrypt.
    ///
    /// # Postconditions
    /// - Vault is unlocked with the key derived from `password` and the salt
    /// - Activity is reset and exactly one auto-lock task is running
    ///
    /// # Errors
    /// - Empty password
    /// - Entropy source or key derivation failure; the previous state is kept
    pub async fn unlock(&self, password: &[u8]) -> Result<()> {
        if password.is_empty() {
            return Err(Error::Validation("Master password is required".to_string()));
        }

        let mut inner = self.shared.inner.write().await;

        let existing = inner.salt;
        let salt = match existing {
            Some(salt) => salt,
            None => {
                let salt = Salt::generate()?;
                inner.salt = Some(salt);
                info!("Generated vault salt");
                salt
            }
        };

        let password = Zeroizing::new(password.to_vec());
        let params = self.shared.settings.kdf.clone();
        let key = tokio::task::spawn_blocking(move || derive_key(&password, &salt, &params))
            .await
            .map_err(|e| Error::Encryption(format!("Key derivation task failed: {}", e)))??;

        let previous = mem::replace(&mut inner.phase, Phase::Locked);
        let relock = matches!(previous, Phase::Unlocked { .. });
        if let Phase::Unlocked {
            key: mut old_key,
            auto_lock,
        } = previous
        {
            old_key.zeroize();
            auto_lock.cancel().await;
        }

        inner.epoch += 1;
        self.shared.touch();
        let auto_lock = AutoLockHandle::spawn(
            Arc::downgrade(&self.shared),
            inner.epoch,
            self.shared.settings.poll_interval(),
        );
        inner.phase = Phase::Unlocked { key, auto_lock };

        info!(epoch = inner.epoch, rekeyed = relock, "Vault unlocked");
        Ok(())
    }

    /// Lock the vault, zeroizing the key and stopping the auto-lock task.
    ///
    /// Idempotent when already locked.
    pub async fn lock(&self) {
        let mut inner = self.shared.inner.write().await;

        match mem::replace(&mut inner.phase, Phase::Locked) {
            Phase::Unlocked { mut key, auto_lock } => {
                key.zeroize();
                auto_lock.cancel().await;
                info!(epoch = inner.epoch, "Vault locked");
            }
            Phase::Locked => debug!("Lock requested on a locked vault"),
        }
    }

    /// Whether the vault currently holds a key.
    pub async fn is_unlocked(&self) -> bool {
        matches!(self.shared.inner.read().await.phase, Phase::Unlocked { .. })
    }

    /// Copy of the current master key. Records activity.
    ///
    /// # Errors
    /// - `VaultLocked` if no key is available
    pub async fn get_key(&self) -> Result<MasterKey> {
        let inner = self.shared.inner.read().await;

        match &inner.phase {
            Phase::Unlocked { key, .. } => {
                let key = key.clone();
                self.shared.touch();
                Ok(key)
            }
            Phase::Locked => Err(Error::VaultLocked),
        }
    }

    /// Record activity without fetching the key.
    ///
    /// Has no effect while locked.
    pub async fn touch(&self) {
        let inner = self.shared.inner.read().await;
        if matches!(inner.phase, Phase::Unlocked { .. }) {
            self.shared.touch();
        }
    }

    /// Lock state and, while unlocked, activity and remaining time.
    pub async fn status(&self) -> VaultStatus {
        let inner = self.shared.inner.read().await;

        match inner.phase {
            Phase::Unlocked { .. } => {
                let activity = self.shared.activity();
                let remaining = self
                    .shared
                    .settings
                    .auto_lock()
                    .saturating_sub(activity.at.elapsed());
                VaultStatus::unlocked(activity.wall, remaining)
            }
            Phase::Locked => VaultStatus::locked(),
        }
    }

    /// Salt in use, if one has been generated or restored.
    pub async fn salt(&self) -> Option<Salt> {
        self.shared.inner.read().await.salt
    }

    /// Replace the salt, e.g. when restoring a vault from backup.
    ///
    /// # Errors
    /// - Returns a validation error while unlocked
    pub async fn restore_salt(&self, salt: Salt) -> Result<()> {
        let mut inner = self.shared.inner.write().await;

        if matches!(inner.phase, Phase::Unlocked { .. }) {
            return Err(Error::Validation(
                "Salt can only be restored while the vault is locked".to_string(),
            ));
        }

        inner.salt = Some(salt);
        info!("Vault salt restored");
        Ok(())
    }
}
