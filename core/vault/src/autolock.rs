//! Inactivity watchdog that relocks the vault.
//!
//! One task runs per unlock epoch. It wakes every poll interval, compares the
//! time since the last key access against the auto-lock duration, and performs
//! the lock transition itself once the vault has been idle long enough.

use std::sync::Weak;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info};

use crate::state::{Expiry, Shared};

/// Owner's handle on a running auto-lock task.
///
/// Dropping the handle cancels the task without waiting for it.
pub(crate) struct AutoLockHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
    _guard: DropGuard,
}

impl AutoLockHandle {
    /// Start the watchdog for unlock epoch `epoch`.
    pub(crate) fn spawn(shared: Weak<Shared>, epoch: u64, poll: Duration) -> Self {
        let token = CancellationToken::new();
        let task = tokio::spawn(run(shared, epoch, poll, token.clone()));

        Self {
            _guard: token.clone().drop_guard(),
            token,
            task,
        }
    }

    /// Cancel the task and wait until it has exited.
    ///
    /// Must not be called from the task itself.
    pub(crate) async fn cancel(self) {
        self.token.cancel();
        // A panicked or already finished task is as good as a cancelled one.
        let _ = self.task.await;
    }
}

async fn run(shared: Weak<Shared>, epoch: u64, poll: Duration, token: CancellationToken) {
    let mut ticker = interval_at(Instant::now() + poll, poll);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    debug!(epoch, poll_secs = poll.as_secs(), "Auto-lock task started");

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(epoch, "Auto-lock task cancelled");
                return;
            }
            _ = ticker.tick() => {}
        }

        // The vault is gone; nothing left to lock.
        let Some(shared) = shared.upgrade() else {
            return;
        };

        if !shared.idle_expired() {
            continue;
        }

        match shared.expire(epoch, &token).await {
            Expiry::Locked => {
                info!(epoch, "Vault auto-locked after inactivity");
                return;
            }
            Expiry::Active => continue,
            Expiry::Superseded => {
                debug!(epoch, "Auto-lock task superseded");
                return;
            }
        }
    }
}
