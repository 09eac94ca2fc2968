//! Distributed Lock Module
//!
//! At-most-one-holder mutual exclusion per key, built only on `SET NX EX` and
//! an owner-checked atomic delete. The TTL is mandatory: it is what frees the
//! key when a holder dies before releasing.

mod guard;

use std::fmt;
use std::future::Future;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{ensure_ttl, Result};
use crate::keys::Namespace;
use crate::store::{Script, SharedStore};

pub use guard::LockGuard;

/// Default lock lifetime in seconds.
pub const DEFAULT_LOCK_TTL: u64 = 30;

// == Distributed Lock ==
/// One lock instance with its own owner token.
///
/// The token is generated per instance, so two instances for the same key
/// contend with each other even inside one process. The type is not `Clone`,
/// so each token lives in exactly one handle:
///
/// ```compile_fail
/// fn needs_clone<T: Clone>() {}
/// needs_clone::<mini_coord::DistributedLock>();
/// ```
pub struct DistributedLock {
    store: SharedStore,
    key: String,
    token: String,
    ttl_secs: u64,
    auto_release: bool,
}

impl DistributedLock {
    // == Constructor ==
    /// Creates an unacquired lock for `key` under `namespace`, with auto-release on.
    ///
    /// Rejects an empty key or a zero TTL.
    pub fn new(store: SharedStore, namespace: &Namespace, key: &str, ttl_secs: u64) -> Result<Self> {
        ensure_ttl("lock ttl", ttl_secs)?;
        Ok(Self {
            store,
            key: namespace.lock_key(key)?,
            token: Uuid::new_v4().simple().to_string(),
            ttl_secs,
            auto_release: true,
        })
    }

    /// Whether a [`LockGuard`] releases on scope exit. Without it the entry
    /// stays until its TTL elapses.
    pub fn with_auto_release(mut self, auto_release: bool) -> Self {
        self.auto_release = auto_release;
        self
    }

    /// Full store key of this lock.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    pub fn auto_release(&self) -> bool {
        self.auto_release
    }

    // == Acquire ==
    /// Single non-blocking attempt. `true` iff this call created the entry.
    ///
    /// Store failures count as "not acquired".
    pub async fn acquire(&self) -> bool {
        match self
            .store
            .set(&self.key, &self.token, self.ttl_secs, true)
            .await
        {
            Ok(acquired) => {
                debug!(key = %self.key, acquired, "lock acquire");
                acquired
            }
            Err(err) => {
                warn!(key = %self.key, error = %err, "lock acquire failed, treating as not acquired");
                false
            }
        }
    }

    // == Release ==
    /// Deletes the entry iff it still carries this instance's token.
    ///
    /// `false` when the token differs, the key is gone, or the store failed.
    pub async fn release(&self) -> bool {
        let keys = [self.key.clone()];
        let args = [self.token.clone()];
        match self.store.eval(Script::CompareAndDelete, &keys, &args).await {
            Ok(1) => {
                debug!(key = %self.key, "lock released");
                true
            }
            Ok(_) => {
                debug!(key = %self.key, "lock not held by this owner");
                false
            }
            Err(err) => {
                warn!(key = %self.key, error = %err, "lock release failed");
                false
            }
        }
    }

    // == Scoped Acquisition ==
    /// Acquires and wraps the lock in a guard, or `None` when another holder has it.
    pub async fn try_guard(self) -> Option<LockGuard> {
        if self.acquire().await {
            Some(LockGuard::new(self))
        } else {
            None
        }
    }

    /// Runs `f` only if the lock is acquired; `None` means it was not.
    ///
    /// With auto-release the lock is released once `f` finishes, and also if
    /// `f` panics or the returned future is dropped part way.
    pub async fn run<F, Fut, T>(self, f: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let guard = self.try_guard().await?;
        let output = f().await;
        guard.finish().await;
        Some(output)
    }
}

impl fmt::Debug for DistributedLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistributedLock")
            .field("key", &self.key)
            .field("token", &self.token)
            .field("ttl_secs", &self.ttl_secs)
            .field("auto_release", &self.auto_release)
            .finish()
    }
}

// == Exec With Lock ==
/// Builds an auto-releasing lock for `key` and runs `f` only if it is acquired.
///
/// `Ok(None)` means another holder had the lock and `f` was not called.
pub async fn exec_with_lock<F, Fut, T>(
    store: SharedStore,
    namespace: &Namespace,
    key: &str,
    ttl_secs: u64,
    f: F,
) -> Result<Option<T>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    let lock = DistributedLock::new(store, namespace, key, ttl_secs)?;
    Ok(lock.run(f).await)
}
