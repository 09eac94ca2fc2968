//! Lock Guard
//!
//! Scope-bound ownership of an acquired lock. The guard releases exactly once:
//! either explicitly through [`LockGuard::release`] / [`LockGuard::finish`], or
//! on drop (early return, `?`, panic, cancelled future) when auto-release is on.

use tokio::runtime::Handle;
use tracing::{debug, warn};

use super::DistributedLock;

/// An acquired [`DistributedLock`].
#[derive(Debug)]
pub struct LockGuard {
    lock: Option<DistributedLock>,
}

impl LockGuard {
    pub(super) fn new(lock: DistributedLock) -> Self {
        Self { lock: Some(lock) }
    }

    /// The held lock. Only `None` after the guard was consumed, which the API prevents.
    pub fn lock(&self) -> Option<&DistributedLock> {
        self.lock.as_ref()
    }

    /// Releases now, regardless of the auto-release setting.
    pub async fn release(mut self) -> bool {
        match self.lock.take() {
            Some(lock) => lock.release().await,
            None => false,
        }
    }

    /// Ends the scope: releases when auto-release is on, otherwise leaves the
    /// entry to expire with its TTL.
    pub async fn finish(mut self) {
        if let Some(lock) = self.lock.take() {
            if lock.auto_release() {
                lock.release().await;
            } else {
                debug!(key = %lock.key(), "lock left to expire");
            }
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let Some(lock) = self.lock.take() else {
            return;
        };
        if !lock.auto_release() {
            return;
        }
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    lock.release().await;
                });
            }
            Err(_) => {
                warn!(key = %lock.key(), "no runtime to release lock on drop, entry expires with its ttl");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::Namespace;
    use crate::store::{MemoryStore, SharedStore, Store};
    use std::sync::Arc;
    use std::time::Duration;

    fn setup() -> (MemoryStore, SharedStore, Namespace) {
        let memory = MemoryStore::new(100);
        let shared: SharedStore = Arc::new(memory.clone());
        (memory, shared, Namespace::new("guard").unwrap())
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_guard_released_on_drop() {
        let (memory, store, ns) = setup();
        let lock = DistributedLock::new(store, &ns, "k", 30).unwrap();
        let key = lock.key().to_string();

        {
            let guard = lock.try_guard().await.expect("uncontended lock");
            assert!(guard.lock().is_some());
            assert!(memory.get(&key).await.unwrap().is_some());
        }
        settle().await;

        assert!(memory.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_guard_released_on_early_error_return() {
        let (memory, store, ns) = setup();
        let lock = DistributedLock::new(store, &ns, "k", 30).unwrap();
        let key = lock.key().to_string();

        async fn critical(lock: DistributedLock) -> Result<(), &'static str> {
            let _guard = lock.try_guard().await.ok_or("busy")?;
            let _quantity: u32 = "not a number".parse().map_err(|_| "validation failed")?;
            Ok(())
        }

        assert_eq!(critical(lock).await, Err("validation failed"));
        settle().await;
        assert!(memory.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_guard_released_when_task_panics() {
        let (memory, store, ns) = setup();
        let lock = DistributedLock::new(store, &ns, "k", 30).unwrap();
        let key = lock.key().to_string();

        let task = tokio::spawn(async move {
            let _guard = lock.try_guard().await.expect("uncontended lock");
            panic!("handler blew up");
        });
        assert!(task.await.is_err());
        settle().await;

        assert!(memory.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_explicit_release_happens_once() {
        let (memory, store, ns) = setup();
        let lock = DistributedLock::new(store.clone(), &ns, "k", 30).unwrap();
        let key = lock.key().to_string();

        let guard = lock.try_guard().await.unwrap();
        assert!(guard.release().await);

        // A new holder takes the key; nothing from the old guard may touch it.
        let next = DistributedLock::new(store, &ns, "k", 30).unwrap();
        assert!(next.acquire().await);
        settle().await;
        assert_eq!(memory.get(&key).await.unwrap().as_deref(), Some(next.token()));
    }

    #[tokio::test]
    async fn test_no_auto_release_drop_keeps_entry() {
        let (memory, store, ns) = setup();
        let lock = DistributedLock::new(store, &ns, "k", 30)
            .unwrap()
            .with_auto_release(false);
        let key = lock.key().to_string();

        drop(lock.try_guard().await.unwrap());
        settle().await;

        assert!(memory.get(&key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_contended_guard_is_none() {
        let (_, store, ns) = setup();
        let first = DistributedLock::new(store.clone(), &ns, "k", 30).unwrap();
        let second = DistributedLock::new(store, &ns, "k", 30).unwrap();

        let _held = first.try_guard().await.unwrap();
        assert!(second.try_guard().await.is_none());
    }
}
