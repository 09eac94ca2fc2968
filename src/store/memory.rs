//! In-process Store
//!
//! Shareable handle over a mutex-guarded [`Keyspace`]. Every command takes
//! the lock once, so each [`Script`] runs without interleaving.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::store::{Keyspace, Script, Store, StoreStats};

// == Memory Store ==
/// Clone-cheap handle; clones share one keyspace.
#[derive(Clone, Debug)]
pub struct MemoryStore {
    keyspace: Arc<Mutex<Keyspace>>,
}

impl MemoryStore {
    /// Creates a store bounded to `max_entries` keys.
    ///
    /// Once the bound is reached the least recently used key is dropped, which
    /// would include a held lock, so size the bound well above the expected
    /// number of live coordination keys.
    pub fn new(max_entries: usize) -> Self {
        Self {
            keyspace: Arc::new(Mutex::new(Keyspace::new(max_entries))),
        }
    }

    pub async fn stats(&self) -> StoreStats {
        self.keyspace.lock().await.stats()
    }

    /// Active expiry sweep; returns the number of keys dropped.
    pub async fn cleanup_expired(&self) -> usize {
        self.keyspace.lock().await.cleanup_expired()
    }

    pub async fn len(&self) -> usize {
        self.keyspace.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.keyspace.lock().await.is_empty()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl_secs: u64,
        only_if_absent: bool,
    ) -> Result<bool, StoreError> {
        self.keyspace
            .lock()
            .await
            .set(key, value, ttl_secs, only_if_absent)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.keyspace.lock().await.get(key))
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.keyspace.lock().await.delete(key))
    }

    async fn delete_many(&self, keys: &[String]) -> Result<u64, StoreError> {
        let mut keyspace = self.keyspace.lock().await;
        Ok(keys.iter().filter(|key| keyspace.delete(key)).count() as u64)
    }

    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        self.keyspace.lock().await.incr(key)
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool, StoreError> {
        self.keyspace.lock().await.expire(key, ttl_secs)
    }

    async fn ttl(&self, key: &str) -> Result<i64, StoreError> {
        Ok(self.keyspace.lock().await.ttl(key))
    }

    async fn eval(
        &self,
        script: Script,
        keys: &[String],
        args: &[String],
    ) -> Result<i64, StoreError> {
        self.keyspace.lock().await.eval(script, keys, args)
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError> {
        Ok(self.keyspace.lock().await.mget(keys))
    }

    async fn mset(&self, pairs: &[(String, String)], ttl_secs: u64) -> Result<bool, StoreError> {
        self.keyspace.lock().await.mset(pairs, ttl_secs)
    }
}
