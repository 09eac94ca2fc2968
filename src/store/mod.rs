//! Store Module
//!
//! The key-value capability contract every coordination primitive is written
//! against, plus an in-process implementation with TTL expiry and LRU bounding.

mod entry;
mod keyspace;
mod lru;
mod memory;
mod script;
mod stats;
mod timeout;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StoreError;

// Re-export public types
pub use entry::StoreEntry;
pub use keyspace::Keyspace;
pub use lru::LruTracker;
pub use memory::MemoryStore;
pub use script::Script;
pub use stats::StoreStats;
pub use timeout::TimeoutStore;

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Maximum allowed value size in bytes
pub const MAX_VALUE_SIZE: usize = 1024 * 1024; // 1 MB

/// `TTL` reply for a key that does not exist.
pub const TTL_MISSING: i64 = -2;

/// `TTL` reply for a key that exists without an expiry.
pub const TTL_PERSISTENT: i64 = -1;

/// Store handle shared by every component and every concurrent caller.
pub type SharedStore = Arc<dyn Store>;

// == Store Trait ==
/// Capability contract of the shared key-value store.
///
/// Every method is a single request/response round-trip. Multi-step sequences
/// whose correctness depends on ordering must go through [`Store::eval`] with
/// one of the declared [`Script`]s so they run without interleaving.
#[async_trait]
pub trait Store: Send + Sync {
    /// `SET key value EX ttl [NX]`. Returns `false` only when `only_if_absent`
    /// is set and the key already exists.
    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl_secs: u64,
        only_if_absent: bool,
    ) -> Result<bool, StoreError>;

    /// `GET key`
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// `DEL key`. Returns whether a live key was removed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// `DEL key [key ...]`. Returns the number of live keys removed.
    async fn delete_many(&self, keys: &[String]) -> Result<u64, StoreError>;

    /// `INCR key`. A missing key counts from zero and gets no expiry.
    async fn incr(&self, key: &str) -> Result<i64, StoreError>;

    /// `EXPIRE key ttl`. Returns `false` when the key does not exist.
    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool, StoreError>;

    /// `TTL key` in seconds, or [`TTL_MISSING`] / [`TTL_PERSISTENT`].
    async fn ttl(&self, key: &str) -> Result<i64, StoreError>;

    /// Runs a declared script atomically. Every declared script replies with an integer.
    async fn eval(&self, script: Script, keys: &[String], args: &[String])
        -> Result<i64, StoreError>;

    /// `MGET key [key ...]`, positional.
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError>;

    /// Writes every pair with the same TTL.
    async fn mset(&self, pairs: &[(String, String)], ttl_secs: u64) -> Result<bool, StoreError>;
}
