//! Miss Cache
//!
//! Negative-result markers: "a recent lookup for this key found nothing".
//! While a marker lives, callers skip the expensive lookup. Writing a marker
//! evicts the key's cache entry in the same atomic step.

use tracing::{debug, warn};

use crate::error::{ensure_ttl, Result};
use crate::keys::Namespace;
use crate::store::{Script, SharedStore};

/// Marker lifetime in seconds when nothing else is configured.
pub const DEFAULT_MISS_TTL: u64 = 600;

#[derive(Clone)]
pub struct MissCache {
    store: SharedStore,
    namespace: Namespace,
    ttl_secs: u64,
    enabled: bool,
}

impl MissCache {
    /// Rejects a zero TTL.
    pub fn new(store: SharedStore, namespace: Namespace, ttl_secs: u64) -> Result<Self> {
        ensure_ttl("miss ttl", ttl_secs)?;
        Ok(Self {
            store,
            namespace,
            ttl_secs,
            enabled: true,
        })
    }

    /// Enabled, with [`DEFAULT_MISS_TTL`].
    pub fn with_defaults(store: SharedStore, namespace: Namespace) -> Self {
        Self {
            store,
            namespace,
            ttl_secs: DEFAULT_MISS_TTL,
            enabled: true,
        }
    }

    /// A miss cache that never records or reports markers.
    pub fn disabled(store: SharedStore, namespace: Namespace) -> Self {
        Self {
            store,
            namespace,
            ttl_secs: DEFAULT_MISS_TTL,
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Store key of the marker for `key`.
    pub fn key(&self, key: &str) -> Result<String> {
        self.namespace.miss_key(key)
    }

    /// Whether a live marker exists. A store failure reads as "no marker".
    pub async fn has(&self, key: &str) -> Result<bool> {
        if !self.enabled {
            return Ok(false);
        }
        let marker = self.key(key)?;
        match self.store.get(&marker).await {
            Ok(found) => Ok(found.is_some()),
            Err(err) => {
                warn!(key = %marker, error = %err, "miss marker lookup failed");
                Ok(false)
            }
        }
    }

    /// Records a marker and drops the cache entry for `key` atomically.
    pub async fn mark(&self, key: &str) -> Result<bool> {
        if !self.enabled {
            return Ok(false);
        }
        let keys = [self.key(key)?, self.namespace.key(key)?];
        let args = ["1".to_string(), self.ttl_secs.to_string()];
        match self.store.eval(Script::SetAndEvict, &keys, &args).await {
            Ok(_) => {
                debug!(key = %keys[0], ttl = self.ttl_secs, "miss marker set");
                Ok(true)
            }
            Err(err) => {
                warn!(key = %keys[0], error = %err, "miss marker write failed");
                Ok(false)
            }
        }
    }

    /// Removes the marker for `key`.
    pub async fn clear(&self, key: &str) -> Result<bool> {
        if !self.enabled {
            return Ok(false);
        }
        let marker = self.key(key)?;
        match self.store.delete(&marker).await {
            Ok(removed) => Ok(removed),
            Err(err) => {
                warn!(key = %marker, error = %err, "miss marker delete failed");
                Ok(false)
            }
        }
    }
}
