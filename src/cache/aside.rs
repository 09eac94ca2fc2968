//! Cache-Aside Layer
//!
//! Get-or-populate caching over the shared store with penetration protection:
//! a lookup that finds nothing leaves a miss marker, and later calls return
//! without recomputing until the marker expires.
//!
//! Per logical key the states are `ABSENT`, `CACHED` and `MISS_CACHED`. Every
//! write that creates an entry clears the marker and vice versa, in one atomic
//! script whether one key or a batch is written.
//!
//! Errors from `compute` callbacks propagate untouched and never create a
//! marker. Store failures read as a cache miss.

use std::collections::HashMap;
use std::future::Future;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::cache::{JsonSerializer, MissCache, Serializer};
use crate::error::{ensure_ttl, CoordError, Result};
use crate::keys::Namespace;
use crate::store::{Script, SharedStore};

/// Entry lifetime in seconds when nothing else is configured.
pub const DEFAULT_CACHE_TTL: u64 = 600;

// == Batch Outcome ==
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome<T> {
    /// Resolved values, from the store or freshly computed
    pub values: HashMap<String, T>,
    /// Keys whose computation returned nothing in this call
    pub missed: Vec<String>,
    /// Keys skipped because a miss marker was still live
    pub suppressed: Vec<String>,
}

impl<T> Default for BatchOutcome<T> {
    fn default() -> Self {
        Self {
            values: HashMap::new(),
            missed: Vec::new(),
            suppressed: Vec::new(),
        }
    }
}

// == Cache Aside ==
#[derive(Clone)]
pub struct CacheAside<Z = JsonSerializer> {
    store: SharedStore,
    namespace: Namespace,
    miss: MissCache,
    serializer: Z,
}

impl CacheAside<JsonSerializer> {
    /// JSON-encoded cache with an enabled miss cache of
    /// [`DEFAULT_MISS_TTL`](crate::cache::DEFAULT_MISS_TTL).
    pub fn new(store: SharedStore, namespace: Namespace) -> Self {
        let miss = MissCache::with_defaults(store.clone(), namespace.clone());
        Self {
            store,
            namespace,
            miss,
            serializer: JsonSerializer,
        }
    }
}

impl<Z: Serializer> CacheAside<Z> {
    /// Replaces the miss cache. It must share this cache's namespace so marker
    /// writes evict the right entries.
    pub fn with_miss_cache(mut self, miss: MissCache) -> Result<Self> {
        if miss.namespace() != &self.namespace {
            return Err(CoordError::InvalidConfig(format!(
                "miss cache namespace '{}' differs from cache namespace '{}'",
                miss.namespace(),
                self.namespace
            )));
        }
        self.miss = miss;
        Ok(self)
    }

    pub fn with_serializer<Z2: Serializer>(self, serializer: Z2) -> CacheAside<Z2> {
        CacheAside {
            store: self.store,
            namespace: self.namespace,
            miss: self.miss,
            serializer,
        }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn miss_cache(&self) -> &MissCache {
        &self.miss
    }

    // == Get ==
    /// Cached value for `key`, or `None` when absent, unreadable or the store failed.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let entry_key = self.namespace.key(key)?;
        Ok(self.lookup(&entry_key).await)
    }

    /// Whether a live entry exists.
    pub async fn has(&self, key: &str) -> Result<bool> {
        let entry_key = self.namespace.key(key)?;
        match self.store.get(&entry_key).await {
            Ok(found) => Ok(found.is_some()),
            Err(err) => {
                warn!(key = %entry_key, error = %err, "cache presence check failed");
                Ok(false)
            }
        }
    }

    // == Set ==
    /// Writes an entry and clears the key's miss marker in one step.
    ///
    /// `Ok(false)` when the store failed.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) -> Result<bool> {
        ensure_ttl("cache ttl", ttl_secs)?;
        let entry_key = self.namespace.key(key)?;
        let raw = self.serializer.encode(value)?;
        self.write_entry(key, &entry_key, raw, ttl_secs).await
    }

    // == Delete ==
    /// `CACHED -> ABSENT`
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let entry_key = self.namespace.key(key)?;
        match self.store.delete(&entry_key).await {
            Ok(removed) => Ok(removed),
            Err(err) => {
                warn!(key = %entry_key, error = %err, "cache delete failed");
                Ok(false)
            }
        }
    }

    /// `MISS_CACHED -> ABSENT`
    pub async fn delete_missed(&self, key: &str) -> Result<bool> {
        self.miss.clear(key).await
    }

    // == Get Or Set ==
    /// Returns the cached value, or computes, stores and returns it.
    ///
    /// `Ok(None)` is the "use your default" outcome: either `compute` found
    /// nothing (a miss marker is written) or a live marker short-circuited the
    /// call without invoking `compute`.
    pub async fn get_or_set<T, F, Fut, E>(
        &self,
        key: &str,
        ttl_secs: u64,
        compute: F,
    ) -> std::result::Result<Option<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = std::result::Result<Option<T>, E>>,
        E: From<CoordError>,
    {
        ensure_ttl("cache ttl", ttl_secs)?;
        let entry_key = self.namespace.key(key)?;

        if let Some(value) = self.lookup(&entry_key).await {
            return Ok(Some(value));
        }
        if self.miss.has(key).await? {
            debug!(key = %entry_key, "miss marker short-circuit");
            return Ok(None);
        }
        self.populate(key, &entry_key, ttl_secs, compute).await
    }

    /// Like [`CacheAside::get_or_set`], but `should_refresh` is consulted on
    /// every hit; `true` discards the cached value and recomputes it.
    pub async fn get_or_set_with_refresh<T, F, Fut, E, R>(
        &self,
        key: &str,
        ttl_secs: u64,
        compute: F,
        should_refresh: R,
    ) -> std::result::Result<Option<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = std::result::Result<Option<T>, E>>,
        E: From<CoordError>,
        R: FnOnce(&str) -> bool,
    {
        ensure_ttl("cache ttl", ttl_secs)?;
        let entry_key = self.namespace.key(key)?;

        match self.lookup::<T>(&entry_key).await {
            Some(value) => {
                if !should_refresh(key) {
                    return Ok(Some(value));
                }
                debug!(key = %entry_key, "refresh requested on hit");
                self.populate(key, &entry_key, ttl_secs, compute).await
            }
            None => {
                if self.miss.has(key).await? {
                    debug!(key = %entry_key, "miss marker short-circuit");
                    return Ok(None);
                }
                self.populate(key, &entry_key, ttl_secs, compute).await
            }
        }
    }

    // == Batch Get Or Set ==
    /// One multi-get for all keys, `compute` once per true miss, then one
    /// atomic multi-write for everything computed that also clears its markers.
    ///
    /// An error from `compute` aborts the batch before anything is written.
    pub async fn batch_get_or_set<T, F, Fut, E>(
        &self,
        keys: &[String],
        ttl_secs: u64,
        mut compute: F,
    ) -> std::result::Result<BatchOutcome<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut(String) -> Fut,
        Fut: Future<Output = std::result::Result<Option<T>, E>>,
        E: From<CoordError>,
    {
        let mut outcome = BatchOutcome::default();
        if keys.is_empty() {
            return Ok(outcome);
        }
        ensure_ttl("cache ttl", ttl_secs)?;
        let entry_keys = self.entry_keys(keys)?;

        let cached = match self.store.mget(&entry_keys).await {
            Ok(values) => values,
            Err(err) => {
                warn!(count = keys.len(), error = %err, "cache multi-get failed, treating all as misses");
                vec![None; keys.len()]
            }
        };

        let mut pending: Vec<(String, String)> = Vec::new();
        let mut computed: Vec<String> = Vec::new();

        for ((key, entry_key), raw) in keys.iter().zip(entry_keys).zip(cached) {
            if outcome.values.contains_key(key) {
                continue;
            }
            if let Some(value) = raw.and_then(|raw| self.decode::<T>(&entry_key, &raw)) {
                outcome.values.insert(key.clone(), value);
                continue;
            }
            if self.miss.has(key).await? {
                outcome.suppressed.push(key.clone());
                continue;
            }
            match compute(key.clone()).await? {
                Some(value) => {
                    pending.push((entry_key, self.serializer.encode(&value)?));
                    computed.push(key.clone());
                    outcome.values.insert(key.clone(), value);
                }
                None => {
                    self.miss.mark(key).await?;
                    outcome.missed.push(key.clone());
                }
            }
        }

        if !pending.is_empty() {
            self.write_entries(&computed, &pending, ttl_secs).await?;
        }

        debug!(
            hits = outcome.values.len() - computed.len(),
            computed = computed.len(),
            missed = outcome.missed.len(),
            suppressed = outcome.suppressed.len(),
            "batch get-or-set"
        );
        Ok(outcome)
    }

    // == Multi-key Helpers ==
    /// Cached values for the keys that have one; absent keys are left out.
    pub async fn get_multiple<T: DeserializeOwned>(
        &self,
        keys: &[String],
    ) -> Result<HashMap<String, T>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }
        let entry_keys = self.entry_keys(keys)?;
        let cached = match self.store.mget(&entry_keys).await {
            Ok(values) => values,
            Err(err) => {
                warn!(count = keys.len(), error = %err, "cache multi-get failed");
                return Ok(HashMap::new());
            }
        };

        Ok(keys
            .iter()
            .zip(entry_keys)
            .zip(cached)
            .filter_map(|((key, entry_key), raw)| {
                let value = self.decode(&entry_key, &raw?)?;
                Some((key.clone(), value))
            })
            .collect())
    }

    /// Writes every pair with one TTL and clears their miss markers, all in
    /// one step. `Ok(false)` when the store failed and nothing changed.
    pub async fn set_multiple<T: Serialize>(
        &self,
        values: &[(String, T)],
        ttl_secs: u64,
    ) -> Result<bool> {
        if values.is_empty() {
            return Ok(true);
        }
        ensure_ttl("cache ttl", ttl_secs)?;
        let mut pairs = Vec::with_capacity(values.len());
        let mut keys = Vec::with_capacity(values.len());
        for (key, value) in values {
            pairs.push((self.namespace.key(key)?, self.serializer.encode(value)?));
            keys.push(key.clone());
        }

        self.write_entries(&keys, &pairs, ttl_secs).await
    }

    pub async fn delete_multiple(&self, keys: &[String]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let entry_keys = self.entry_keys(keys)?;
        match self.store.delete_many(&entry_keys).await {
            Ok(removed) => Ok(removed),
            Err(err) => {
                warn!(count = keys.len(), error = %err, "cache multi-delete failed");
                Ok(0)
            }
        }
    }

    // == Internals ==
    async fn lookup<T: DeserializeOwned>(&self, entry_key: &str) -> Option<T> {
        match self.store.get(entry_key).await {
            Ok(Some(raw)) => {
                let value = self.decode(entry_key, &raw);
                if value.is_some() {
                    debug!(key = %entry_key, "cache hit");
                }
                value
            }
            Ok(None) => {
                debug!(key = %entry_key, "cache miss");
                None
            }
            Err(err) => {
                warn!(key = %entry_key, error = %err, "cache read failed, treating as miss");
                None
            }
        }
    }

    /// Unreadable entries are treated as misses so the next write replaces them.
    fn decode<T: DeserializeOwned>(&self, entry_key: &str, raw: &str) -> Option<T> {
        match self.serializer.decode(raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key = %entry_key, error = %err, "cached value unreadable, treating as miss");
                None
            }
        }
    }

    async fn populate<T, F, Fut, E>(
        &self,
        key: &str,
        entry_key: &str,
        ttl_secs: u64,
        compute: F,
    ) -> std::result::Result<Option<T>, E>
    where
        T: Serialize,
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = std::result::Result<Option<T>, E>>,
        E: From<CoordError>,
    {
        match compute(key.to_string()).await? {
            Some(value) => {
                let raw = self.serializer.encode(&value)?;
                self.write_entry(key, entry_key, raw, ttl_secs).await?;
                Ok(Some(value))
            }
            None => {
                self.miss.mark(key).await?;
                Ok(None)
            }
        }
    }

    /// `Ok(false)` when the store failed; the caller still has the value.
    async fn write_entry(
        &self,
        key: &str,
        entry_key: &str,
        raw: String,
        ttl_secs: u64,
    ) -> Result<bool> {
        let result = if self.miss.is_enabled() {
            let keys = [entry_key.to_string(), self.miss.key(key)?];
            let args = [raw, ttl_secs.to_string()];
            self.store
                .eval(Script::SetAndEvict, &keys, &args)
                .await
                .map(|_| true)
        } else {
            self.store.set(entry_key, &raw, ttl_secs, false).await
        };

        match result {
            Ok(written) => Ok(written),
            Err(err) => {
                warn!(key = %entry_key, error = %err, "cache write failed");
                Ok(false)
            }
        }
    }

    /// `pairs[i]` is the encoded entry for `keys[i]`. `Ok(false)` when the store failed.
    async fn write_entries(
        &self,
        keys: &[String],
        pairs: &[(String, String)],
        ttl_secs: u64,
    ) -> Result<bool> {
        let result = if self.miss.is_enabled() {
            let mut script_keys = Vec::with_capacity(pairs.len() * 2);
            let mut args = Vec::with_capacity(pairs.len() + 1);
            for (entry_key, raw) in pairs {
                script_keys.push(entry_key.clone());
                args.push(raw.clone());
            }
            for key in keys {
                script_keys.push(self.miss.key(key)?);
            }
            args.push(ttl_secs.to_string());
            self.store
                .eval(Script::MultiSetAndEvict, &script_keys, &args)
                .await
                .map(|_| true)
        } else {
            self.store.mset(pairs, ttl_secs).await
        };

        match result {
            Ok(written) => Ok(written),
            Err(err) => {
                warn!(count = pairs.len(), error = %err, "cache multi-write failed");
                Ok(false)
            }
        }
    }

    fn entry_keys(&self, keys: &[String]) -> Result<Vec<String>> {
        keys.iter().map(|key| self.namespace.key(key)).collect()
    }
}
