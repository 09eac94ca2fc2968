//! Keyspace Module
//!
//! Single-threaded command engine behind [`MemoryStore`](super::MemoryStore):
//! HashMap storage with lazy TTL expiry, LRU bounding and script execution.
//! Callers serialize access (one `&mut` borrow per command), which is what
//! makes each script atomic.

use std::collections::HashMap;

use crate::error::StoreError;
use crate::store::{
    LruTracker, Script, StoreEntry, StoreStats, MAX_KEY_LENGTH, MAX_VALUE_SIZE, TTL_MISSING,
    TTL_PERSISTENT,
};

type Result<T> = std::result::Result<T, StoreError>;

// == Keyspace ==
#[derive(Debug)]
pub struct Keyspace {
    entries: HashMap<String, StoreEntry>,
    lru: LruTracker,
    stats: StoreStats,
    /// Maximum number of keys before the least recently used one is dropped
    max_entries: usize,
}

impl Keyspace {
    // == Constructor ==
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            stats: StoreStats::new(),
            max_entries: max_entries.max(1),
        }
    }

    // == Set ==
    /// `SET key value EX ttl [NX]`.
    pub fn set(&mut self, key: &str, value: &str, ttl_secs: u64, only_if_absent: bool) -> Result<bool> {
        validate_key(key)?;
        validate_value(value)?;
        validate_ttl(ttl_secs)?;

        if only_if_absent && self.live(key).is_some() {
            return Ok(false);
        }

        self.insert(key, StoreEntry::new(value.to_string(), Some(ttl_secs)));
        Ok(true)
    }

    // == Get ==
    pub fn get(&mut self, key: &str) -> Option<String> {
        match self.live(key) {
            Some(entry) => {
                let value = entry.value.clone();
                self.stats.record_hit();
                self.lru.touch(key);
                Some(value)
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Delete ==
    pub fn delete(&mut self, key: &str) -> bool {
        let existed = self.live(key).is_some();
        self.remove(key);
        existed
    }

    // == Increment ==
    /// `INCR key`. Keeps the current expiry; a new key starts without one.
    pub fn incr(&mut self, key: &str) -> Result<i64> {
        validate_key(key)?;

        let next = match self.live(key) {
            Some(entry) => {
                let current: i64 = entry.value.parse().map_err(|_| {
                    StoreError::InvalidValue(format!("value at '{}' is not an integer", key))
                })?;
                current.checked_add(1).ok_or_else(|| {
                    StoreError::InvalidValue(format!("increment at '{}' would overflow", key))
                })?
            }
            None => 1,
        };

        match self.entries.get_mut(key) {
            Some(entry) => entry.value = next.to_string(),
            None => self.insert(key, StoreEntry::new(next.to_string(), None)),
        }
        self.lru.touch(key);
        Ok(next)
    }

    // == Expire ==
    pub fn expire(&mut self, key: &str, ttl_secs: u64) -> Result<bool> {
        validate_ttl(ttl_secs)?;
        if self.live(key).is_none() {
            return Ok(false);
        }
        if let Some(entry) = self.entries.get_mut(key) {
            entry.expire_in(ttl_secs);
        }
        Ok(true)
    }

    // == Time To Live ==
    pub fn ttl(&mut self, key: &str) -> i64 {
        match self.live(key) {
            Some(entry) => entry
                .ttl_remaining_secs()
                .map(|secs| secs as i64)
                .unwrap_or(TTL_PERSISTENT),
            None => TTL_MISSING,
        }
    }

    // == Multi Get / Multi Set ==
    pub fn mget(&mut self, keys: &[String]) -> Vec<Option<String>> {
        keys.iter().map(|key| self.get(key)).collect()
    }

    /// Validates every pair before writing any, so a rejected batch leaves no partial writes.
    pub fn mset(&mut self, pairs: &[(String, String)], ttl_secs: u64) -> Result<bool> {
        validate_ttl(ttl_secs)?;
        for (key, value) in pairs {
            validate_key(key)?;
            validate_value(value)?;
        }
        for (key, value) in pairs {
            self.insert(key, StoreEntry::new(value.clone(), Some(ttl_secs)));
        }
        Ok(true)
    }

    // == Eval ==
    /// Executes a declared script. The whole call runs under the caller's
    /// exclusive borrow, so no other command can interleave.
    pub fn eval(&mut self, script: Script, keys: &[String], args: &[String]) -> Result<i64> {
        if !script.accepts(keys.len(), args.len()) {
            return Err(StoreError::InvalidRequest(format!(
                "script {} expects {}, got {} keys and {} args",
                script.name(),
                script.arity(),
                keys.len(),
                args.len()
            )));
        }
        self.stats.record_script();

        match script {
            Script::CompareAndDelete => {
                let owned = self
                    .live(&keys[0])
                    .map(|entry| entry.value == args[0])
                    .unwrap_or(false);
                if owned {
                    self.remove(&keys[0]);
                    Ok(1)
                } else {
                    Ok(0)
                }
            }
            Script::FixedWindowIncrement => {
                let window = parse_arg(script, "window", &args[0])?;
                let limit = parse_arg(script, "limit", &args[1])?;
                let current = self.incr(&keys[0])?;
                if current == 1 {
                    self.expire(&keys[0], window)?;
                }
                if current > limit as i64 {
                    Ok(0)
                } else {
                    Ok(current)
                }
            }
            Script::SetAndEvict => {
                let ttl = parse_arg(script, "ttl", &args[1])?;
                self.set(&keys[0], &args[0], ttl, false)?;
                self.remove(&keys[1]);
                Ok(1)
            }
            Script::MultiSetAndEvict => {
                let n = keys.len() / 2;
                let ttl = parse_arg(script, "ttl", &args[n])?;
                let (written, evicted) = keys.split_at(n);
                let pairs: Vec<(String, String)> = written
                    .iter()
                    .cloned()
                    .zip(args[..n].iter().cloned())
                    .collect();
                self.mset(&pairs, ttl)?;
                for key in evicted {
                    self.remove(key);
                }
                Ok(n as i64)
            }
        }
    }

    // == Stats ==
    pub fn stats(&self) -> StoreStats {
        let mut stats = self.stats.clone();
        stats.total_entries = self.entries.len();
        stats
    }

    // == Cleanup Expired ==
    /// Removes every expired key and returns how many were dropped.
    pub fn cleanup_expired(&mut self) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.remove(key);
        }
        self.stats.record_expirations(expired.len());
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // == Internals ==
    /// Returns the entry when present and not expired; drops it lazily otherwise.
    fn live(&mut self, key: &str) -> Option<&StoreEntry> {
        if self.entries.get(key).is_some_and(StoreEntry::is_expired) {
            self.remove(key);
            self.stats.record_expirations(1);
        }
        self.entries.get(key)
    }

    fn insert(&mut self, key: &str, entry: StoreEntry) {
        if !self.entries.contains_key(key) && self.entries.len() >= self.max_entries {
            if let Some(evicted) = self.lru.evict_oldest() {
                self.entries.remove(&evicted);
                self.stats.record_eviction();
            }
        }
        self.entries.insert(key.to_string(), entry);
        self.lru.touch(key);
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
        self.lru.remove(key);
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(StoreError::InvalidRequest("key cannot be empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(StoreError::InvalidRequest(format!(
            "key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        )));
    }
    Ok(())
}

fn validate_value(value: &str) -> Result<()> {
    if value.len() > MAX_VALUE_SIZE {
        return Err(StoreError::InvalidRequest(format!(
            "value exceeds maximum size of {} bytes",
            MAX_VALUE_SIZE
        )));
    }
    Ok(())
}

fn validate_ttl(ttl_secs: u64) -> Result<()> {
    if ttl_secs == 0 {
        return Err(StoreError::InvalidRequest("invalid expire time".to_string()));
    }
    Ok(())
}

fn parse_arg(script: Script, name: &str, raw: &str) -> Result<u64> {
    raw.parse().map_err(|_| {
        StoreError::InvalidRequest(format!(
            "script {} argument {} must be a non-negative integer, got '{}'",
            script.name(),
            name,
            raw
        ))
    })
}
