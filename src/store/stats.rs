//! Store Statistics Module
//!
//! Counters describing how the in-process keyspace is being used.

use serde::Serialize;

// == Store Stats ==
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    /// Reads that found a live key
    pub hits: u64,
    /// Reads that found nothing (absent or expired)
    pub misses: u64,
    /// Keys dropped to respect the entry bound
    pub evictions: u64,
    /// Keys dropped because their TTL elapsed
    pub expirations: u64,
    /// Declared scripts executed
    pub scripts: u64,
    /// Live keys at the time of the snapshot
    pub total_entries: usize,
}

impl StoreStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// hits / (hits + misses), or 0.0 before any read.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_expirations(&mut self, count: usize) {
        self.expirations += count as u64;
    }

    pub fn record_script(&mut self) {
        self.scripts += 1;
    }
}
