//! Active Expiry Sweep
//!
//! Expired entries are dropped lazily on access. Keys nobody reads again
//! (finished rate-limit windows, abandoned miss markers) would otherwise hold
//! their slot until LRU eviction, so a background task sweeps them out.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::store::MemoryStore;

/// Spawns the sweep loop. Abort the returned handle on shutdown.
pub fn spawn_cleanup_task(store: MemoryStore, cleanup_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(interval_secs = interval.as_secs(), "starting expiry sweep");

        loop {
            tokio::time::sleep(interval).await;

            let removed = store.cleanup_expired().await;
            if removed > 0 {
                info!(removed, "expiry sweep removed entries");
            } else {
                debug!("expiry sweep found nothing");
            }
        }
    })
}
