//! Cache Module
//!
//! Cache-aside memoization over the shared store, with negative-result
//! caching against penetration.

mod aside;
mod miss;
mod serializer;


// Re-export public types
pub use aside::{BatchOutcome, CacheAside, DEFAULT_CACHE_TTL};
pub use miss::{MissCache, DEFAULT_MISS_TTL};
pub use serializer::{JsonSerializer, Serializer};
