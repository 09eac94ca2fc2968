//! Mini Coord - coordination primitives over a TTL key-value store
//!
//! A distributed lock, a fixed-window rate limiter and a cache-aside layer
//! with negative caching, written against a small [`Store`] capability trait.
//! [`MemoryStore`] is the in-process backend; the `api` module adapts the
//! primitives to axum middleware.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod keys;
pub mod limiter;
pub mod lock;
pub mod models;
pub mod store;
pub mod tasks;

pub use api::{create_router, AppState};
pub use cache::{BatchOutcome, CacheAside, MissCache};
pub use config::Config;
pub use error::{CoordError, Result, StoreError};
pub use keys::{IdentityKind, Namespace};
pub use limiter::{Decision, FailPolicy, RateLimitRule, RateLimiter};
pub use lock::{exec_with_lock, DistributedLock, LockGuard};
pub use store::{MemoryStore, Script, SharedStore, Store, TimeoutStore};
pub use tasks::spawn_cleanup_task;
