//! API Module
//!
//! HTTP collaborators for the coordination primitives: identity extraction,
//! rate-limit and request-lock middleware, and the demo gateway routes.

pub mod catalog;
pub mod handlers;
pub mod identity;
pub mod middleware;
pub mod routes;

pub use catalog::{Catalog, Item};
pub use handlers::AppState;
pub use identity::{HeaderIdentity, IdentityExtractor};
pub use middleware::{lock_guard, rate_limit, LockParams, LockPolicy, RateLimitPolicy, Rejection};
pub use routes::create_router;
