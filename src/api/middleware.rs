//! HTTP Middleware
//!
//! Rate limiting and per-identity request locking for axum routers. Both are
//! plain `from_fn_with_state` middleware driven by a cloneable policy:
//!
//! ```ignore
//! Router::new()
//!     .route("/items/:id/reserve", post(reserve))
//!     .route_layer(from_fn_with_state(lock_policy, lock_guard))
//!     .route_layer(from_fn_with_state(rate_policy, rate_limit));
//! ```
//!
//! Use `route_layer` so the matched route pattern, not the raw path, keys the
//! counters and locks.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{debug, info};

use crate::api::identity::{route_of, HeaderIdentity, IdentityExtractor};
use crate::error::Result;
use crate::keys::{IdentityKind, Namespace};
use crate::limiter::{RateLimitRule, RateLimiter};
use crate::lock::DistributedLock;
use crate::models::RejectionBody;
use crate::store::SharedStore;

pub const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const X_RATELIMIT_RESET: &str = "x-ratelimit-reset";

/// Identity used for rate limiting when the request carries none.
const ANONYMOUS: &str = "anonymous";

/// Lock TTL for request locks when nothing else is configured.
pub const DEFAULT_REQUEST_LOCK_TTL: u64 = 10;

// == Rejection ==
/// Status and JSON body returned for a refused request.
#[derive(Debug, Clone)]
pub struct Rejection {
    status: StatusCode,
    body: RejectionBody,
}

impl Rejection {
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            body: RejectionBody::new(status.as_u16(), msg),
        }
    }

    /// `429 {"code":429,"msg":"Too Many Requests"}`
    pub fn too_many_requests() -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, "Too Many Requests")
    }

    /// `429 {"code":429,"msg":"Request already in progress"}`
    pub fn locked() -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, "Request already in progress")
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &RejectionBody {
        &self.body
    }

    fn to_response(&self) -> Response {
        (self.status, Json(self.body.clone())).into_response()
    }
}

// == Rate Limit ==
#[derive(Clone)]
pub struct RateLimitPolicy {
    limiter: RateLimiter,
    rule: RateLimitRule,
    identity: IdentityKind,
    extractor: Arc<dyn IdentityExtractor>,
    rejection: Rejection,
}

impl RateLimitPolicy {
    /// Limits per client IP, read by [`HeaderIdentity`], rejecting with 429.
    pub fn new(limiter: RateLimiter, rule: RateLimitRule) -> Self {
        Self {
            limiter,
            rule,
            identity: IdentityKind::Ip,
            extractor: Arc::new(HeaderIdentity),
            rejection: Rejection::too_many_requests(),
        }
    }

    /// Same limiter and identity with a different rule, for per-route overrides.
    pub fn with_rule(mut self, rule: RateLimitRule) -> Self {
        self.rule = rule;
        self
    }

    pub fn with_identity(mut self, identity: IdentityKind) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn IdentityExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_rejection(mut self, rejection: Rejection) -> Self {
        self.rejection = rejection;
        self
    }

    pub fn rule(&self) -> RateLimitRule {
        self.rule
    }
}

/// Counts the request against its identity, method and route pattern.
///
/// Admitted responses carry `X-RateLimit-Limit` and `X-RateLimit-Remaining`;
/// refused ones additionally carry `X-RateLimit-Reset` in seconds.
pub async fn rate_limit(
    State(policy): State<RateLimitPolicy>,
    request: Request,
    next: Next,
) -> Response {
    let identity = policy
        .extractor
        .extract(&policy.identity, &request)
        .unwrap_or_else(|| ANONYMOUS.to_string());
    let scoped = policy.identity.scoped(&identity);
    let route = route_of(&request);
    let method = request.method().as_str().to_string();

    let decision = match policy
        .limiter
        .check_request(&scoped, &method, &route, policy.rule)
        .await
    {
        Ok(decision) => decision,
        Err(err) => return err.into_response(),
    };

    if !decision.allowed {
        info!(identity = %scoped, %method, %route, reset = decision.remaining_ttl, "request rate limited");
        let mut response = policy.rejection.to_response();
        let headers = response.headers_mut();
        headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
        headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(0u64));
        headers.insert(X_RATELIMIT_RESET, HeaderValue::from(decision.remaining_ttl));
        return response;
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    response
}

// == Request Lock ==
/// Which identity a request lock is scoped to, and how long it lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockParams {
    pub identity: IdentityKind,
    pub ttl_secs: u64,
    pub auto_release: bool,
}

impl LockParams {
    pub fn new(identity: IdentityKind) -> Self {
        Self {
            identity,
            ttl_secs: DEFAULT_REQUEST_LOCK_TTL,
            auto_release: true,
        }
    }

    pub fn admin() -> Self {
        Self::new(IdentityKind::Admin)
    }

    pub fn staff() -> Self {
        Self::new(IdentityKind::Staff)
    }

    pub fn user() -> Self {
        Self::new(IdentityKind::User)
    }

    pub fn ip() -> Self {
        Self::new(IdentityKind::Ip)
    }

    pub fn custom(name: impl Into<String>) -> Self {
        Self::new(IdentityKind::Custom(name.into()))
    }

    pub fn with_ttl(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    pub fn with_auto_release(mut self, auto_release: bool) -> Self {
        self.auto_release = auto_release;
        self
    }

    /// Logical lock key: `<fragment>:<identity>:<METHOD>:<route>`.
    pub fn lock_name(&self, identity: &str, method: &str, route: &str) -> String {
        format!("{}:{}:{}", self.identity.scoped(identity), method, route)
    }
}

#[derive(Clone)]
pub struct LockPolicy {
    store: SharedStore,
    namespace: Namespace,
    params: LockParams,
    extractor: Arc<dyn IdentityExtractor>,
    rejection: Rejection,
}

impl LockPolicy {
    pub fn new(store: SharedStore, namespace: Namespace, params: LockParams) -> Self {
        Self {
            store,
            namespace,
            params,
            extractor: Arc::new(HeaderIdentity),
            rejection: Rejection::locked(),
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn IdentityExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_rejection(mut self, rejection: Rejection) -> Self {
        self.rejection = rejection;
        self
    }

    pub fn params(&self) -> &LockParams {
        &self.params
    }

    /// Store key the lock for this identity and route lives under.
    pub fn lock_key(&self, identity: &str, method: &str, route: &str) -> Result<String> {
        self.namespace
            .lock_key(&self.params.lock_name(identity, method, route))
    }
}

/// Admits one in-flight request per identity and route.
///
/// Requests without an identity of the configured kind pass through
/// unlocked. The lock is released once the inner handler has produced its
/// response, or left to expire when auto-release is off.
pub async fn lock_guard(
    State(policy): State<LockPolicy>,
    request: Request,
    next: Next,
) -> Response {
    let Some(identity) = policy.extractor.extract(&policy.params.identity, &request) else {
        debug!(kind = %policy.params.identity, "no identity for request lock, passing through");
        return next.run(request).await;
    };
    let name = policy
        .params
        .lock_name(&identity, request.method().as_str(), &route_of(&request));

    let lock = match DistributedLock::new(
        policy.store.clone(),
        &policy.namespace,
        &name,
        policy.params.ttl_secs,
    ) {
        Ok(lock) => lock.with_auto_release(policy.params.auto_release),
        Err(err) => return err.into_response(),
    };

    let Some(guard) = lock.try_guard().await else {
        info!(lock = %name, "request lock busy");
        return policy.rejection.to_response();
    };

    let response = next.run(request).await;
    guard.finish().await;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, middleware::from_fn_with_state, routing::get, Router};
    use tower::util::ServiceExt;

    use crate::store::{MemoryStore, Store};

    fn rate_limited_app(limit: u64) -> Router {
        let store: SharedStore = Arc::new(MemoryStore::new(100));
        let limiter = RateLimiter::new(store, Namespace::new("mw").unwrap());
        let policy = RateLimitPolicy::new(limiter, RateLimitRule::new(limit, 30).unwrap());
        Router::new()
            .route("/ping/:n", get(|| async { "pong" }))
            .route_layer(from_fn_with_state(policy, rate_limit))
    }

    /// Tenant from a bearer token, for `Custom("tenant")` only.
    struct BearerTenant;

    impl IdentityExtractor for BearerTenant {
        fn extract(&self, kind: &IdentityKind, request: &Request) -> Option<String> {
            if *kind != IdentityKind::Custom("tenant".to_string()) {
                return None;
            }
            request
                .headers()
                .get("authorization")?
                .to_str()
                .ok()?
                .strip_prefix("Bearer ")
                .map(str::to_string)
        }
    }

    fn tenant_request(tenant: &str, ip: &str) -> Request {
        Request::builder()
            .uri("/work")
            .header("authorization", format!("Bearer {}", tenant))
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    }

    fn get_from(ip: &str, uri: &str) -> Request {
        Request::builder()
            .uri(uri)
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_lock_params_builders() {
        assert_eq!(LockParams::user().identity, IdentityKind::User);
        assert_eq!(LockParams::admin().ttl_secs, DEFAULT_REQUEST_LOCK_TTL);
        assert!(LockParams::staff().auto_release);
        assert_eq!(LockParams::ip().identity, IdentityKind::Ip);

        let custom = LockParams::custom("x-tenant").with_ttl(3).with_auto_release(false);
        assert_eq!(custom.identity, IdentityKind::Custom("x-tenant".to_string()));
        assert_eq!(custom.ttl_secs, 3);
        assert!(!custom.auto_release);

        assert_eq!(LockParams::user().lock_name("7", "POST", "/a/:id"), "uid:7:POST:/a/:id");
    }

    #[test]
    fn test_rejection_carries_status_in_body() {
        let rejection = Rejection::new(StatusCode::SERVICE_UNAVAILABLE, "busy");
        assert_eq!(rejection.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(rejection.body(), &RejectionBody::new(503, "busy"));
    }

    #[tokio::test]
    async fn test_rate_limit_counts_by_route_pattern() {
        let app = rate_limited_app(2);

        // Different paths, same pattern, same counter.
        let first = app.clone().oneshot(get_from("1.2.3.4", "/ping/1")).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.headers()[X_RATELIMIT_REMAINING], "1");

        let second = app.clone().oneshot(get_from("1.2.3.4", "/ping/2")).await.unwrap();
        assert_eq!(second.status(), StatusCode::OK);

        let third = app.clone().oneshot(get_from("1.2.3.4", "/ping/3")).await.unwrap();
        assert_eq!(third.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(third.headers()[X_RATELIMIT_LIMIT], "2");
        assert_eq!(third.headers()[X_RATELIMIT_REMAINING], "0");

        let other_client = app.oneshot(get_from("5.6.7.8", "/ping/1")).await.unwrap();
        assert_eq!(other_client.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_per_route_rule_override() {
        let store: SharedStore = Arc::new(MemoryStore::new(100));
        let limiter = RateLimiter::new(store, Namespace::new("mw").unwrap());
        let default = RateLimitPolicy::new(limiter, RateLimitRule::new(5, 30).unwrap());
        let strict = default.clone().with_rule(RateLimitRule::new(2, 30).unwrap());
        assert_eq!(strict.rule().limit, 2);

        let app = Router::new()
            .route("/search", get(|| async { "results" }))
            .route_layer(from_fn_with_state(strict, rate_limit))
            .merge(
                Router::new()
                    .route("/browse", get(|| async { "items" }))
                    .route_layer(from_fn_with_state(default, rate_limit)),
            );

        for _ in 0..2 {
            let search = app.clone().oneshot(get_from("1.2.3.4", "/search")).await.unwrap();
            assert_eq!(search.status(), StatusCode::OK);
            assert_eq!(search.headers()[X_RATELIMIT_LIMIT], "2");
        }
        let refused = app.clone().oneshot(get_from("1.2.3.4", "/search")).await.unwrap();
        assert_eq!(refused.status(), StatusCode::TOO_MANY_REQUESTS);

        let browse = app.oneshot(get_from("1.2.3.4", "/browse")).await.unwrap();
        assert_eq!(browse.status(), StatusCode::OK);
        assert_eq!(browse.headers()[X_RATELIMIT_LIMIT], "5");
        assert_eq!(browse.headers()[X_RATELIMIT_REMAINING], "4");
    }

    #[tokio::test]
    async fn test_custom_identity_keys_the_limiter() {
        let store: SharedStore = Arc::new(MemoryStore::new(100));
        let limiter = RateLimiter::new(store, Namespace::new("mw").unwrap());
        let policy = RateLimitPolicy::new(limiter, RateLimitRule::new(1, 30).unwrap())
            .with_identity(IdentityKind::Custom("tenant".to_string()))
            .with_extractor(Arc::new(BearerTenant));
        let app = Router::new()
            .route("/work", get(|| async { "done" }))
            .route_layer(from_fn_with_state(policy, rate_limit));

        let first = app.clone().oneshot(tenant_request("acme", "1.1.1.1")).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        // Same tenant from another address shares the counter.
        let moved = app.clone().oneshot(tenant_request("acme", "2.2.2.2")).await.unwrap();
        assert_eq!(moved.status(), StatusCode::TOO_MANY_REQUESTS);

        let other = app.oneshot(tenant_request("globex", "1.1.1.1")).await.unwrap();
        assert_eq!(other.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_custom_identity_keys_the_lock() {
        let memory = MemoryStore::new(100);
        let store: SharedStore = Arc::new(memory.clone());
        let policy = LockPolicy::new(store, Namespace::new("mw").unwrap(), LockParams::custom("tenant"))
            .with_extractor(Arc::new(BearerTenant));
        let key = policy.lock_key("acme", "GET", "/work").unwrap();
        assert_eq!(key, "lock:mw:tenant:acme:GET:/work");

        let app = Router::new()
            .route("/work", get(|| async { "done" }))
            .route_layer(from_fn_with_state(policy, lock_guard));

        memory.set(&key, "in-flight", 30, true).await.unwrap();
        let busy = app.clone().oneshot(tenant_request("acme", "1.1.1.1")).await.unwrap();
        assert_eq!(busy.status(), StatusCode::TOO_MANY_REQUESTS);

        let other = app.oneshot(tenant_request("globex", "1.1.1.1")).await.unwrap();
        assert_eq!(other.status(), StatusCode::OK);
        assert_eq!(memory.get(&key).await.unwrap().as_deref(), Some("in-flight"));
    }

    #[tokio::test]
    async fn test_lock_guard_rejects_held_lock_and_releases_after() {
        let memory = MemoryStore::new(100);
        let store: SharedStore = Arc::new(memory.clone());
        let policy = LockPolicy::new(store, Namespace::new("mw").unwrap(), LockParams::user());
        let key = policy.lock_key("7", "GET", "/work").unwrap();

        let app = Router::new()
            .route("/work", get(|| async { "done" }))
            .route_layer(from_fn_with_state(policy, lock_guard));
        let request = || {
            Request::builder()
                .uri("/work")
                .header("x-user-id", "7")
                .body(Body::empty())
                .unwrap()
        };

        memory.set(&key, "someone-else", 30, true).await.unwrap();
        let busy = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(busy.status(), StatusCode::TOO_MANY_REQUESTS);

        memory.delete(&key).await.unwrap();
        let ok = app.oneshot(request()).await.unwrap();
        assert_eq!(ok.status(), StatusCode::OK);
        assert!(memory.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lock_guard_passes_without_identity() {
        let memory = MemoryStore::new(100);
        let store: SharedStore = Arc::new(memory.clone());
        let policy = LockPolicy::new(store, Namespace::new("mw").unwrap(), LockParams::admin());

        let app = Router::new()
            .route("/work", get(|| async { "done" }))
            .route_layer(from_fn_with_state(policy, lock_guard));
        let response = app
            .oneshot(Request::builder().uri("/work").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(memory.is_empty().await);
    }

    #[tokio::test]
    async fn test_lock_without_auto_release_stays_held() {
        let memory = MemoryStore::new(100);
        let store: SharedStore = Arc::new(memory.clone());
        let params = LockParams::user().with_auto_release(false);
        let policy = LockPolicy::new(store, Namespace::new("mw").unwrap(), params);
        let key = policy.lock_key("7", "GET", "/work").unwrap();

        let app = Router::new()
            .route("/work", get(|| async { "done" }))
            .route_layer(from_fn_with_state(policy, lock_guard));
        let request = || {
            Request::builder()
                .uri("/work")
                .header("x-user-id", "7")
                .body(Body::empty())
                .unwrap()
        };

        assert_eq!(app.clone().oneshot(request()).await.unwrap().status(), StatusCode::OK);
        assert!(memory.ttl(&key).await.unwrap() > 0);
        assert_eq!(
            app.oneshot(request()).await.unwrap().status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }
}
