//! Fixed-Window Rate Limiter
//!
//! Counts requests per key in non-overlapping windows. Increment, window start
//! and threshold comparison happen in one atomic script, so concurrent callers
//! cannot race past the limit. A burst straddling a window boundary can still
//! admit up to twice the limit.

use tracing::{debug, warn};

use crate::error::{ensure_ttl, CoordError, Result};
use crate::keys::Namespace;
use crate::store::{Script, SharedStore};

/// Requests allowed per window when nothing else is configured.
pub const DEFAULT_LIMIT: u64 = 5;

/// Window length in seconds when nothing else is configured.
pub const DEFAULT_WINDOW_SECS: u64 = 3;

// == Rule ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRule {
    pub limit: u64,
    pub window_secs: u64,
}

impl RateLimitRule {
    /// Rejects a zero limit or a zero-second window.
    pub fn new(limit: u64, window_secs: u64) -> Result<Self> {
        if limit == 0 {
            return Err(CoordError::InvalidConfig(
                "rate limit must allow at least one request".to_string(),
            ));
        }
        ensure_ttl("rate limit window", window_secs)?;
        Ok(Self { limit, window_secs })
    }
}

impl Default for RateLimitRule {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            window_secs: DEFAULT_WINDOW_SECS,
        }
    }
}

// == Fail Policy ==
/// What to decide when the store cannot be consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailPolicy {
    /// Admit the request; a store outage does not become a full outage.
    #[default]
    Open,
    /// Refuse the request.
    Closed,
}

impl FailPolicy {
    pub fn from_fail_open(fail_open: bool) -> Self {
        if fail_open {
            FailPolicy::Open
        } else {
            FailPolicy::Closed
        }
    }
}

// == Decision ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u64,
    /// Requests still admitted in the current window
    pub remaining: u64,
    /// Seconds until the window resets; meaningful when refused
    pub remaining_ttl: u64,
    /// The store was unreachable and the fail policy decided
    pub degraded: bool,
}

// == Rate Limiter ==
#[derive(Clone)]
pub struct RateLimiter {
    store: SharedStore,
    namespace: Namespace,
    fail_policy: FailPolicy,
}

impl RateLimiter {
    pub fn new(store: SharedStore, namespace: Namespace) -> Self {
        Self {
            store,
            namespace,
            fail_policy: FailPolicy::default(),
        }
    }

    pub fn with_fail_policy(mut self, fail_policy: FailPolicy) -> Self {
        self.fail_policy = fail_policy;
        self
    }

    pub fn fail_policy(&self) -> FailPolicy {
        self.fail_policy
    }

    /// Counts one hit against the logical `key`.
    pub async fn check_and_increment(&self, key: &str, limit: u64, window_secs: u64) -> Result<Decision> {
        let rule = RateLimitRule::new(limit, window_secs)?;
        let store_key = self.namespace.limiter_key(&[key])?;
        Ok(self.hit(store_key, rule).await)
    }

    /// Counts one hit for a request, keyed by caller identity, HTTP method and
    /// route pattern so the same endpoint always maps to the same counter.
    pub async fn check_request(
        &self,
        identity: &str,
        method: &str,
        route: &str,
        rule: RateLimitRule,
    ) -> Result<Decision> {
        let rule = RateLimitRule::new(rule.limit, rule.window_secs)?;
        let store_key = self.namespace.limiter_key(&[identity, method, route])?;
        Ok(self.hit(store_key, rule).await)
    }

    async fn hit(&self, store_key: String, rule: RateLimitRule) -> Decision {
        let keys = [store_key];
        let args = [rule.window_secs.to_string(), rule.limit.to_string()];

        match self
            .store
            .eval(Script::FixedWindowIncrement, &keys, &args)
            .await
        {
            Ok(count) if count > 0 => {
                let count = count as u64;
                debug!(key = %keys[0], count, limit = rule.limit, "rate limit hit admitted");
                Decision {
                    allowed: true,
                    limit: rule.limit,
                    remaining: rule.limit.saturating_sub(count),
                    remaining_ttl: 0,
                    degraded: false,
                }
            }
            Ok(_) => {
                let remaining_ttl = self.remaining_ttl(&keys[0]).await;
                debug!(key = %keys[0], remaining_ttl, "rate limit exceeded");
                Decision {
                    allowed: false,
                    limit: rule.limit,
                    remaining: 0,
                    remaining_ttl,
                    degraded: false,
                }
            }
            Err(err) => {
                let allowed = self.fail_policy == FailPolicy::Open;
                warn!(key = %keys[0], error = %err, allowed, "rate limit store unavailable, applying fail policy");
                Decision {
                    allowed,
                    limit: rule.limit,
                    remaining: 0,
                    remaining_ttl: if allowed { 0 } else { rule.window_secs },
                    degraded: true,
                }
            }
        }
    }

    async fn remaining_ttl(&self, store_key: &str) -> u64 {
        match self.store.ttl(store_key).await {
            Ok(ttl) if ttl > 0 => ttl as u64,
            Ok(_) => 0,
            Err(err) => {
                warn!(key = %store_key, error = %err, "could not read rate limit ttl");
                0
            }
        }
    }
}
