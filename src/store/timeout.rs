//! Deadline Decorator
//!
//! Bounds every call to an inner store. An elapsed deadline surfaces as
//! [`StoreError::Timeout`], which components handle exactly like an outage.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::error::StoreError;
use crate::store::{Script, Store};

#[derive(Debug, Clone)]
pub struct TimeoutStore<S> {
    inner: S,
    timeout: Duration,
}

impl<S: Store> TimeoutStore<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn bounded<T: Send>(
        &self,
        op: &'static str,
        call: impl Future<Output = Result<T, StoreError>> + Send,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(op, timeout_ms = self.timeout.as_millis() as u64, "store call timed out");
                Err(StoreError::Timeout(self.timeout))
            }
        }
    }
}

#[async_trait]
impl<S: Store> Store for TimeoutStore<S> {
    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl_secs: u64,
        only_if_absent: bool,
    ) -> Result<bool, StoreError> {
        self.bounded("set", self.inner.set(key, value, ttl_secs, only_if_absent))
            .await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.bounded("get", self.inner.get(key)).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.bounded("delete", self.inner.delete(key)).await
    }

    async fn delete_many(&self, keys: &[String]) -> Result<u64, StoreError> {
        self.bounded("delete_many", self.inner.delete_many(keys)).await
    }

    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        self.bounded("incr", self.inner.incr(key)).await
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool, StoreError> {
        self.bounded("expire", self.inner.expire(key, ttl_secs)).await
    }

    async fn ttl(&self, key: &str) -> Result<i64, StoreError> {
        self.bounded("ttl", self.inner.ttl(key)).await
    }

    async fn eval(
        &self,
        script: Script,
        keys: &[String],
        args: &[String],
    ) -> Result<i64, StoreError> {
        self.bounded(script.name(), self.inner.eval(script, keys, args))
            .await
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError> {
        self.bounded("mget", self.inner.mget(keys)).await
    }

    async fn mset(&self, pairs: &[(String, String)], ttl_secs: u64) -> Result<bool, StoreError> {
        self.bounded("mset", self.inner.mset(pairs, ttl_secs)).await
    }
}
