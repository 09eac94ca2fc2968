//! Store doubles shared by unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::StoreError;
use crate::store::{Script, Store};

/// Refuses every call, as if the connection were down.
pub struct UnavailableStore;

fn down<T>() -> Result<T, StoreError> {
    Err(StoreError::Unavailable("connection refused".to_string()))
}

#[async_trait]
impl Store for UnavailableStore {
    async fn set(&self, _: &str, _: &str, _: u64, _: bool) -> Result<bool, StoreError> {
        down()
    }
    async fn get(&self, _: &str) -> Result<Option<String>, StoreError> {
        down()
    }
    async fn delete(&self, _: &str) -> Result<bool, StoreError> {
        down()
    }
    async fn delete_many(&self, _: &[String]) -> Result<u64, StoreError> {
        down()
    }
    async fn incr(&self, _: &str) -> Result<i64, StoreError> {
        down()
    }
    async fn expire(&self, _: &str, _: u64) -> Result<bool, StoreError> {
        down()
    }
    async fn ttl(&self, _: &str) -> Result<i64, StoreError> {
        down()
    }
    async fn eval(&self, _: Script, _: &[String], _: &[String]) -> Result<i64, StoreError> {
        down()
    }
    async fn mget(&self, _: &[String]) -> Result<Vec<Option<String>>, StoreError> {
        down()
    }
    async fn mset(&self, _: &[(String, String)], _: u64) -> Result<bool, StoreError> {
        down()
    }
}

/// Forwards to an inner store and counts calls per command name.
#[derive(Clone)]
pub struct CountingStore<S> {
    inner: S,
    calls: Arc<Mutex<HashMap<&'static str, usize>>>,
}

impl<S: Store> CountingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            calls: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn calls(&self, op: &str) -> usize {
        self.calls.lock().unwrap().get(op).copied().unwrap_or(0)
    }

    fn record(&self, op: &'static str) {
        *self.calls.lock().unwrap().entry(op).or_insert(0) += 1;
    }
}

#[async_trait]
impl<S: Store> Store for CountingStore<S> {
    async fn set(&self, key: &str, value: &str, ttl: u64, nx: bool) -> Result<bool, StoreError> {
        self.record("set");
        self.inner.set(key, value, ttl, nx).await
    }
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.record("get");
        self.inner.get(key).await
    }
    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.record("delete");
        self.inner.delete(key).await
    }
    async fn delete_many(&self, keys: &[String]) -> Result<u64, StoreError> {
        self.record("delete_many");
        self.inner.delete_many(keys).await
    }
    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        self.record("incr");
        self.inner.incr(key).await
    }
    async fn expire(&self, key: &str, ttl: u64) -> Result<bool, StoreError> {
        self.record("expire");
        self.inner.expire(key, ttl).await
    }
    async fn ttl(&self, key: &str) -> Result<i64, StoreError> {
        self.record("ttl");
        self.inner.ttl(key).await
    }
    async fn eval(&self, script: Script, keys: &[String], args: &[String]) -> Result<i64, StoreError> {
        self.record(script.name());
        self.inner.eval(script, keys, args).await
    }
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError> {
        self.record("mget");
        self.inner.mget(keys).await
    }
    async fn mset(&self, pairs: &[(String, String)], ttl: u64) -> Result<bool, StoreError> {
        self.record("mset");
        self.inner.mset(pairs, ttl).await
    }
}

/// Forwards to an inner store, except that every delete fails.
pub struct FailingDeletes<S> {
    inner: S,
}

impl<S: Store> FailingDeletes<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S: Store> Store for FailingDeletes<S> {
    async fn set(&self, key: &str, value: &str, ttl: u64, nx: bool) -> Result<bool, StoreError> {
        self.inner.set(key, value, ttl, nx).await
    }
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key).await
    }
    async fn delete(&self, _: &str) -> Result<bool, StoreError> {
        down()
    }
    async fn delete_many(&self, _: &[String]) -> Result<u64, StoreError> {
        down()
    }
    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        self.inner.incr(key).await
    }
    async fn expire(&self, key: &str, ttl: u64) -> Result<bool, StoreError> {
        self.inner.expire(key, ttl).await
    }
    async fn ttl(&self, key: &str) -> Result<i64, StoreError> {
        self.inner.ttl(key).await
    }
    async fn eval(&self, script: Script, keys: &[String], args: &[String]) -> Result<i64, StoreError> {
        self.inner.eval(script, keys, args).await
    }
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>, StoreError> {
        self.inner.mget(keys).await
    }
    async fn mset(&self, pairs: &[(String, String)], ttl: u64) -> Result<bool, StoreError> {
        self.inner.mset(pairs, ttl).await
    }
}
