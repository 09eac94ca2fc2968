//! Key Namespace Module
//!
//! Deterministic derivation of store keys. Every key is
//! `<kind>:<prefix>:<logical>` where the kind tag is fixed per key type and the
//! prefix never contains `:`, so two keys are equal only when kind, prefix and
//! logical key all are.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::error::{ensure_key, CoordError, Result};

const SEPARATOR: char = ':';
const CACHE_TAG: &str = "cache";
const MISS_TAG: &str = "miss";
const LOCK_TAG: &str = "lock";
const LIMITER_TAG: &str = "limiter";

// == Namespace ==
/// Prefix under which a component stores its keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    prefix: String,
}

impl Namespace {
    /// Creates a namespace. An empty prefix or one containing `:` is rejected.
    pub fn new(prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        if prefix.is_empty() {
            return Err(CoordError::InvalidConfig(
                "namespace prefix cannot be empty".to_string(),
            ));
        }
        if prefix.contains(SEPARATOR) {
            return Err(CoordError::InvalidConfig(format!(
                "namespace prefix '{}' cannot contain '{}'",
                prefix, SEPARATOR
            )));
        }
        Ok(Self { prefix })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// `cache:<prefix>:<key>`
    pub fn key(&self, logical: &str) -> Result<String> {
        self.tagged(CACHE_TAG, logical)
    }

    /// `miss:<prefix>:<key>`, the negative-cache companion of [`Namespace::key`].
    pub fn miss_key(&self, logical: &str) -> Result<String> {
        self.tagged(MISS_TAG, logical)
    }

    /// `lock:<prefix>:<key>`
    pub fn lock_key(&self, logical: &str) -> Result<String> {
        self.tagged(LOCK_TAG, logical)
    }

    /// `limiter:<sha256 hex>` over the prefix and every part.
    ///
    /// Parts are hashed rather than concatenated so arbitrary identities and
    /// route patterns stay within the store's key length limit. Each part is
    /// length-prefixed before hashing, so `["a:b", "c"]` and `["a", "b:c"]`
    /// count separately.
    pub fn limiter_key(&self, parts: &[&str]) -> Result<String> {
        if parts.is_empty() || parts.iter().any(|part| part.is_empty()) {
            return Err(CoordError::InvalidConfig(
                "rate limit key parts cannot be empty".to_string(),
            ));
        }
        Ok(format!("{}{}{}", LIMITER_TAG, SEPARATOR, digest(&self.prefix, parts)))
    }

    fn tagged(&self, tag: &str, logical: &str) -> Result<String> {
        ensure_key(logical)?;
        Ok(format!("{}{}{}{}{}", tag, SEPARATOR, self.prefix, SEPARATOR, logical))
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prefix)
    }
}

fn digest(prefix: &str, parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for field in std::iter::once(prefix).chain(parts.iter().copied()) {
        hasher.update((field.len() as u64).to_be_bytes());
        hasher.update(field.as_bytes());
    }
    hex::encode(hasher.finalize())
}

// == Identity Kind ==
/// Who a lock or rate-limit counter is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentityKind {
    /// Back-office administrator
    Admin,
    /// Customer-service staff
    Staff,
    /// Authenticated end user
    User,
    /// Client address
    Ip,
    /// Application-defined identity; the name doubles as its key fragment
    Custom(String),
}

impl IdentityKind {
    /// Store-key fragment for this kind.
    pub fn fragment(&self) -> &str {
        match self {
            IdentityKind::Admin => "admin",
            IdentityKind::Staff => "staff",
            IdentityKind::User => "uid",
            IdentityKind::Ip => "ip",
            IdentityKind::Custom(name) => name,
        }
    }

    /// `<fragment>:<identity>`
    pub fn scoped(&self, identity: &str) -> String {
        format!("{}:{}", self.fragment(), identity)
    }
}

impl fmt::Display for IdentityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.fragment())
    }
}
