//! Value Serialization
//!
//! Turns cached values into the store's string representation and back.

use serde::{de::DeserializeOwned, Serialize};

use crate::error::Result;

/// Encoding used by [`CacheAside`](super::CacheAside) for stored values.
pub trait Serializer: Send + Sync {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String>;
    fn decode<T: DeserializeOwned>(&self, raw: &str) -> Result<T>;
}

/// JSON via serde_json.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String> {
        Ok(serde_json::to_string(value)?)
    }

    fn decode<T: DeserializeOwned>(&self, raw: &str) -> Result<T> {
        Ok(serde_json::from_str(raw)?)
    }
}
