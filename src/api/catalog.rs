//! Demo Catalog
//!
//! Stands in for the slow system of record behind the gateway. Every
//! [`Catalog::find`] is counted so the effect of caching shows in `/stats`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub stock: u32,
}

impl Item {
    pub fn new(id: impl Into<String>, name: impl Into<String>, stock: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            stock,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ReserveError {
    #[error("Item '{0}' not found")]
    UnknownItem(String),

    #[error("Only {available} left of item '{id}'")]
    OutOfStock { id: String, available: u32 },
}

#[derive(Clone, Default)]
pub struct Catalog {
    items: Arc<RwLock<HashMap<String, Item>>>,
    lookups: Arc<AtomicU64>,
}

impl Catalog {
    pub fn new(items: impl IntoIterator<Item = Item>) -> Self {
        let items = items.into_iter().map(|item| (item.id.clone(), item)).collect();
        Self {
            items: Arc::new(RwLock::new(items)),
            lookups: Arc::new(AtomicU64::new(0)),
        }
    }

    /// A handful of items to play with.
    pub fn demo() -> Self {
        Self::new([
            Item::new("1", "keyboard", 12),
            Item::new("2", "mouse", 40),
            Item::new("3", "monitor", 3),
        ])
    }

    pub async fn find(&self, id: &str) -> Option<Item> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        self.items.read().await.get(id).cloned()
    }

    pub fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }

    /// Takes `quantity` units from stock and returns the updated item.
    pub async fn reserve(&self, id: &str, quantity: u32) -> Result<Item, ReserveError> {
        let mut items = self.items.write().await;
        let item = items
            .get_mut(id)
            .ok_or_else(|| ReserveError::UnknownItem(id.to_string()))?;
        if item.stock < quantity {
            return Err(ReserveError::OutOfStock {
                id: id.to_string(),
                available: item.stock,
            });
        }
        item.stock -= quantity;
        Ok(item.clone())
    }
}
