//! Response DTOs for the gateway API

use serde::{Deserialize, Serialize};

use crate::store::StoreStats;

/// Body sent when a request is refused by the rate limiter or lock middleware.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectionBody {
    /// Mirrors the HTTP status
    pub code: u16,
    pub msg: String,
}

impl RejectionBody {
    pub fn new(code: u16, msg: impl Into<String>) -> Self {
        Self {
            code,
            msg: msg.into(),
        }
    }
}

/// Response body for `POST /items/:id/reserve`
#[derive(Debug, Clone, Serialize)]
pub struct ReservationResponse {
    pub id: String,
    pub reserved: u32,
    pub remaining_stock: u32,
}

/// Response body for `GET /stats`
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    /// Atomic scripts executed (lock releases, window increments, cache writes)
    pub scripts: u64,
    pub total_entries: usize,
    pub hit_rate: f64,
    /// Times the backing catalog was consulted, i.e. cache misses that computed
    pub catalog_lookups: u64,
}

impl StatsResponse {
    pub fn new(stats: &StoreStats, catalog_lookups: u64) -> Self {
        Self {
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
            expirations: stats.expirations,
            scripts: stats.scripts,
            total_entries: stats.total_entries,
            hit_rate: stats.hit_rate(),
            catalog_lookups,
        }
    }
}

/// Response body for `GET /health`
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    /// RFC 3339 timestamp
    pub timestamp: String,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error body for handler failures
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
