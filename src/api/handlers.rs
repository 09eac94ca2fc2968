//! API Handlers
//!
//! Demo gateway endpoints: a cache-aside item lookup and a lock-protected
//! reservation, both behind the rate limiter.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{debug, info};

use crate::api::catalog::{Catalog, ReserveError};
use crate::api::middleware::{LockParams, LockPolicy, RateLimitPolicy, Rejection};
use crate::cache::{CacheAside, MissCache};
use crate::config::Config;
use crate::error::{CoordError, Result};
use crate::keys::Namespace;
use crate::limiter::RateLimiter;
use crate::models::{
    ErrorResponse, HealthResponse, ReservationResponse, ReserveRequest, StatsResponse,
};
use crate::store::{MemoryStore, SharedStore, TimeoutStore};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The in-process store, for stats and the expiry sweep
    pub store: MemoryStore,
    pub cache: CacheAside,
    pub catalog: Catalog,
    pub config: Arc<Config>,
    pub rate_limit: RateLimitPolicy,
    pub reserve_lock: LockPolicy,
}

impl AppState {
    /// Wires every component over `store`. Components see it through a
    /// [`TimeoutStore`] bounded by `STORE_TIMEOUT_MS`.
    pub fn new(store: MemoryStore, catalog: Catalog, config: Config) -> Result<Self> {
        config.validate()?;
        let shared: SharedStore = Arc::new(TimeoutStore::new(store.clone(), config.store_timeout()));
        let namespace = Namespace::new(config.key_prefix.clone())?;

        let limiter = RateLimiter::new(shared.clone(), namespace.clone())
            .with_fail_policy(config.fail_policy());
        let rate_limit = RateLimitPolicy::new(limiter, config.rate_rule()?)
            .with_rejection(Rejection::new(config.rate_limit_status()?, "Too Many Requests"));

        let items = Namespace::new(format!("{}.items", config.key_prefix))?;
        let miss = MissCache::new(shared.clone(), items.clone(), config.miss_ttl)?;
        let cache = CacheAside::new(shared.clone(), items).with_miss_cache(miss)?;

        let reserve_lock = LockPolicy::new(
            shared,
            namespace,
            LockParams::user().with_ttl(config.lock_ttl),
        )
        .with_rejection(Rejection::new(
            config.lock_status()?,
            "Request already in progress",
        ));

        Ok(Self {
            store,
            cache,
            catalog,
            config: Arc::new(config),
            rate_limit,
            reserve_lock,
        })
    }

    /// Fresh store sized by `MAX_ENTRIES`, demo catalog.
    pub fn from_config(config: Config) -> Result<Self> {
        let store = MemoryStore::new(config.max_entries);
        Self::new(store, Catalog::demo(), config)
    }
}

/// Handler for GET /items/:id
///
/// Serves from the cache; on a miss the catalog is consulted once and the
/// result, found or not, is remembered.
pub async fn get_item(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    let catalog = state.catalog.clone();
    let item = state
        .cache
        .get_or_set(&id, state.config.cache_ttl, |id| async move {
            Ok::<_, CoordError>(catalog.find(&id).await)
        })
        .await?;

    Ok(match item {
        Some(item) => Json(item).into_response(),
        None => {
            debug!(item = %id, "item not found");
            not_found(&id)
        }
    })
}

/// Handler for POST /items/:id/reserve
///
/// Runs under the per-user request lock; the fresh item replaces the cached
/// copy so reads see the new stock.
pub async fn reserve_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ReserveRequest>,
) -> Result<Response> {
    if let Some(error_msg) = req.validate() {
        return Ok((StatusCode::BAD_REQUEST, Json(ErrorResponse::new(error_msg))).into_response());
    }

    match state.catalog.reserve(&id, req.quantity).await {
        Ok(item) => {
            state.cache.set(&id, &item, state.config.cache_ttl).await?;
            info!(item = %id, quantity = req.quantity, stock = item.stock, "item reserved");
            Ok(Json(ReservationResponse {
                id,
                reserved: req.quantity,
                remaining_stock: item.stock,
            })
            .into_response())
        }
        Err(ReserveError::UnknownItem(_)) => Ok(not_found(&id)),
        Err(err @ ReserveError::OutOfStock { .. }) => {
            Ok((StatusCode::CONFLICT, Json(ErrorResponse::new(err.to_string()))).into_response())
        }
    }
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.store.stats().await;
    Json(StatsResponse::new(&stats, state.catalog.lookups()))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

fn not_found(id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new(format!("Item '{}' not found", id))),
    )
        .into_response()
}
