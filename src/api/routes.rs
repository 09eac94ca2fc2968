//! API Routes
//!
//! Assembles the gateway router.

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{get_item, health_handler, reserve_item, stats_handler, AppState};
use super::middleware::{lock_guard, rate_limit};

/// Creates the router.
///
/// # Endpoints
/// - `GET /health` - Health check
/// - `GET /stats` - Store statistics
/// - `GET /items/:id` - Cache-aside item lookup (rate limited)
/// - `POST /items/:id/reserve` - Reserve stock (rate limited, one in flight per user)
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let items = Router::new()
        .route("/items/:id", get(get_item))
        .route(
            "/items/:id/reserve",
            post(reserve_item).route_layer(from_fn_with_state(
                state.reserve_lock.clone(),
                lock_guard,
            )),
        )
        .route_layer(from_fn_with_state(state.rate_limit.clone(), rate_limit));

    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .merge(items)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::util::ServiceExt;

    fn create_test_app() -> Router {
        create_router(AppState::from_config(Config::default()).unwrap())
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let response = create_test_app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stats_endpoint_is_not_rate_limited() {
        let app = create_test_app();
        for _ in 0..10 {
            let response = app
                .clone()
                .oneshot(Request::builder().uri("/stats").body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn test_item_endpoint() {
        let response = create_test_app()
            .oneshot(Request::builder().uri("/items/1").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-ratelimit-limit"));
    }

    #[tokio::test]
    async fn test_item_not_found() {
        let response = create_test_app()
            .oneshot(Request::builder().uri("/items/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
