pub mod accounts;
pub mod deposit;
pub mod health;
pub mod markets;
pub mod notifications;
pub mod positions;

use crate::orchestration::TradingSession;
use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<TradingSession>,
}

impl AppState {
    pub fn new(session: Arc<TradingSession>) -> Self {
        Self { session }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/accounts", get(accounts::get_accounts))
        .route("/v1/accounts/selected", put(accounts::put_selected))
        .route(
            "/v1/markets/current",
            get(markets::get_current).put(markets::put_current),
        )
        .route(
            "/v1/deposit",
            get(deposit::get_deposit).patch(deposit::patch_deposit),
        )
        .route("/v1/deposit/submit", post(deposit::submit))
        .route("/v1/positions", get(positions::get_positions))
        .route("/v1/positions/:id/close", post(positions::close_position))
        .route("/v1/notifications", get(notifications::get_notifications))
        .layer(cors)
        .with_state(state)
}
