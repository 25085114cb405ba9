pub mod accounts;
pub mod commands;
pub mod health;
pub mod ranking;
pub mod rate;

use crate::orchestration::TradingDesk;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub desk: Arc<TradingDesk>,
}

impl AppState {
    pub fn new(desk: TradingDesk) -> Self {
        Self {
            desk: Arc::new(desk),
        }
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
        .route("/v1/commands", post(commands::post_command))
        .route(
            "/v1/accounts/:account_id/summary",
            get(accounts::get_summary),
        )
        .route("/v1/accounts/:account_id/trades", get(accounts::get_trades))
        .route("/v1/rate", get(rate::get_rate))
        .route("/v1/ranking", get(ranking::get_ranking))
        .layer(cors)
        .with_state(state)
}
