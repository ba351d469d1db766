pub mod context;
pub mod health;
pub mod leaderboard;
pub mod trades;
pub mod users;

use crate::AppState;
use axum::Router;
use serde::Serialize;

/// API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest("/api/trades", trades::router())
        .nest("/api/leaderboard", leaderboard::router())
        .nest("/api/users", users::router())
        .nest("/api/companies", users::companies_router())
}
