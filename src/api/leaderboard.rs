//! Leaderboard API
//!
//! - GET /api/leaderboard?scope=&range=&page=&pageSize=&search=&sort=

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::ApiResponse;
use crate::error::AppError;
use crate::types::{DateRange, LeaderboardPage, LeaderboardRequest, LeaderboardSort, ScopeKind};
use crate::AppState;

/// Create leaderboard router.
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_leaderboard))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LeaderboardQuery {
    pub scope: ScopeKind,
    pub range: DateRange,
    /// 1-based
    pub page: Option<usize>,
    pub page_size: Option<usize>,
    pub search: Option<String>,
    pub sort: LeaderboardSort,
}

impl From<LeaderboardQuery> for LeaderboardRequest {
    fn from(query: LeaderboardQuery) -> Self {
        LeaderboardRequest {
            scope: query.scope,
            range: query.range,
            page: query.page.unwrap_or(1),
            // 0 selects the configured default
            page_size: query.page_size.unwrap_or(0),
            search: query.search,
            sort: query.sort,
        }
    }
}

/// GET /api/leaderboard
async fn get_leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<ApiResponse<LeaderboardPage>>, AppError> {
    let page = state.trading_service.get_leaderboard(query.into())?;
    Ok(Json(ApiResponse { data: page }))
}
