//! Users & Companies API
//!
//! Profiles:
//! - PUT /api/users - Create or update a profile
//! - GET /api/users/:id - Get a profile
//! - PUT /api/users/:id/leaderboard - Set leaderboard opt-in
//! - GET /api/users/:id/stats?range= - Personal and company stats
//!
//! Companies:
//! - GET /api/companies - List companies
//! - POST /api/companies - Create a company
//! - GET /api/companies/:id - Get a company

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::ApiResponse;
use crate::error::AppError;
use crate::types::{
    Company, CreateCompanyRequest, DateRange, Profile, RequestContext, UpsertProfileRequest,
    UserStats,
};
use crate::AppState;

/// Create users router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", put(upsert_profile))
        .route("/:id", get(get_profile))
        .route("/:id/leaderboard", put(set_leaderboard_opt_in))
        .route("/:id/stats", get(get_user_stats))
}

/// Create companies router.
pub fn companies_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_companies).post(create_company))
        .route("/:id", get(get_company))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptInRequest {
    pub show_on_leaderboard: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StatsQuery {
    pub range: DateRange,
}

// =============================================================================
// Profile Handlers
// =============================================================================

/// PUT /api/users
async fn upsert_profile(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(request): Json<UpsertProfileRequest>,
) -> Result<Json<ApiResponse<Profile>>, AppError> {
    let profile = state.trading_service.upsert_profile(&ctx, request)?;
    Ok(Json(ApiResponse { data: profile }))
}

/// GET /api/users/:id
async fn get_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Profile>>, AppError> {
    let profile = state.trading_service.get_profile(&id)?;
    Ok(Json(ApiResponse { data: profile }))
}

/// PUT /api/users/:id/leaderboard
async fn set_leaderboard_opt_in(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Json(request): Json<OptInRequest>,
) -> Result<Json<ApiResponse<Profile>>, AppError> {
    let profile = state
        .trading_service
        .set_leaderboard_opt_in(&ctx, &id, request.show_on_leaderboard)?;
    Ok(Json(ApiResponse { data: profile }))
}

/// GET /api/users/:id/stats
async fn get_user_stats(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<ApiResponse<UserStats>>, AppError> {
    let stats = state.trading_service.get_user_stats(&id, query.range)?;
    Ok(Json(ApiResponse { data: stats }))
}

// =============================================================================
// Company Handlers
// =============================================================================

/// GET /api/companies
async fn list_companies(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Company>>>, AppError> {
    let companies = state.trading_service.list_companies()?;
    Ok(Json(ApiResponse { data: companies }))
}

/// POST /api/companies
async fn create_company(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(request): Json<CreateCompanyRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Company>>), AppError> {
    let company = state.trading_service.create_company(&ctx, request)?;
    Ok((StatusCode::CREATED, Json(ApiResponse { data: company })))
}

/// GET /api/companies/:id
async fn get_company(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Company>>, AppError> {
    let company = state.trading_service.get_company(&id)?;
    Ok(Json(ApiResponse { data: company }))
}
