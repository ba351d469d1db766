//! Trades API
//!
//! - GET /api/trades - List trades visible to the caller
//! - POST /api/trades - Open a trade
//! - GET /api/trades/:id - Get a trade with its fills
//! - POST /api/trades/:id/settle - Sell part or all of an open trade
//! - DELETE /api/trades/:id - Delete an open trade

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::api::ApiResponse;
use crate::error::AppError;
use crate::types::{CreateTradeRequest, RequestContext, SettleTradeRequest, Settlement, Trade, TradeFilter};
use crate::AppState;

/// Create trades router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_trades).post(create_trade))
        .route("/:id", get(get_trade).delete(delete_trade))
        .route("/:id/settle", post(settle_trade))
}

/// POST /api/trades
///
/// A trade whose entry price fails verification is still created, as REJECTED.
async fn create_trade(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(request): Json<CreateTradeRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Trade>>), AppError> {
    let trade = state.trading_service.create_trade(&ctx, request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse { data: trade })))
}

/// GET /api/trades
async fn list_trades(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(filter): Query<TradeFilter>,
) -> Result<Json<ApiResponse<Vec<Trade>>>, AppError> {
    let trades = state.trading_service.list_trades(&ctx, filter)?;
    Ok(Json(ApiResponse { data: trades }))
}

/// GET /api/trades/:id
async fn get_trade(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Trade>>, AppError> {
    let trade = state.trading_service.get_trade(&ctx, &id)?;
    Ok(Json(ApiResponse { data: trade }))
}

/// POST /api/trades/:id/settle
async fn settle_trade(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Json(request): Json<SettleTradeRequest>,
) -> Result<Json<ApiResponse<Settlement>>, AppError> {
    let settlement = state.trading_service.settle_trade(&ctx, &id, request).await?;
    Ok(Json(ApiResponse { data: settlement }))
}

/// DELETE /api/trades/:id
async fn delete_trade(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.trading_service.delete_trade(&ctx, &id)?;
    Ok(StatusCode::NO_CONTENT)
}
