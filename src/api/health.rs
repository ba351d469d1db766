use crate::config::FillPricingPolicy;
use crate::AppState;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    /// "fixed_band" or "market_order"
    pricing_policy: &'static str,
    max_contracts: u32,
}

fn policy_name(policy: FillPricingPolicy) -> &'static str {
    match policy {
        FillPricingPolicy::FixedBand { .. } => "fixed_band",
        FillPricingPolicy::MarketOrder => "market_order",
    }
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        pricing_policy: policy_name(state.config.pricing_policy),
        max_contracts: state.config.max_contracts,
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/health", get(health))
}
