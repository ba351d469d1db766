//! Strikeboard - options trade journal with P&L, streaks and leaderboards

pub mod api;
pub mod config;
pub mod error;
pub mod services;
pub mod types;

use config::Config;
use services::TradingService;
use std::sync::Arc;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub trading_service: Arc<TradingService>,
}

// Re-export commonly used types
pub use error::{AppError, Result};
pub use types::*;
