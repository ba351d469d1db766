//! Fill pricing
//!
//! Resolves the price a fill executes at and whether it passes market
//! verification:
//! - `QuoteProvider` is the market data collaborator
//! - `HttpQuoteProvider` talks to an option quote API over HTTP
//! - `StaticQuoteProvider` serves fixed quotes (tests, local development)
//! - `FillPricer` applies the configured `FillPricingPolicy`

use crate::config::FillPricingPolicy;
use crate::error::{AppError, Result};
use crate::services::lifecycle::EntryPricing;
use crate::types::{FillPrice, OptionType, Trade};
use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Identifies one option contract.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContractKey {
    pub ticker: String,
    pub strike: Decimal,
    pub option_type: OptionType,
    pub expiry: NaiveDate,
}

impl ContractKey {
    pub fn new(ticker: &str, strike: Decimal, option_type: OptionType, expiry: NaiveDate) -> Self {
        Self {
            ticker: ticker.to_ascii_uppercase(),
            strike: strike.normalize(),
            option_type,
            expiry,
        }
    }

    pub fn for_trade(trade: &Trade) -> Self {
        Self::new(&trade.ticker, trade.strike, trade.option_type, trade.expiry)
    }
}

impl std::fmt::Display for ContractKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.ticker, self.expiry, self.strike, self.option_type
        )
    }
}

/// Market reference price for a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    pub price: Decimal,
    /// Quote time (ms)
    pub timestamp: i64,
}

/// Market data collaborator.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Current reference price for a contract.
    async fn quote(&self, contract: &ContractKey) -> Result<Quote>;
}

// =============================================================================
// HTTP provider
// =============================================================================

/// Quote API response.
#[derive(Debug, Clone, Deserialize)]
struct OptionQuoteResponse {
    mark: Option<Decimal>,
    bid: Option<Decimal>,
    ask: Option<Decimal>,
    last: Option<Decimal>,
    /// Quote time (ms)
    timestamp: Option<i64>,
}

impl OptionQuoteResponse {
    /// Mark, else bid/ask midpoint, else last trade.
    fn reference_price(&self) -> Option<Decimal> {
        self.mark
            .or_else(|| match (self.bid, self.ask) {
                (Some(bid), Some(ask)) if ask >= bid => Some((bid + ask) / Decimal::TWO),
                _ => None,
            })
            .or(self.last)
            .filter(|p| *p > Decimal::ZERO)
    }
}

/// Option quote API client.
pub struct HttpQuoteProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpQuoteProvider {
    /// Create a new client for the quote API at `base_url`.
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl QuoteProvider for HttpQuoteProvider {
    async fn quote(&self, contract: &ContractKey) -> Result<Quote> {
        let url = format!("{}/options/quote", self.base_url);
        let strike = contract.strike.to_string();
        let expiry = contract.expiry.to_string();
        let option_type = contract.option_type.to_string();

        let mut request = self.client.get(&url).query(&[
            ("ticker", contract.ticker.as_str()),
            ("strike", strike.as_str()),
            ("expiry", expiry.as_str()),
            ("type", option_type.as_str()),
        ]);
        if let Some(ref key) = self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalService(format!(
                "Quote API error: {}",
                response.status()
            )));
        }

        let body: OptionQuoteResponse = response
            .json()
            .await
            .map_err(|e| AppError::ExternalService(format!("Parse error: {}", e)))?;

        let price = body.reference_price().ok_or_else(|| {
            AppError::ExternalService(format!("No usable price for {}", contract))
        })?;

        debug!("Quote for {}: {}", contract, price);
        Ok(Quote {
            price,
            timestamp: body
                .timestamp
                .unwrap_or_else(|| chrono::Utc::now().timestamp_millis()),
        })
    }
}

// =============================================================================
// Static provider
// =============================================================================

/// Serves quotes that were set explicitly. Unknown contracts are unavailable.
#[derive(Default)]
pub struct StaticQuoteProvider {
    quotes: DashMap<ContractKey, Quote>,
}

impl StaticQuoteProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the quote for a contract.
    pub fn set_quote(&self, contract: ContractKey, price: Decimal) {
        self.quotes.insert(
            contract,
            Quote {
                price,
                timestamp: chrono::Utc::now().timestamp_millis(),
            },
        );
    }

    /// Make a contract unavailable.
    pub fn remove_quote(&self, contract: &ContractKey) {
        self.quotes.remove(contract);
    }
}

#[async_trait]
impl QuoteProvider for StaticQuoteProvider {
    async fn quote(&self, contract: &ContractKey) -> Result<Quote> {
        self.quotes
            .get(contract)
            .map(|q| *q.value())
            .ok_or_else(|| AppError::ExternalService(format!("No quote for {}", contract)))
    }
}

// =============================================================================
// Pricing policy
// =============================================================================

/// Whether `proposed` lies within `band_pct` percent of `reference`.
pub fn within_band(proposed: Decimal, reference: Decimal, band_pct: Decimal) -> bool {
    if reference <= Decimal::ZERO {
        return false;
    }
    let tolerance = reference * band_pct / Decimal::ONE_HUNDRED;
    (proposed - reference).abs() <= tolerance
}

/// Applies the fill pricing policy against a quote provider.
#[derive(Clone)]
pub struct FillPricer {
    policy: FillPricingPolicy,
    provider: Arc<dyn QuoteProvider>,
}

impl FillPricer {
    pub fn new(policy: FillPricingPolicy, provider: Arc<dyn QuoteProvider>) -> Self {
        Self { policy, provider }
    }

    /// Price the entry of a new trade. Never fails: anything that prevents
    /// verification yields an unverified entry, which opens a REJECTED trade.
    pub async fn price_entry(&self, contract: &ContractKey, requested: FillPrice) -> EntryPricing {
        let proposed = match requested {
            FillPrice::Fixed(price) => Some(price),
            FillPrice::Market => None,
        };

        let quote = match self.provider.quote(contract).await {
            Ok(quote) => quote,
            Err(e) => {
                warn!("Entry verification unavailable for {}: {}", contract, e);
                return EntryPricing {
                    fill_price: proposed.unwrap_or(Decimal::ZERO),
                    verified: false,
                    reference_price: None,
                    reference_timestamp: None,
                };
            }
        };

        let (fill_price, verified) = match (self.policy, proposed) {
            (FillPricingPolicy::FixedBand { band_pct }, Some(price)) => {
                (price, within_band(price, quote.price, band_pct))
            }
            _ => (quote.price, true),
        };

        if !verified {
            debug!(
                "Entry price {} for {} outside band of reference {}",
                fill_price, contract, quote.price
            );
        }

        EntryPricing {
            fill_price,
            verified,
            reference_price: Some(quote.price),
            reference_timestamp: Some(quote.timestamp),
        }
    }

    /// Price a settlement fill. Fails when no quote is available or a fixed
    /// price falls outside the band.
    pub async fn price_settlement(
        &self,
        contract: &ContractKey,
        requested: FillPrice,
    ) -> Result<(Decimal, Quote)> {
        if let FillPrice::Fixed(price) = requested {
            if price <= Decimal::ZERO {
                return Err(AppError::Validation("fill price must be positive".to_string()));
            }
        }

        let quote = self.provider.quote(contract).await?;

        match (self.policy, requested) {
            (FillPricingPolicy::FixedBand { band_pct }, FillPrice::Fixed(price)) => {
                if within_band(price, quote.price, band_pct) {
                    Ok((price, quote))
                } else {
                    Err(AppError::Validation(format!(
                        "price {} is outside {}% of market {}",
                        price, band_pct, quote.price
                    )))
                }
            }
            _ => Ok((quote.price, quote)),
        }
    }
}
