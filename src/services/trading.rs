//! Trading Service
//!
//! Boundary operations over option trades:
//! - Trade management (create, settle, delete, get, list)
//! - Profiles, companies and leaderboard opt-in
//! - Stats and leaderboard queries
//!
//! Uses SQLite for persistence and a TTL cache for ranked leaderboards.

use crate::config::{Config, LeaderboardConfig};
use crate::error::{AppError, Result};
use crate::services::cache::{RankingCache, RankingKey};
use crate::services::notifier::{Notifier, TradeEvent};
use crate::services::pricing::{ContractKey, FillPricer};
use crate::services::{access, leaderboard, lifecycle, stats, SqliteStore};
use crate::types::{
    Company, CreateCompanyRequest, CreateTradeRequest, DateRange, FillSide, LeaderboardPage,
    LeaderboardRequest, Profile, RankedEntry, RequestContext, ScopeIdentity, ScopeKind,
    ScopeStats, SettleTradeRequest, Settlement, Trade, TradeFilter, UpsertProfileRequest,
    UserStats,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Option trade service.
#[derive(Clone)]
pub struct TradingService {
    /// SQLite store for persistence
    store: Arc<SqliteStore>,
    /// Fill pricing policy and quote source
    pricer: FillPricer,
    /// Receives committed trade events
    notifier: Arc<dyn Notifier>,
    /// Ranked leaderboards per (scope, range, sort)
    rankings: Arc<RankingCache>,
    max_contracts: u32,
    leaderboard: LeaderboardConfig,
}

impl TradingService {
    /// Create a new trading service.
    pub fn new(
        store: Arc<SqliteStore>,
        pricer: FillPricer,
        notifier: Arc<dyn Notifier>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            pricer,
            notifier,
            rankings: Arc::new(RankingCache::new(Duration::from_secs(
                config.leaderboard.cache_ttl_secs,
            ))),
            max_contracts: config.max_contracts,
            leaderboard: config.leaderboard.clone(),
        }
    }

    /// Drop every cached ranking.
    fn invalidate_rankings(&self) {
        if !self.rankings.is_empty() {
            debug!("Invalidating {} cached rankings", self.rankings.len());
        }
        self.rankings.clear();
    }

    fn load_trade(&self, trade_id: &str) -> Result<Trade> {
        self.store
            .get_trade(trade_id)?
            .ok_or_else(|| AppError::NotFound(format!("trade {}", trade_id)))
    }

    // ========== Trades ==========

    /// Open a trade. Failed price verification yields a REJECTED trade
    /// rather than an error.
    pub async fn create_trade(&self, ctx: &RequestContext, order: CreateTradeRequest) -> Result<Trade> {
        access::can_create_trade(ctx)?;

        let now = chrono::Utc::now();
        let order = lifecycle::validate_order(&order, self.max_contracts, now.date_naive())?;

        let contract = ContractKey::new(&order.ticker, order.strike, order.option_type, order.expiry);
        let entry = self.pricer.price_entry(&contract, order.fill_price).await;

        let trade = lifecycle::open_trade(
            &ctx.user_id,
            ctx.company_id.clone(),
            &order,
            entry,
            now.timestamp_millis(),
        );
        self.store.insert_trade(&trade)?;

        info!(
            "Trade {} {} for {}: {} x {} @ {}",
            trade.id, trade.status, trade.user_id, trade.contracts, contract, trade.fill_price
        );

        self.invalidate_rankings();
        self.notifier.notify(TradeEvent::Created {
            trade: trade.clone(),
        });
        Ok(trade)
    }

    /// Sell part or all of an open trade.
    pub async fn settle_trade(
        &self,
        ctx: &RequestContext,
        trade_id: &str,
        request: SettleTradeRequest,
    ) -> Result<Settlement> {
        let trade = self.load_trade(trade_id)?;
        access::can_modify_trade(ctx, &trade)?;

        // Fail fast before asking for a quote; the store re-checks atomically
        if !trade.is_open() {
            return Err(AppError::InvalidState(format!(
                "trade {} is {}",
                trade.id, trade.status
            )));
        }
        if request.contracts == 0 {
            return Err(AppError::Validation("contracts must be positive".to_string()));
        }
        if request.contracts > trade.remaining_open_contracts {
            return Err(AppError::Validation(format!(
                "{} contracts exceeds remaining {}",
                request.contracts, trade.remaining_open_contracts
            )));
        }

        let contract = ContractKey::for_trade(&trade);
        let (price, quote) = self
            .pricer
            .price_settlement(&contract, request.fill_price)
            .await?;

        let fill = lifecycle::new_fill(
            &trade.id,
            FillSide::Sell,
            request.contracts,
            price,
            Some(quote.price),
            Some(quote.timestamp),
            chrono::Utc::now().timestamp_millis(),
        );
        let trade = self.store.settle_trade(trade_id, fill.clone())?;

        info!(
            "Settled {} contracts of trade {} @ {} ({} remaining, {})",
            fill.contracts, trade.id, fill.fill_price, trade.remaining_open_contracts, trade.status
        );

        self.invalidate_rankings();
        self.notifier.notify(TradeEvent::Settled {
            trade: trade.clone(),
            fill: fill.clone(),
        });
        Ok(Settlement { trade, fill })
    }

    /// Delete an open trade and its fills.
    pub fn delete_trade(&self, ctx: &RequestContext, trade_id: &str) -> Result<()> {
        let trade = self.load_trade(trade_id)?;
        access::can_modify_trade(ctx, &trade)?;

        let deleted = self.store.delete_trade(trade_id)?;
        info!("Deleted trade {} of {}", deleted.id, deleted.user_id);

        self.invalidate_rankings();
        self.notifier.notify(TradeEvent::Deleted {
            trade_id: deleted.id,
            user_id: deleted.user_id,
        });
        Ok(())
    }

    pub fn get_trade(&self, ctx: &RequestContext, trade_id: &str) -> Result<Trade> {
        let trade = self.load_trade(trade_id)?;
        access::can_view_trade(ctx, &trade)?;
        Ok(trade)
    }

    /// List trades visible to the caller. Without a user or company filter,
    /// lists the caller's own trades.
    pub fn list_trades(&self, ctx: &RequestContext, mut filter: TradeFilter) -> Result<Vec<Trade>> {
        if let Some(ref company_id) = filter.company_id {
            if !ctx.role.is_company_manager() || ctx.company_id.as_ref() != Some(company_id) {
                return Err(AppError::Unauthorized(format!(
                    "{} may not list trades of company {}",
                    ctx.user_id, company_id
                )));
            }
        } else if let Some(user_id) = filter.user_id.as_deref() {
            if user_id != ctx.user_id {
                let company_id = self
                    .store
                    .get_profile(user_id)?
                    .and_then(|p| p.company_id);
                access::can_list_user_trades(ctx, user_id, company_id.as_deref())?;
            }
        } else {
            filter.user_id = Some(ctx.user_id.clone());
        }

        self.store.list_trades(&filter)
    }

    // ========== Profiles & Companies ==========

    /// Create or update a profile.
    pub fn upsert_profile(&self, ctx: &RequestContext, request: UpsertProfileRequest) -> Result<Profile> {
        let existing = self.store.get_profile(&request.user_id)?;
        // The caller must manage both the company the user is in and the one they move to
        if let Some(ref current) = existing {
            access::can_manage_profile(ctx, &request.user_id, current.company_id.as_deref())?;
        }
        access::can_manage_profile(ctx, &request.user_id, request.company_id.as_deref())?;
        if request.role.is_company_manager() && !ctx.role.is_company_manager() {
            return Err(AppError::Unauthorized(format!(
                "role {} cannot grant {}",
                ctx.role, request.role
            )));
        }

        let username = validate_username(&request.username)?;
        let display_name = request
            .display_name
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| username.clone());

        let mut profile = match existing {
            Some(existing) => existing,
            None => Profile::new(request.user_id.clone(), username.clone(), request.role),
        };
        profile.company_id = request.company_id;
        profile.username = username;
        profile.display_name = display_name;
        profile.role = request.role;
        profile.show_on_leaderboard = request.show_on_leaderboard;
        profile.updated_at = chrono::Utc::now().timestamp_millis();

        self.store.upsert_profile(&profile)?;
        info!("Saved profile {} ({})", profile.user_id, profile.role);

        self.invalidate_rankings();
        Ok(profile)
    }

    pub fn get_profile(&self, user_id: &str) -> Result<Profile> {
        self.store
            .get_profile(user_id)?
            .ok_or_else(|| AppError::NotFound(format!("profile {}", user_id)))
    }

    /// Opt a user in to or out of the public leaderboard.
    pub fn set_leaderboard_opt_in(&self, ctx: &RequestContext, user_id: &str, show: bool) -> Result<Profile> {
        let profile = self.get_profile(user_id)?;
        access::can_manage_profile(ctx, user_id, profile.company_id.as_deref())?;

        if !self.store.set_leaderboard_opt_in(user_id, show)? {
            return Err(AppError::NotFound(format!("profile {}", user_id)));
        }
        info!("Leaderboard opt-in for {} set to {}", user_id, show);

        self.invalidate_rankings();
        self.get_profile(user_id)
    }

    /// Create a company. Only owners and admins may do this.
    pub fn create_company(&self, ctx: &RequestContext, request: CreateCompanyRequest) -> Result<Company> {
        if !ctx.role.is_company_manager() {
            return Err(AppError::Unauthorized(format!(
                "role {} cannot create companies",
                ctx.role
            )));
        }

        let name = request.name.trim();
        if name.is_empty() || name.chars().count() > 64 {
            return Err(AppError::Validation(
                "company name must be 1-64 characters".to_string(),
            ));
        }

        let company = Company::new(name.to_string());
        self.store.create_company(&company)?;
        info!("Created company {} ({})", company.name, company.id);

        self.invalidate_rankings();
        Ok(company)
    }

    pub fn get_company(&self, company_id: &str) -> Result<Company> {
        self.store
            .get_company(company_id)?
            .ok_or_else(|| AppError::NotFound(format!("company {}", company_id)))
    }

    pub fn list_companies(&self) -> Result<Vec<Company>> {
        self.store.list_companies()
    }

    // ========== Stats & Leaderboard ==========

    /// Personal stats plus the rollup of the user's company.
    pub fn get_user_stats(&self, user_id: &str, range: DateRange) -> Result<UserStats> {
        let profile = self.get_profile(user_id)?;
        let now = chrono::Utc::now().timestamp_millis();

        let closed = self.store.closed_trades(range.cutoff(now))?;
        let personal_stats = stats::aggregate_in_range(
            closed.iter().filter(|t| t.user_id == profile.user_id),
            range,
            now,
        );

        let company_stats = match profile.company_id {
            Some(ref company_id) => {
                let profiles = self.store.list_profiles()?;
                let members = ranked_members(&profiles, company_id);
                Some(stats::aggregate_in_range(
                    company_trades(&closed, &members),
                    range,
                    now,
                ))
            }
            None => None,
        };

        Ok(UserStats {
            user_id: profile.user_id,
            personal_stats,
            company_stats,
        })
    }

    /// Ranked leaderboard page. Ranks are global; search and pagination only
    /// choose which ranked rows come back.
    pub fn get_leaderboard(&self, request: LeaderboardRequest) -> Result<LeaderboardPage> {
        let page_size = match request.page_size {
            0 => self.leaderboard.default_page_size,
            n => n.min(self.leaderboard.max_page_size),
        };

        let key = RankingKey {
            scope: request.scope,
            range: request.range,
            sort: request.sort,
        };

        let ranked = match self.rankings.get(&key) {
            Some(ranked) => {
                debug!("Leaderboard cache hit for {} {} {}", key.scope, key.range, key.sort);
                ranked
            }
            None => {
                let ranked = Arc::new(self.compute_ranking(key)?);
                self.rankings.set(key, ranked.clone());
                ranked
            }
        };

        Ok(leaderboard::paginate(
            &ranked,
            request.search.as_deref(),
            request.page,
            page_size,
        ))
    }

    fn compute_ranking(&self, key: RankingKey) -> Result<Vec<RankedEntry>> {
        let now = chrono::Utc::now().timestamp_millis();
        let profiles = self.store.list_profiles()?;
        let closed = self.store.closed_trades(key.range.cutoff(now))?;

        let scopes: Vec<ScopeStats> = match key.scope {
            ScopeKind::Users => profiles
                .iter()
                .filter(|p| p.show_on_leaderboard && p.role.is_ranked())
                .map(|p| {
                    let identity = ScopeIdentity {
                        scope_id: p.user_id.clone(),
                        kind: ScopeKind::Users,
                        display_name: p.display_name.clone(),
                        username: Some(p.username.clone()),
                        company_id: p.company_id.clone(),
                    };
                    stats::scope_stats(
                        identity,
                        closed.iter().filter(|t| t.user_id == p.user_id),
                        key.range,
                        now,
                    )
                })
                .collect(),
            ScopeKind::Companies => self
                .store
                .list_companies()?
                .into_iter()
                .filter_map(|c| {
                    let members = ranked_members(&profiles, &c.id);
                    if members.is_empty() {
                        return None;
                    }
                    let identity = ScopeIdentity {
                        scope_id: c.id.clone(),
                        kind: ScopeKind::Companies,
                        display_name: c.name.clone(),
                        username: None,
                        company_id: Some(c.id.clone()),
                    };
                    Some(stats::scope_stats(
                        identity,
                        company_trades(&closed, &members),
                        key.range,
                        now,
                    ))
                })
                .collect(),
        };

        debug!(
            "Ranked {} {} scopes for range {} by {}",
            scopes.len(),
            key.scope,
            key.range,
            key.sort
        );
        Ok(leaderboard::rank(scopes, key.sort))
    }
}

/// Ranked users whose profile places them in `company_id`.
fn ranked_members<'a>(profiles: &'a [Profile], company_id: &str) -> HashSet<&'a str> {
    profiles
        .iter()
        .filter(|p| p.role.is_ranked() && p.company_id.as_deref() == Some(company_id))
        .map(|p| p.user_id.as_str())
        .collect()
}

/// A company rollup is every trade of its ranked members, whatever company
/// header the trade was opened under.
fn company_trades<'a>(
    trades: &'a [Trade],
    members: &'a HashSet<&'a str>,
) -> impl Iterator<Item = &'a Trade> + 'a {
    trades
        .iter()
        .filter(move |t| members.contains(t.user_id.as_str()))
}

/// 3-32 characters of letters, digits, '_' or '-'.
fn validate_username(username: &str) -> Result<String> {
    let username = username.trim();
    let len = username.chars().count();
    if !(3..=32).contains(&len)
        || !username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(AppError::Validation(format!(
            "username '{}' must be 3-32 letters, digits, '_' or '-'",
            username
        )));
    }
    Ok(username.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FillPricingPolicy;
    use crate::services::notifier::BroadcastNotifier;
    use crate::services::pricing::StaticQuoteProvider;
    use crate::types::{FillPrice, OptionType, Role, TradeOutcome, TradeStatus};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    struct Harness {
        service: TradingService,
        quotes: Arc<StaticQuoteProvider>,
        events: Arc<BroadcastNotifier>,
    }

    fn create_test_service() -> Harness {
        let store = Arc::new(SqliteStore::new_in_memory().unwrap());
        let quotes = Arc::new(StaticQuoteProvider::new());
        let events = Arc::new(BroadcastNotifier::default());
        let pricer = FillPricer::new(FillPricingPolicy::default(), quotes.clone());
        let service = TradingService::new(store, pricer, events.clone(), &Config::default());
        Harness {
            service,
            quotes,
            events,
        }
    }

    fn expiry() -> NaiveDate {
        NaiveDate::from_ymd_opt(2099, 12, 18).unwrap()
    }

    fn contract() -> ContractKey {
        ContractKey::new("SPY", dec!(500), OptionType::Call, expiry())
    }

    fn order(contracts: u32, price: Decimal) -> CreateTradeRequest {
        CreateTradeRequest {
            ticker: "spy".to_string(),
            strike: dec!(500),
            option_type: OptionType::Call,
            expiry: expiry(),
            contracts,
            fill_price: FillPrice::Fixed(price),
        }
    }

    fn trader(user_id: &str) -> RequestContext {
        RequestContext::new(user_id, Some("co".to_string()), Role::Trader)
    }

    fn settle(contracts: u32, price: Decimal) -> SettleTradeRequest {
        SettleTradeRequest {
            contracts,
            fill_price: FillPrice::Fixed(price),
        }
    }

    fn profile(h: &Harness, user_id: &str, username: &str, role: Role, show: bool) {
        let own = RequestContext::new(user_id, None, Role::Owner);
        h.service
            .upsert_profile(
                &own,
                UpsertProfileRequest {
                    user_id: user_id.to_string(),
                    company_id: None,
                    username: username.to_string(),
                    display_name: None,
                    role,
                    show_on_leaderboard: show,
                },
            )
            .unwrap();
    }

    fn company(h: &Harness, name: &str) -> Company {
        let owner = RequestContext::new("founder", None, Role::Owner);
        h.service
            .create_company(
                &owner,
                CreateCompanyRequest {
                    name: name.to_string(),
                },
            )
            .unwrap()
    }

    fn member_of(user_id: &str, username: &str, company_id: &str, role: Role) -> UpsertProfileRequest {
        UpsertProfileRequest {
            user_id: user_id.to_string(),
            company_id: Some(company_id.to_string()),
            username: username.to_string(),
            display_name: None,
            role,
            show_on_leaderboard: true,
        }
    }

    /// Open at `buy`, settle fully at `sell`.
    async fn round_trip(h: &Harness, user_id: &str, buy: Decimal, sell: Decimal) -> Trade {
        let ctx = trader(user_id);
        h.quotes.set_quote(contract(), buy);
        let trade = h.service.create_trade(&ctx, order(1, buy)).await.unwrap();
        h.quotes.set_quote(contract(), sell);
        h.service
            .settle_trade(&ctx, &trade.id, settle(1, sell))
            .await
            .unwrap()
            .trade
    }

    // =========================================================================
    // Trade Tests
    // =========================================================================

    #[tokio::test]
    async fn test_create_verified_trade() {
        let h = create_test_service();
        h.quotes.set_quote(contract(), dec!(2.00));

        let trade = h.service.create_trade(&trader("u1"), order(3, dec!(2.05))).await.unwrap();

        assert_eq!(trade.status, TradeStatus::Open);
        assert_eq!(trade.ticker, "SPY");
        assert_eq!(trade.total_buy_notional, dec!(615));
        assert_eq!(trade.reference_price, Some(dec!(2.00)));
        assert_eq!(trade.company_id.as_deref(), Some("co"));
    }

    #[tokio::test]
    async fn test_create_without_quote_is_rejected_not_error() {
        let h = create_test_service();

        let trade = h.service.create_trade(&trader("u1"), order(1, dec!(2.00))).await.unwrap();

        assert_eq!(trade.status, TradeStatus::Rejected);
        assert!(!trade.price_verified);
        assert!(trade.fills.is_empty());
    }

    #[tokio::test]
    async fn test_create_validation_and_roles() {
        let h = create_test_service();
        h.quotes.set_quote(contract(), dec!(2.00));

        let result = h.service.create_trade(&trader("u1"), order(6, dec!(2.00))).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let member = RequestContext::new("m1", None, Role::Member);
        let result = h.service.create_trade(&member, order(1, dec!(2.00))).await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_settlement_scenario() {
        let h = create_test_service();
        let ctx = trader("u1");
        h.quotes.set_quote(contract(), dec!(2.00));
        let trade = h.service.create_trade(&ctx, order(3, dec!(2.00))).await.unwrap();
        assert_eq!(trade.total_buy_notional, dec!(600));

        h.quotes.set_quote(contract(), dec!(3.00));
        let first = h.service.settle_trade(&ctx, &trade.id, settle(2, dec!(3.00))).await.unwrap();
        assert_eq!(first.fill.notional, dec!(600));
        assert_eq!(first.trade.remaining_open_contracts, 1);
        assert_eq!(first.trade.status, TradeStatus::Open);

        h.quotes.set_quote(contract(), dec!(1.00));
        let last = h.service.settle_trade(&ctx, &trade.id, settle(1, dec!(1.00))).await.unwrap();
        assert_eq!(last.trade.total_sell_notional, dec!(700));
        assert_eq!(last.trade.net_pnl, Some(dec!(100)));
        assert_eq!(last.trade.status, TradeStatus::Closed);
        assert_eq!(last.trade.outcome, Some(TradeOutcome::Win));
    }

    #[tokio::test]
    async fn test_settlement_errors() {
        let h = create_test_service();
        let ctx = trader("u1");
        h.quotes.set_quote(contract(), dec!(2.00));
        let trade = h.service.create_trade(&ctx, order(2, dec!(2.00))).await.unwrap();

        let missing = h.service.settle_trade(&ctx, "missing", settle(1, dec!(2.00))).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));

        let oversell = h.service.settle_trade(&ctx, &trade.id, settle(3, dec!(2.00))).await;
        assert!(matches!(oversell, Err(AppError::Validation(msg)) if msg.contains("exceeds remaining")));

        let out_of_band = h.service.settle_trade(&ctx, &trade.id, settle(1, dec!(5.00))).await;
        assert!(matches!(out_of_band, Err(AppError::Validation(_))));

        h.quotes.remove_quote(&contract());
        let no_quote = h.service.settle_trade(&ctx, &trade.id, settle(1, dec!(2.00))).await;
        assert!(matches!(no_quote, Err(AppError::ExternalService(_))));

        let stranger = h.service.settle_trade(&trader("u2"), &trade.id, settle(1, dec!(2.00))).await;
        assert!(matches!(stranger, Err(AppError::Unauthorized(_))));

        let unchanged = h.service.get_trade(&ctx, &trade.id).unwrap();
        assert_eq!(unchanged.remaining_open_contracts, 2);
        assert_eq!(unchanged.fills.len(), 1);
    }

    #[tokio::test]
    async fn test_settling_closed_trade_is_state_error() {
        let h = create_test_service();
        let trade = round_trip(&h, "u1", dec!(1.00), dec!(1.00)).await;

        let result = h.service.settle_trade(&trader("u1"), &trade.id, settle(1, dec!(1.00))).await;
        assert!(matches!(result, Err(AppError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_delete_rules_and_events() {
        let h = create_test_service();
        let mut events = h.events.subscribe();
        let ctx = trader("u1");
        h.quotes.set_quote(contract(), dec!(2.00));

        let trade = h.service.create_trade(&ctx, order(2, dec!(2.00))).await.unwrap();
        h.service.settle_trade(&ctx, &trade.id, settle(1, dec!(2.00))).await.unwrap();
        h.service.delete_trade(&ctx, &trade.id).unwrap();

        assert!(matches!(h.service.get_trade(&ctx, &trade.id), Err(AppError::NotFound(_))));
        assert!(matches!(events.recv().await.unwrap(), TradeEvent::Created { .. }));
        assert!(matches!(events.recv().await.unwrap(), TradeEvent::Settled { .. }));
        assert!(matches!(events.recv().await.unwrap(), TradeEvent::Deleted { .. }));

        h.quotes.remove_quote(&contract());
        let rejected = h.service.create_trade(&ctx, order(1, dec!(2.00))).await.unwrap();
        assert!(matches!(
            h.service.delete_trade(&ctx, &rejected.id),
            Err(AppError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_list_trades_visibility() {
        let h = create_test_service();
        h.quotes.set_quote(contract(), dec!(2.00));
        h.service.create_trade(&trader("u1"), order(1, dec!(2.00))).await.unwrap();
        h.service.create_trade(&trader("u2"), order(1, dec!(2.00))).await.unwrap();

        let mine = h.service.list_trades(&trader("u1"), TradeFilter::default()).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].user_id, "u1");

        let admin = RequestContext::new("boss", Some("co".to_string()), Role::Admin);
        let company = h
            .service
            .list_trades(
                &admin,
                TradeFilter {
                    company_id: Some("co".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(company.len(), 2);

        let peek = h.service.list_trades(
            &trader("u1"),
            TradeFilter {
                company_id: Some("co".to_string()),
                ..Default::default()
            },
        );
        assert!(matches!(peek, Err(AppError::Unauthorized(_))));
    }

    // =========================================================================
    // Leaderboard Tests
    // =========================================================================

    #[tokio::test]
    async fn test_leaderboard_ranks_opted_in_traders() {
        let h = create_test_service();
        profile(&h, "u1", "alice", Role::Trader, true);
        profile(&h, "u2", "bob", Role::Trader, true);
        profile(&h, "u3", "carol", Role::Trader, false);

        round_trip(&h, "u1", dec!(1.00), dec!(1.50)).await; // +50%
        round_trip(&h, "u2", dec!(1.00), dec!(2.00)).await; // +100%
        round_trip(&h, "u3", dec!(1.00), dec!(3.00)).await; // hidden

        let page = h.service.get_leaderboard(LeaderboardRequest::default()).unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.entries[0].identity.scope_id, "u2");
        assert_eq!(page.entries[0].rank, 1);
        assert_eq!(page.entries[0].stats.roi, dec!(100));
        assert_eq!(page.entries[1].identity.scope_id, "u1");
        assert_eq!(page.page_size, 20);
    }

    #[tokio::test]
    async fn test_leaderboard_cache_invalidated_on_mutation() {
        let h = create_test_service();
        profile(&h, "u1", "alice", Role::Trader, true);

        let before = h.service.get_leaderboard(LeaderboardRequest::default()).unwrap();
        assert_eq!(before.entries[0].stats.total_trades, 0);

        round_trip(&h, "u1", dec!(1.00), dec!(1.50)).await;

        let after = h.service.get_leaderboard(LeaderboardRequest::default()).unwrap();
        assert_eq!(after.entries[0].stats.total_trades, 1);
    }

    #[tokio::test]
    async fn test_search_keeps_global_rank() {
        let h = create_test_service();
        profile(&h, "u1", "alice", Role::Trader, true);
        profile(&h, "u2", "bob", Role::Trader, true);
        round_trip(&h, "u1", dec!(1.00), dec!(2.00)).await;
        round_trip(&h, "u2", dec!(1.00), dec!(1.10)).await;

        let page = h
            .service
            .get_leaderboard(LeaderboardRequest {
                search: Some("BOB".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.entries[0].rank, 2);
    }

    #[tokio::test]
    async fn test_company_rollup_excludes_members() {
        let h = create_test_service();
        let owner = RequestContext::new("boss", Some("ignored".to_string()), Role::Owner);
        let company = h
            .service
            .create_company(
                &owner,
                CreateCompanyRequest {
                    name: "Gamma Squeeze LLC".to_string(),
                },
            )
            .unwrap();

        let manager = RequestContext::new("boss", Some(company.id.clone()), Role::Owner);
        for (user_id, username, role) in [("t1", "trader1", Role::Trader), ("m1", "member1", Role::Member)] {
            h.service
                .upsert_profile(
                    &manager,
                    UpsertProfileRequest {
                        user_id: user_id.to_string(),
                        company_id: Some(company.id.clone()),
                        username: username.to_string(),
                        display_name: None,
                        role,
                        show_on_leaderboard: false,
                    },
                )
                .unwrap();
        }

        // m1's stored role is Member, so its trade stays out of the rollup
        let t1 = RequestContext::new("t1", Some(company.id.clone()), Role::Trader);
        let m1 = RequestContext::new("m1", Some(company.id.clone()), Role::Trader);
        for (ctx, sell) in [(&t1, dec!(2.00)), (&m1, dec!(0.10))] {
            h.quotes.set_quote(contract(), dec!(1.00));
            let trade = h.service.create_trade(ctx, order(1, dec!(1.00))).await.unwrap();
            h.quotes.set_quote(contract(), sell);
            h.service.settle_trade(ctx, &trade.id, settle(1, sell)).await.unwrap();
        }

        let stats = h.service.get_user_stats("t1", DateRange::AllTime).unwrap();
        assert_eq!(stats.personal_stats.total_trades, 1);
        let company_stats = stats.company_stats.unwrap();
        assert_eq!(company_stats.total_trades, 1);
        assert_eq!(company_stats.roi, dec!(100));

        let board = h
            .service
            .get_leaderboard(LeaderboardRequest {
                scope: ScopeKind::Companies,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(board.total, 1);
        assert_eq!(board.entries[0].identity.display_name, "Gamma Squeeze LLC");
        assert_eq!(board.entries[0].stats.net_pnl, dec!(100));
    }

    #[tokio::test]
    async fn test_company_rollup_follows_member_profiles() {
        let h = create_test_service();
        let a = company(&h, "Alpha Desk");
        let b = company(&h, "Beta Desk");

        let ua = RequestContext::new("ua", Some(a.id.clone()), Role::Trader);
        let ub = RequestContext::new("ub", Some(b.id.clone()), Role::Trader);
        h.service.upsert_profile(&ua, member_of("ua", "alpha_one", &a.id, Role::Trader)).unwrap();
        h.service.upsert_profile(&ub, member_of("ub", "beta_one", &b.id, Role::Trader)).unwrap();

        // ua books a trade while presenting company B
        let misfiled = RequestContext::new("ua", Some(b.id.clone()), Role::Trader);
        h.quotes.set_quote(contract(), dec!(1.00));
        let trade = h.service.create_trade(&misfiled, order(1, dec!(1.00))).await.unwrap();
        h.quotes.set_quote(contract(), dec!(1.50));
        h.service.settle_trade(&misfiled, &trade.id, settle(1, dec!(1.50))).await.unwrap();

        let alpha = h.service.get_user_stats("ua", DateRange::AllTime).unwrap();
        assert_eq!(alpha.company_stats.unwrap().total_trades, 1);
        let beta = h.service.get_user_stats("ub", DateRange::AllTime).unwrap();
        assert_eq!(beta.company_stats.unwrap().total_trades, 0);

        let board = h
            .service
            .get_leaderboard(LeaderboardRequest {
                scope: ScopeKind::Companies,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(board.total, 2);
        assert_eq!(board.entries[0].identity.scope_id, a.id);
        assert_eq!(board.entries[0].stats.total_trades, 1);
        assert_eq!(board.entries[1].identity.scope_id, b.id);
        assert_eq!(board.entries[1].stats.total_trades, 0);
    }

    // =========================================================================
    // Profile Tests
    // =========================================================================

    #[test]
    fn test_username_validation() {
        assert_eq!(validate_username("  theta_gang ").unwrap(), "theta_gang");
        assert!(validate_username("ab").is_err());
        assert!(validate_username("has space").is_err());
    }

    #[test]
    fn test_trader_cannot_grant_admin() {
        let h = create_test_service();
        let result = h.service.upsert_profile(
            &trader("u1"),
            UpsertProfileRequest {
                user_id: "u1".to_string(),
                company_id: None,
                username: "alice".to_string(),
                display_name: None,
                role: Role::Admin,
                show_on_leaderboard: false,
            },
        );
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_admin_cannot_move_user_out_of_another_company() {
        let h = create_test_service();
        let a = company(&h, "Alpha Desk");
        let b = company(&h, "Beta Desk");

        let victim = RequestContext::new("victim", Some(b.id.clone()), Role::Trader);
        h.service
            .upsert_profile(&victim, member_of("victim", "quiet_trader", &b.id, Role::Trader))
            .unwrap();

        let admin_a = RequestContext::new("admin-a", Some(a.id.clone()), Role::Admin);
        let result = h
            .service
            .upsert_profile(&admin_a, member_of("victim", "renamed", &a.id, Role::Member));
        assert!(matches!(result, Err(AppError::Unauthorized(_))));

        let unchanged = h.service.get_profile("victim").unwrap();
        assert_eq!(unchanged.company_id.as_deref(), Some(b.id.as_str()));
        assert_eq!(unchanged.username, "quiet_trader");
        assert_eq!(unchanged.role, Role::Trader);

        let admin_b = RequestContext::new("admin-b", Some(b.id.clone()), Role::Admin);
        let demoted = h
            .service
            .upsert_profile(&admin_b, member_of("victim", "quiet_trader", &b.id, Role::Member))
            .unwrap();
        assert_eq!(demoted.role, Role::Member);
    }

    #[test]
    fn test_leaderboard_opt_in() {
        let h = create_test_service();
        profile(&h, "u1", "alice", Role::Trader, false);

        let updated = h
            .service
            .set_leaderboard_opt_in(&trader("u1"), "u1", true)
            .unwrap();
        assert!(updated.show_on_leaderboard);

        let missing = h.service.set_leaderboard_opt_in(&trader("u9"), "u9", true);
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }
}
