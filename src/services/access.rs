//! Role capability checks.
//!
//! Visibility and modification rules for trades. The lifecycle and
//! aggregation code never consults roles directly.

use crate::error::{AppError, Result};
use crate::types::{RequestContext, Trade};

/// Members follow along but cannot open trades.
pub fn can_create_trade(ctx: &RequestContext) -> Result<()> {
    if !ctx.role.is_ranked() {
        return Err(AppError::Unauthorized(format!(
            "role {} cannot open trades",
            ctx.role
        )));
    }
    Ok(())
}

/// Whether the caller manages the company that owns `trade`.
fn manages_trade_company(ctx: &RequestContext, trade: &Trade) -> bool {
    ctx.role.is_company_manager()
        && ctx.company_id.is_some()
        && ctx.company_id == trade.company_id
}

/// Owners see their own trades; Owner/Admin see their company's trades.
pub fn can_view_trade(ctx: &RequestContext, trade: &Trade) -> Result<()> {
    if trade.user_id == ctx.user_id || manages_trade_company(ctx, trade) {
        return Ok(());
    }
    Err(AppError::Unauthorized(format!(
        "trade {} is not visible to {}",
        trade.id, ctx.user_id
    )))
}

/// Settling and deleting follow the same rule as viewing.
pub fn can_modify_trade(ctx: &RequestContext, trade: &Trade) -> Result<()> {
    if trade.user_id == ctx.user_id || manages_trade_company(ctx, trade) {
        return Ok(());
    }
    Err(AppError::Unauthorized(format!(
        "{} may not modify trade {}",
        ctx.user_id, trade.id
    )))
}

/// Listing another user's trades requires managing a shared company.
pub fn can_list_user_trades(
    ctx: &RequestContext,
    user_id: &str,
    user_company_id: Option<&str>,
) -> Result<()> {
    if ctx.user_id == user_id {
        return Ok(());
    }
    let same_company = ctx.company_id.is_some() && ctx.company_id.as_deref() == user_company_id;
    if ctx.role.is_company_manager() && same_company {
        return Ok(());
    }
    Err(AppError::Unauthorized(format!(
        "{} may not list trades of {}",
        ctx.user_id, user_id
    )))
}

/// Only Owner/Admin of a company may change other users' profiles there.
pub fn can_manage_profile(ctx: &RequestContext, user_id: &str, company_id: Option<&str>) -> Result<()> {
    if ctx.user_id == user_id {
        return Ok(());
    }
    let same_company = ctx.company_id.is_some() && ctx.company_id.as_deref() == company_id;
    if ctx.role.is_company_manager() && same_company {
        return Ok(());
    }
    Err(AppError::Unauthorized(format!(
        "{} may not manage profile {}",
        ctx.user_id, user_id
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::lifecycle::{open_trade, EntryPricing};
    use crate::types::{CreateTradeRequest, FillPrice, OptionType, Role};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn trade(user_id: &str, company_id: Option<&str>) -> Trade {
        let order = CreateTradeRequest {
            ticker: "TSLA".to_string(),
            strike: dec!(250),
            option_type: OptionType::Call,
            expiry: NaiveDate::from_ymd_opt(2030, 3, 15).unwrap(),
            contracts: 1,
            fill_price: FillPrice::Fixed(dec!(4.20)),
        };
        let entry = EntryPricing {
            fill_price: dec!(4.20),
            verified: true,
            reference_price: Some(dec!(4.20)),
            reference_timestamp: Some(0),
        };
        open_trade(user_id, company_id.map(String::from), &order, entry, 0)
    }

    fn ctx(user_id: &str, company_id: Option<&str>, role: Role) -> RequestContext {
        RequestContext::new(user_id, company_id.map(String::from), role)
    }

    #[test]
    fn test_member_cannot_trade() {
        assert!(can_create_trade(&ctx("u1", None, Role::Trader)).is_ok());
        assert!(matches!(
            can_create_trade(&ctx("u1", None, Role::Member)),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_owner_of_trade_can_view_and_modify() {
        let t = trade("u1", Some("co"));
        let caller = ctx("u1", Some("co"), Role::Trader);
        assert!(can_view_trade(&caller, &t).is_ok());
        assert!(can_modify_trade(&caller, &t).is_ok());
    }

    #[test]
    fn test_admin_sees_company_trades_only() {
        let t = trade("u1", Some("co"));
        assert!(can_view_trade(&ctx("admin", Some("co"), Role::Admin), &t).is_ok());
        assert!(can_view_trade(&ctx("admin", Some("other"), Role::Admin), &t).is_err());
        assert!(can_view_trade(&ctx("peer", Some("co"), Role::Trader), &t).is_err());
    }

    #[test]
    fn test_no_company_never_matches() {
        let t = trade("u1", None);
        assert!(can_modify_trade(&ctx("admin", None, Role::Owner), &t).is_err());
    }

    #[test]
    fn test_list_user_trades() {
        let manager = ctx("boss", Some("co"), Role::Owner);
        assert!(can_list_user_trades(&manager, "u1", Some("co")).is_ok());
        assert!(can_list_user_trades(&manager, "u1", Some("elsewhere")).is_err());
        assert!(can_list_user_trades(&ctx("u1", None, Role::Member), "u1", None).is_ok());
    }

    #[test]
    fn test_manage_profile() {
        let admin = ctx("admin", Some("co"), Role::Admin);
        assert!(can_manage_profile(&admin, "u2", Some("co")).is_ok());
        assert!(can_manage_profile(&ctx("u3", Some("co"), Role::Trader), "u2", Some("co")).is_err());
    }
}
