//! Unit tests for types module

use rust_decimal_macros::dec;
use strikeboard::types::*;

#[test]
fn test_create_trade_request_from_json() {
    let request: CreateTradeRequest = serde_json::from_str(
        r#"{
            "ticker": "qqq",
            "strike": "410.5",
            "optionType": "put",
            "expiry": "2030-03-15",
            "contracts": 2,
            "fillPrice": { "type": "market" }
        }"#,
    )
    .unwrap();

    assert_eq!(request.ticker, "qqq");
    assert_eq!(request.strike, dec!(410.5));
    assert_eq!(request.option_type, OptionType::Put);
    assert_eq!(request.fill_price, FillPrice::Market);
}

#[test]
fn test_status_and_outcome_wire_names() {
    assert_eq!(serde_json::to_string(&TradeStatus::Rejected).unwrap(), "\"rejected\"");
    assert_eq!(serde_json::to_string(&TradeOutcome::Breakeven).unwrap(), "\"breakeven\"");
    assert_eq!(serde_json::to_string(&FillSide::Sell).unwrap(), "\"sell\"");
}

#[test]
fn test_leaderboard_sort_wire_names() {
    let sort: LeaderboardSort = serde_json::from_str("\"winRate\"").unwrap();
    assert_eq!(sort, LeaderboardSort::WinRate);
    assert_eq!(LeaderboardSort::TotalTrades.to_string(), "totalTrades");
}

#[test]
fn test_stats_entry_serializes_camel_case() {
    let json = serde_json::to_value(StatsEntry::default()).unwrap();
    for key in [
        "winRate",
        "roi",
        "netPnl",
        "totalTrades",
        "currentStreak",
        "longestStreak",
        "breakevenCount",
    ] {
        assert!(json.get(key).is_some(), "missing {}", key);
    }
}

#[test]
fn test_upsert_profile_defaults() {
    let request: UpsertProfileRequest =
        serde_json::from_str(r#"{"userId":"u1","username":"alice","role":"member"}"#).unwrap();
    assert!(request.company_id.is_none());
    assert!(!request.show_on_leaderboard);
    assert_eq!(request.role, Role::Member);
}
