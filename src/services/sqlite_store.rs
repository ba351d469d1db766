//! SQLite persistence for trades, fills, profiles and companies.
//!
//! Money is stored as decimal TEXT so values round-trip exactly. Settlement
//! and deletion run inside transactions under the connection lock:
//! - Settlement re-reads the trade, applies the fill, then writes with an
//!   update conditioned on the remaining contracts it read
//! - Deletion removes the fills and the trade together, only while OPEN

use crate::error::{AppError, Result};
use crate::services::lifecycle;
use crate::types::{Company, Fill, Profile, Trade, TradeFilter, TradeStatus};
use rusqlite::types::{ToSql, Type};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

const TRADE_COLUMNS: &str = "id, user_id, company_id, ticker, strike, option_type, expiry,
    contracts, fill_price, price_verified, status, remaining_open_contracts,
    total_buy_notional, total_sell_notional, outcome, net_pnl,
    reference_price, reference_timestamp, created_at, updated_at, closed_at";

const FILL_COLUMNS: &str = "id, trade_id, side, contracts, fill_price, notional, filled_at,
    reference_price, reference_timestamp";

const PROFILE_COLUMNS: &str = "user_id, company_id, username, display_name, role,
    show_on_leaderboard, created_at, updated_at";

/// SQLite store for trade and profile data.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Create a new SQLite store at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        info!("SQLite store initialized");
        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        debug!("In-memory SQLite store initialized");
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Database("connection lock poisoned".to_string()))
    }

    /// Initialize database schema.
    fn init_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            "PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS companies (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS profiles (
                user_id TEXT PRIMARY KEY,
                company_id TEXT REFERENCES companies(id),
                username TEXT UNIQUE NOT NULL,
                display_name TEXT NOT NULL,
                role TEXT NOT NULL,
                show_on_leaderboard INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_profiles_company ON profiles(company_id);

            CREATE TABLE IF NOT EXISTS trades (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                company_id TEXT,
                ticker TEXT NOT NULL,
                strike TEXT NOT NULL,
                option_type TEXT NOT NULL,
                expiry TEXT NOT NULL,
                contracts INTEGER NOT NULL,
                fill_price TEXT NOT NULL,
                price_verified INTEGER NOT NULL,
                status TEXT NOT NULL,
                remaining_open_contracts INTEGER NOT NULL,
                total_buy_notional TEXT NOT NULL,
                total_sell_notional TEXT NOT NULL,
                outcome TEXT,
                net_pnl TEXT,
                reference_price TEXT,
                reference_timestamp INTEGER,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                closed_at INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_trades_user ON trades(user_id, created_at DESC);
            CREATE INDEX IF NOT EXISTS idx_trades_company ON trades(company_id);
            CREATE INDEX IF NOT EXISTS idx_trades_closed ON trades(status, closed_at);

            CREATE TABLE IF NOT EXISTS fills (
                id TEXT PRIMARY KEY,
                trade_id TEXT NOT NULL REFERENCES trades(id),
                side TEXT NOT NULL,
                contracts INTEGER NOT NULL,
                fill_price TEXT NOT NULL,
                notional TEXT NOT NULL,
                filled_at INTEGER NOT NULL,
                reference_price TEXT,
                reference_timestamp INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_fills_trade ON fills(trade_id);",
        )?;

        info!("SQLite schema initialized");
        Ok(())
    }

    // ========== Trade Methods ==========

    /// Insert a new trade together with its fills.
    pub fn insert_trade(&self, trade: &Trade) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute(
            &format!(
                "INSERT INTO trades ({}) VALUES
                 (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)",
                TRADE_COLUMNS
            ),
            params![
                trade.id,
                trade.user_id,
                trade.company_id,
                trade.ticker,
                trade.strike.to_string(),
                trade.option_type.to_string(),
                trade.expiry.to_string(),
                trade.contracts,
                trade.fill_price.to_string(),
                trade.price_verified,
                trade.status.to_string(),
                trade.remaining_open_contracts,
                trade.total_buy_notional.to_string(),
                trade.total_sell_notional.to_string(),
                trade.outcome.map(|o| o.to_string()),
                trade.net_pnl.map(|p| p.to_string()),
                trade.reference_price.map(|p| p.to_string()),
                trade.reference_timestamp,
                trade.created_at,
                trade.updated_at,
                trade.closed_at,
            ],
        )?;

        for fill in &trade.fills {
            insert_fill(&tx, fill)?;
        }

        tx.commit()?;
        debug!("Inserted trade {} ({})", trade.id, trade.status);
        Ok(())
    }

    /// Get a trade with its fill ledger.
    pub fn get_trade(&self, trade_id: &str) -> Result<Option<Trade>> {
        let conn = self.lock()?;
        load_trade(&conn, trade_id)
    }

    /// List trades, newest first, each with its fill ledger.
    pub fn list_trades(&self, filter: &TradeFilter) -> Result<Vec<Trade>> {
        let conn = self.lock()?;

        let mut clauses = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();
        if let Some(ref user_id) = filter.user_id {
            values.push(Box::new(user_id.clone()));
            clauses.push(format!("user_id = ?{}", values.len()));
        }
        if let Some(ref company_id) = filter.company_id {
            values.push(Box::new(company_id.clone()));
            clauses.push(format!("company_id = ?{}", values.len()));
        }
        if let Some(status) = filter.status {
            values.push(Box::new(status.to_string()));
            clauses.push(format!("status = ?{}", values.len()));
        }
        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let limit = filter.limit.map(|l| l as i64).unwrap_or(-1);

        let sql = format!(
            "SELECT {} FROM trades {} ORDER BY created_at DESC, id LIMIT {}",
            TRADE_COLUMNS, where_clause, limit
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut trades = stmt
            .query_map(params_from_iter(values.iter()), row_to_trade)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for trade in &mut trades {
            trade.fills = load_fills(&conn, &trade.id)?;
        }
        Ok(trades)
    }

    /// Closed, verified trades closed at or after `since`, without fill ledgers.
    pub fn closed_trades(&self, since: Option<i64>) -> Result<Vec<Trade>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM trades
             WHERE status = 'closed' AND price_verified = 1 AND closed_at >= ?1
             ORDER BY closed_at, id",
            TRADE_COLUMNS
        ))?;
        let trades = stmt
            .query_map(params![since.unwrap_or(i64::MIN)], row_to_trade)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(trades)
    }

    /// Settle part or all of a trade with a SELL fill.
    ///
    /// The write is conditioned on the trade still being open with the
    /// remaining contracts read in the same transaction, so two settlements
    /// can never both spend the same contracts.
    pub fn settle_trade(&self, trade_id: &str, fill: Fill) -> Result<Trade> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut trade = load_trade(&tx, trade_id)?
            .ok_or_else(|| AppError::NotFound(format!("trade {}", trade_id)))?;
        let expected_remaining = trade.remaining_open_contracts;

        lifecycle::apply_fill(&mut trade, fill.clone())?;

        let updated = tx.execute(
            "UPDATE trades SET
                status = ?1,
                remaining_open_contracts = ?2,
                total_sell_notional = ?3,
                outcome = ?4,
                net_pnl = ?5,
                updated_at = ?6,
                closed_at = ?7
             WHERE id = ?8 AND status = 'open' AND remaining_open_contracts = ?9",
            params![
                trade.status.to_string(),
                trade.remaining_open_contracts,
                trade.total_sell_notional.to_string(),
                trade.outcome.map(|o| o.to_string()),
                trade.net_pnl.map(|p| p.to_string()),
                trade.updated_at,
                trade.closed_at,
                trade.id,
                expected_remaining,
            ],
        )?;

        if updated == 0 {
            return Err(AppError::InvalidState(format!(
                "trade {} changed during settlement",
                trade_id
            )));
        }

        insert_fill(&tx, &fill)?;
        tx.commit()?;

        debug!(
            "Settled {} contracts on trade {}, {} remaining",
            fill.contracts, trade.id, trade.remaining_open_contracts
        );
        Ok(trade)
    }

    /// Delete an open trade and all of its fills. Returns the deleted trade.
    pub fn delete_trade(&self, trade_id: &str) -> Result<Trade> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let trade = load_trade(&tx, trade_id)?
            .ok_or_else(|| AppError::NotFound(format!("trade {}", trade_id)))?;
        lifecycle::ensure_deletable(&trade)?;

        let fills_removed = tx.execute("DELETE FROM fills WHERE trade_id = ?1", params![trade_id])?;
        let deleted = tx.execute(
            "DELETE FROM trades WHERE id = ?1 AND status = 'open'",
            params![trade_id],
        )?;
        if deleted == 0 {
            return Err(AppError::InvalidState(format!(
                "trade {} changed during deletion",
                trade_id
            )));
        }

        tx.commit()?;
        debug!("Deleted trade {} and {} fills", trade_id, fills_removed);
        Ok(trade)
    }

    /// Number of fills recorded against a trade.
    pub fn fill_count(&self, trade_id: &str) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM fills WHERE trade_id = ?1",
            params![trade_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    // ========== Profile Methods ==========

    /// Create or update a profile. Usernames are unique.
    pub fn upsert_profile(&self, profile: &Profile) -> Result<()> {
        let conn = self.lock()?;

        let result = conn.execute(
            &format!(
                "INSERT INTO profiles ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(user_id) DO UPDATE SET
                    company_id = excluded.company_id,
                    username = excluded.username,
                    display_name = excluded.display_name,
                    role = excluded.role,
                    show_on_leaderboard = excluded.show_on_leaderboard,
                    updated_at = excluded.updated_at",
                PROFILE_COLUMNS
            ),
            params![
                profile.user_id,
                profile.company_id,
                profile.username,
                profile.display_name,
                profile.role.to_string(),
                profile.show_on_leaderboard,
                profile.created_at,
                profile.updated_at,
            ],
        );

        match result {
            Ok(_) => {
                debug!("Saved profile for {}", profile.user_id);
                Ok(())
            }
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(AppError::Validation(format!(
                    "username '{}' is taken or company does not exist",
                    profile.username
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        let conn = self.lock()?;
        let profile = conn
            .query_row(
                &format!("SELECT {} FROM profiles WHERE user_id = ?1", PROFILE_COLUMNS),
                params![user_id],
                row_to_profile,
            )
            .optional()?;
        Ok(profile)
    }

    /// Set the leaderboard opt-in flag. Returns false if no such profile.
    pub fn set_leaderboard_opt_in(&self, user_id: &str, show: bool) -> Result<bool> {
        let conn = self.lock()?;
        let now = chrono::Utc::now().timestamp_millis();
        let updated = conn.execute(
            "UPDATE profiles SET show_on_leaderboard = ?1, updated_at = ?2 WHERE user_id = ?3",
            params![show, now, user_id],
        )?;
        Ok(updated > 0)
    }

    /// Every profile, ordered by user ID.
    pub fn list_profiles(&self) -> Result<Vec<Profile>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM profiles ORDER BY user_id",
            PROFILE_COLUMNS
        ))?;
        let profiles = stmt
            .query_map([], row_to_profile)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(profiles)
    }

    // ========== Company Methods ==========

    pub fn create_company(&self, company: &Company) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO companies (id, name, created_at) VALUES (?1, ?2, ?3)",
            params![company.id, company.name, company.created_at],
        )?;
        debug!("Created company {}", company.id);
        Ok(())
    }

    pub fn get_company(&self, company_id: &str) -> Result<Option<Company>> {
        let conn = self.lock()?;
        let company = conn
            .query_row(
                "SELECT id, name, created_at FROM companies WHERE id = ?1",
                params![company_id],
                row_to_company,
            )
            .optional()?;
        Ok(company)
    }

    pub fn list_companies(&self) -> Result<Vec<Company>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id, name, created_at FROM companies ORDER BY id")?;
        let companies = stmt
            .query_map([], row_to_company)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(companies)
    }
}

// ========== Row Helpers ==========

fn insert_fill(conn: &Connection, fill: &Fill) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO fills ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            FILL_COLUMNS
        ),
        params![
            fill.id,
            fill.trade_id,
            fill.side.to_string(),
            fill.contracts,
            fill.fill_price.to_string(),
            fill.notional.to_string(),
            fill.filled_at,
            fill.reference_price.map(|p| p.to_string()),
            fill.reference_timestamp,
        ],
    )?;
    Ok(())
}

fn load_trade(conn: &Connection, trade_id: &str) -> Result<Option<Trade>> {
    let trade = conn
        .query_row(
            &format!("SELECT {} FROM trades WHERE id = ?1", TRADE_COLUMNS),
            params![trade_id],
            row_to_trade,
        )
        .optional()?;

    match trade {
        Some(mut trade) => {
            trade.fills = load_fills(conn, trade_id)?;
            Ok(Some(trade))
        }
        None => Ok(None),
    }
}

fn load_fills(conn: &Connection, trade_id: &str) -> Result<Vec<Fill>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM fills WHERE trade_id = ?1 ORDER BY filled_at, rowid",
        FILL_COLUMNS
    ))?;
    let fills = stmt
        .query_map(params![trade_id], row_to_fill)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(fills)
}

/// Parse a TEXT column.
fn parse_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

/// Parse a nullable TEXT column.
fn parse_opt_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| s.parse::<T>())
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

fn row_to_trade(row: &Row<'_>) -> rusqlite::Result<Trade> {
    Ok(Trade {
        id: row.get(0)?,
        user_id: row.get(1)?,
        company_id: row.get(2)?,
        ticker: row.get(3)?,
        strike: parse_col(row, 4)?,
        option_type: parse_col(row, 5)?,
        expiry: parse_col(row, 6)?,
        contracts: row.get(7)?,
        fill_price: parse_col(row, 8)?,
        price_verified: row.get(9)?,
        status: parse_col::<TradeStatus>(row, 10)?,
        remaining_open_contracts: row.get(11)?,
        total_buy_notional: parse_col(row, 12)?,
        total_sell_notional: parse_col(row, 13)?,
        outcome: parse_opt_col(row, 14)?,
        net_pnl: parse_opt_col(row, 15)?,
        reference_price: parse_opt_col(row, 16)?,
        reference_timestamp: row.get(17)?,
        fills: Vec::new(),
        created_at: row.get(18)?,
        updated_at: row.get(19)?,
        closed_at: row.get(20)?,
    })
}

fn row_to_fill(row: &Row<'_>) -> rusqlite::Result<Fill> {
    Ok(Fill {
        id: row.get(0)?,
        trade_id: row.get(1)?,
        side: parse_col(row, 2)?,
        contracts: row.get(3)?,
        fill_price: parse_col(row, 4)?,
        notional: parse_col(row, 5)?,
        filled_at: row.get(6)?,
        reference_price: parse_opt_col(row, 7)?,
        reference_timestamp: row.get(8)?,
    })
}

fn row_to_profile(row: &Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        user_id: row.get(0)?,
        company_id: row.get(1)?,
        username: row.get(2)?,
        display_name: row.get(3)?,
        role: parse_col(row, 4)?,
        show_on_leaderboard: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn row_to_company(row: &Row<'_>) -> rusqlite::Result<Company> {
    Ok(Company {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: row.get(2)?,
    })
}
