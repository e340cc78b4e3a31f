//! SQLite journal and market data adapter.
//!
//! Decimals are stored as exact decimal text and timestamps as fixed-width
//! RFC 3339 UTC text, so text ordering is chronological ordering. Journal
//! transactions begin `IMMEDIATE`, taking the database write lock up front;
//! with a single writer every transaction is serializable.

use std::str::FromStr;
use std::time::{Duration, Instant};

use chrono::{DateTime, SecondsFormat, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::candle::Candle;
use crate::domain::error::JournalError;
use crate::domain::execution::Execution;
use crate::domain::forex::Timeframe;
use crate::domain::indicator::Indicators;
use crate::domain::rule::{ConditionCode, RuleResult};
use crate::domain::trade::{Account, AccountSnapshot, TerminalRecord, Trade};
use crate::ports::config_port::ConfigPort;
use crate::ports::journal_port::{JournalPort, JournalTx};
use crate::ports::market_data_port::MarketDataPort;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS accounts (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    balance TEXT NOT NULL,
    leverage INTEGER NOT NULL CHECK (leverage > 0),
    max_risk_pct TEXT NOT NULL,
    timezone TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS candles (
    id TEXT PRIMARY KEY,
    symbol TEXT NOT NULL,
    timeframe TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    open TEXT NOT NULL,
    high TEXT NOT NULL,
    low TEXT NOT NULL,
    close TEXT NOT NULL,
    volume INTEGER,
    UNIQUE (symbol, timeframe, timestamp)
);
CREATE TABLE IF NOT EXISTS indicators (
    candle_id TEXT PRIMARY KEY REFERENCES candles(id),
    ema20 TEXT,
    ema50 TEXT,
    ema200 TEXT,
    range_size TEXT NOT NULL,
    body_size TEXT NOT NULL,
    upper_wick TEXT NOT NULL,
    lower_wick TEXT NOT NULL,
    mid_price TEXT NOT NULL,
    last_swing_high TEXT,
    last_swing_low TEXT
);
CREATE TABLE IF NOT EXISTS trades (
    id TEXT PRIMARY KEY,
    account_id TEXT NOT NULL REFERENCES accounts(id),
    candle_id TEXT NOT NULL REFERENCES candles(id),
    symbol TEXT NOT NULL,
    timeframe TEXT NOT NULL,
    bias TEXT NOT NULL CHECK (bias IN ('long', 'short')),
    balance_at_setup TEXT NOT NULL,
    leverage_at_setup INTEGER NOT NULL,
    max_risk_pct_at_setup TEXT NOT NULL,
    timezone_at_setup TEXT NOT NULL,
    planned_entry TEXT NOT NULL,
    planned_sl TEXT NOT NULL,
    planned_tp TEXT NOT NULL,
    planned_rr TEXT NOT NULL,
    planned_risk_pct TEXT NOT NULL,
    planned_risk_amount TEXT NOT NULL,
    planned_position_size TEXT NOT NULL,
    reason TEXT NOT NULL,
    created_at TEXT NOT NULL,
    terminal_marker TEXT CHECK (terminal_marker IN ('cancelled', 'invalidated')),
    terminal_reason TEXT,
    terminal_at TEXT
);
CREATE TABLE IF NOT EXISTS executions (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    trade_id TEXT NOT NULL REFERENCES trades(id),
    kind TEXT NOT NULL
        CHECK (kind IN ('entry', 'partial_close', 'tp_hit', 'sl_hit', 'manual_close')),
    price TEXT NOT NULL,
    position_size TEXT NOT NULL,
    pnl TEXT,
    pnl_pips TEXT,
    executed_at TEXT NOT NULL,
    reason TEXT
);
CREATE INDEX IF NOT EXISTS idx_trades_account_candle ON trades(account_id, candle_id);
CREATE INDEX IF NOT EXISTS idx_executions_trade ON executions(trade_id, executed_at, seq);
CREATE TABLE IF NOT EXISTS rule_results (
    rule_code TEXT NOT NULL,
    rule_version INTEGER NOT NULL,
    candle_id TEXT NOT NULL REFERENCES candles(id),
    outcome TEXT NOT NULL CHECK (outcome IN ('PASS', 'FAIL')),
    confidence TEXT NOT NULL,
    conditions_met TEXT NOT NULL,
    conditions_failed TEXT NOT NULL,
    evaluated_at TEXT NOT NULL,
    PRIMARY KEY (rule_code, rule_version, candle_id)
);";

const TRADE_COLUMNS: &str = "id, account_id, candle_id, symbol, timeframe, bias,
    balance_at_setup, leverage_at_setup, max_risk_pct_at_setup, timezone_at_setup,
    planned_entry, planned_sl, planned_tp, planned_rr, planned_risk_pct,
    planned_risk_amount, planned_position_size, reason, created_at,
    terminal_marker, terminal_reason, terminal_at";

const EXECUTION_COLUMNS: &str =
    "id, trade_id, kind, price, position_size, pnl, pnl_pips, executed_at, reason";

const CANDLE_COLUMNS: &str = "id, symbol, timeframe, timestamp, open, high, low, close, volume";

const INDICATOR_COLUMNS: &str = "candle_id, ema20, ema50, ema200, range_size, body_size,
    upper_wick, lower_wick, mid_price, last_swing_high, last_swing_low";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, JournalError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| JournalError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;
        let manager = SqliteConnectionManager::file(&db_path).with_init(enable_foreign_keys);
        Self::build(manager, pool_size)
    }

    pub fn in_memory() -> Result<Self, JournalError> {
        Self::build(
            SqliteConnectionManager::memory().with_init(enable_foreign_keys),
            1,
        )
    }

    fn build(manager: SqliteConnectionManager, size: u32) -> Result<Self, JournalError> {
        let pool = Pool::builder()
            .max_size(size)
            .build(manager)
            .map_err(pool_err)?;
        Ok(Self { pool })
    }

    fn connection(&self) -> Result<PooledConnection<SqliteConnectionManager>, JournalError> {
        self.pool.get().map_err(pool_err)
    }

    pub fn initialize_schema(&self) -> Result<(), JournalError> {
        self.connection()?.execute_batch(SCHEMA).map_err(db_err)
    }
}

fn enable_foreign_keys(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")
}

fn pool_err(e: r2d2::Error) -> JournalError {
    JournalError::Database {
        reason: e.to_string(),
    }
}

/// Lock contention is a transient conflict; everything else is a query error.
fn db_err(e: rusqlite::Error) -> JournalError {
    match e.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => JournalError::Conflict {
            reason: e.to_string(),
        },
        _ => JournalError::DatabaseQuery {
            reason: e.to_string(),
        },
    }
}

fn ts_text(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn opt_text(value: Option<Decimal>) -> Option<String> {
    value.map(|v| v.to_string())
}

fn conversion_err<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn parse_text<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.get(idx)?;
    text.parse::<T>().map_err(|e| conversion_err(idx, e))
}

fn parse_opt_text<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: Option<String> = row.get(idx)?;
    text.map(|t| t.parse::<T>().map_err(|e| conversion_err(idx, e)))
        .transpose()
}

fn join_codes(codes: &[ConditionCode]) -> String {
    codes
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

fn parse_codes(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<ConditionCode>> {
    let text: String = row.get(idx)?;
    text.split(',')
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<ConditionCode>().map_err(|e| conversion_err(idx, e)))
        .collect()
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: parse_text(row, 0)?,
        name: row.get(1)?,
        balance: parse_text(row, 2)?,
        leverage: row.get(3)?,
        max_risk_pct: parse_text(row, 4)?,
        timezone: row.get(5)?,
        created_at: parse_text(row, 6)?,
    })
}

fn trade_from_row(row: &Row<'_>) -> rusqlite::Result<Trade> {
    let terminal = match parse_opt_text(row, 19)? {
        Some(marker) => Some(TerminalRecord {
            marker,
            reason: row.get::<_, Option<String>>(20)?.unwrap_or_default(),
            marked_at: parse_text(row, 21)?,
        }),
        None => None,
    };
    Ok(Trade {
        id: parse_text(row, 0)?,
        account_id: parse_text(row, 1)?,
        candle_id: parse_text(row, 2)?,
        symbol: row.get(3)?,
        timeframe: parse_text(row, 4)?,
        bias: parse_text(row, 5)?,
        setup: AccountSnapshot {
            balance: parse_text(row, 6)?,
            leverage: row.get(7)?,
            max_risk_pct: parse_text(row, 8)?,
            timezone: row.get(9)?,
        },
        planned_entry: parse_text(row, 10)?,
        planned_sl: parse_text(row, 11)?,
        planned_tp: parse_text(row, 12)?,
        planned_rr: parse_text(row, 13)?,
        planned_risk_pct: parse_text(row, 14)?,
        planned_risk_amount: parse_text(row, 15)?,
        planned_position_size: parse_text(row, 16)?,
        reason: row.get(17)?,
        created_at: parse_text(row, 18)?,
        terminal,
    })
}

fn execution_from_row(row: &Row<'_>) -> rusqlite::Result<Execution> {
    Ok(Execution {
        id: parse_text(row, 0)?,
        trade_id: parse_text(row, 1)?,
        kind: parse_text(row, 2)?,
        price: parse_text(row, 3)?,
        position_size: parse_text(row, 4)?,
        pnl: parse_opt_text(row, 5)?,
        pnl_pips: parse_opt_text(row, 6)?,
        executed_at: parse_text(row, 7)?,
        reason: row.get(8)?,
    })
}

fn candle_from_row(row: &Row<'_>) -> rusqlite::Result<Candle> {
    Ok(Candle {
        id: parse_text(row, 0)?,
        symbol: row.get(1)?,
        timeframe: parse_text(row, 2)?,
        timestamp: parse_text(row, 3)?,
        open: parse_text(row, 4)?,
        high: parse_text(row, 5)?,
        low: parse_text(row, 6)?,
        close: parse_text(row, 7)?,
        volume: row.get(8)?,
    })
}

fn indicators_from_row(row: &Row<'_>) -> rusqlite::Result<Indicators> {
    Ok(Indicators {
        candle_id: parse_text(row, 0)?,
        ema20: parse_opt_text(row, 1)?,
        ema50: parse_opt_text(row, 2)?,
        ema200: parse_opt_text(row, 3)?,
        range_size: parse_text(row, 4)?,
        body_size: parse_text(row, 5)?,
        upper_wick: parse_text(row, 6)?,
        lower_wick: parse_text(row, 7)?,
        mid_price: parse_text(row, 8)?,
        last_swing_high: parse_opt_text(row, 9)?,
        last_swing_low: parse_opt_text(row, 10)?,
    })
}

fn rule_result_from_row(row: &Row<'_>) -> rusqlite::Result<RuleResult> {
    Ok(RuleResult {
        rule_code: row.get(0)?,
        rule_version: row.get(1)?,
        outcome: parse_text(row, 2)?,
        confidence: parse_text(row, 3)?,
        conditions_met: parse_codes(row, 4)?,
        conditions_failed: parse_codes(row, 5)?,
    })
}

/// Journal operations bound to one open SQLite transaction.
struct SqliteJournalTx<'a> {
    conn: &'a Connection,
}

impl JournalTx for SqliteJournalTx<'_> {
    fn insert_account(&mut self, account: &Account) -> Result<(), JournalError> {
        self.conn
            .execute(
                "INSERT INTO accounts
                     (id, name, balance, leverage, max_risk_pct, timezone, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    account.id.to_string(),
                    account.name,
                    account.balance.to_string(),
                    account.leverage,
                    account.max_risk_pct.to_string(),
                    account.timezone,
                    ts_text(account.created_at),
                ],
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn load_account(&mut self, id: Uuid) -> Result<Account, JournalError> {
        self.conn
            .query_row(
                "SELECT id, name, balance, leverage, max_risk_pct, timezone, created_at
                 FROM accounts WHERE id = ?1",
                params![id.to_string()],
                account_from_row,
            )
            .optional()
            .map_err(db_err)?
            .ok_or_else(|| JournalError::not_found("account", id))
    }

    fn candle_exists(&mut self, id: Uuid) -> Result<bool, JournalError> {
        self.conn
            .query_row(
                "SELECT EXISTS (SELECT 1 FROM candles WHERE id = ?1)",
                params![id.to_string()],
                |row| row.get(0),
            )
            .map_err(db_err)
    }

    fn insert_trade(&mut self, trade: &Trade) -> Result<(), JournalError> {
        self.conn
            .execute(
                &format!(
                    "INSERT INTO trades ({TRADE_COLUMNS}) VALUES
                     (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                      ?16, ?17, ?18, ?19, ?20, ?21, ?22)"
                ),
                params![
                    trade.id.to_string(),
                    trade.account_id.to_string(),
                    trade.candle_id.to_string(),
                    trade.symbol,
                    trade.timeframe.as_str(),
                    trade.bias.as_str(),
                    trade.setup.balance.to_string(),
                    trade.setup.leverage,
                    trade.setup.max_risk_pct.to_string(),
                    trade.setup.timezone,
                    trade.planned_entry.to_string(),
                    trade.planned_sl.to_string(),
                    trade.planned_tp.to_string(),
                    trade.planned_rr.to_string(),
                    trade.planned_risk_pct.to_string(),
                    trade.planned_risk_amount.to_string(),
                    trade.planned_position_size.to_string(),
                    trade.reason,
                    ts_text(trade.created_at),
                    trade.terminal.as_ref().map(|t| t.marker.as_str()),
                    trade.terminal.as_ref().map(|t| t.reason.clone()),
                    trade.terminal.as_ref().map(|t| ts_text(t.marked_at)),
                ],
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn load_trade(&mut self, id: Uuid) -> Result<Trade, JournalError> {
        self.conn
            .query_row(
                &format!("SELECT {TRADE_COLUMNS} FROM trades WHERE id = ?1"),
                params![id.to_string()],
                trade_from_row,
            )
            .optional()
            .map_err(db_err)?
            .ok_or_else(|| JournalError::not_found("trade", id))
    }

    fn trades_for_account_candle(
        &mut self,
        account_id: Uuid,
        candle_id: Uuid,
    ) -> Result<Vec<Trade>, JournalError> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {TRADE_COLUMNS} FROM trades
                 WHERE account_id = ?1 AND candle_id = ?2 ORDER BY created_at ASC"
            ))
            .map_err(db_err)?;
        let rows = stmt
            .query_map(
                params![account_id.to_string(), candle_id.to_string()],
                trade_from_row,
            )
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    fn load_executions(&mut self, trade_id: Uuid) -> Result<Vec<Execution>, JournalError> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {EXECUTION_COLUMNS} FROM executions
                 WHERE trade_id = ?1 ORDER BY executed_at ASC, seq ASC"
            ))
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![trade_id.to_string()], execution_from_row)
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    fn set_terminal_marker(
        &mut self,
        trade_id: Uuid,
        record: &TerminalRecord,
    ) -> Result<(), JournalError> {
        let changed = self
            .conn
            .execute(
                "UPDATE trades SET terminal_marker = ?2, terminal_reason = ?3, terminal_at = ?4
                 WHERE id = ?1 AND terminal_marker IS NULL",
                params![
                    trade_id.to_string(),
                    record.marker.as_str(),
                    record.reason,
                    ts_text(record.marked_at),
                ],
            )
            .map_err(db_err)?;
        if changed == 0 {
            self.load_trade(trade_id)?;
            return Err(JournalError::Conflict {
                reason: format!("terminal marker already set on trade {trade_id}"),
            });
        }
        Ok(())
    }

    fn insert_execution(&mut self, execution: &Execution) -> Result<(), JournalError> {
        self.conn
            .execute(
                &format!(
                    "INSERT INTO executions ({EXECUTION_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
                ),
                params![
                    execution.id.to_string(),
                    execution.trade_id.to_string(),
                    execution.kind.as_str(),
                    execution.price.to_string(),
                    execution.position_size.to_string(),
                    opt_text(execution.pnl),
                    opt_text(execution.pnl_pips),
                    ts_text(execution.executed_at),
                    execution.reason,
                ],
            )
            .map_err(db_err)?;
        Ok(())
    }
}

impl JournalPort for SqliteAdapter {
    fn transaction<T, F>(&self, timeout: Duration, work: F) -> Result<T, JournalError>
    where
        F: FnOnce(&mut dyn JournalTx) -> Result<T, JournalError>,
    {
        let deadline = Instant::now() + timeout;
        let mut conn = self.connection()?;
        conn.busy_timeout(timeout).map_err(db_err)?;

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(db_err)?;
        let mut journal_tx = SqliteJournalTx { conn: &tx };
        // An early return drops `tx`, which rolls it back.
        let value = work(&mut journal_tx)?;

        if Instant::now() > deadline {
            return Err(JournalError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            });
        }
        tx.commit().map_err(db_err)?;
        Ok(value)
    }
}

impl MarketDataPort for SqliteAdapter {
    fn insert_candle(&self, candle: &Candle) -> Result<bool, JournalError> {
        let changed = self
            .connection()?
            .execute(
                &format!(
                    "INSERT OR IGNORE INTO candles ({CANDLE_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
                ),
                params![
                    candle.id.to_string(),
                    candle.symbol,
                    candle.timeframe.as_str(),
                    ts_text(candle.timestamp),
                    candle.open.to_string(),
                    candle.high.to_string(),
                    candle.low.to_string(),
                    candle.close.to_string(),
                    candle.volume,
                ],
            )
            .map_err(db_err)?;
        Ok(changed > 0)
    }

    fn list_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<Vec<Candle>, JournalError> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {CANDLE_COLUMNS} FROM candles
                 WHERE symbol = ?1 AND timeframe = ?2 ORDER BY timestamp ASC"
            ))
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![symbol, timeframe.as_str()], candle_from_row)
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    fn get_candle(&self, id: Uuid) -> Result<Candle, JournalError> {
        self.connection()?
            .query_row(
                &format!("SELECT {CANDLE_COLUMNS} FROM candles WHERE id = ?1"),
                params![id.to_string()],
                candle_from_row,
            )
            .optional()
            .map_err(db_err)?
            .ok_or_else(|| JournalError::not_found("candle", id))
    }

    fn save_indicators(&self, indicators: &Indicators) -> Result<(), JournalError> {
        self.connection()?
            .execute(
                &format!(
                    "INSERT OR REPLACE INTO indicators ({INDICATOR_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
                ),
                params![
                    indicators.candle_id.to_string(),
                    opt_text(indicators.ema20),
                    opt_text(indicators.ema50),
                    opt_text(indicators.ema200),
                    indicators.range_size.to_string(),
                    indicators.body_size.to_string(),
                    indicators.upper_wick.to_string(),
                    indicators.lower_wick.to_string(),
                    indicators.mid_price.to_string(),
                    opt_text(indicators.last_swing_high),
                    opt_text(indicators.last_swing_low),
                ],
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn get_indicators(&self, candle_id: Uuid) -> Result<Option<Indicators>, JournalError> {
        self.connection()?
            .query_row(
                &format!("SELECT {INDICATOR_COLUMNS} FROM indicators WHERE candle_id = ?1"),
                params![candle_id.to_string()],
                indicators_from_row,
            )
            .optional()
            .map_err(db_err)
    }

    fn get_previous_indicators(
        &self,
        candle: &Candle,
    ) -> Result<Option<Indicators>, JournalError> {
        self.connection()?
            .query_row(
                &format!(
                    "SELECT {INDICATOR_COLUMNS} FROM indicators WHERE candle_id = (
                         SELECT id FROM candles
                         WHERE symbol = ?1 AND timeframe = ?2 AND timestamp < ?3
                         ORDER BY timestamp DESC LIMIT 1
                     )"
                ),
                params![
                    candle.symbol,
                    candle.timeframe.as_str(),
                    ts_text(candle.timestamp)
                ],
                indicators_from_row,
            )
            .optional()
            .map_err(db_err)
    }

    fn insert_rule_result(
        &self,
        candle_id: Uuid,
        result: &RuleResult,
    ) -> Result<bool, JournalError> {
        let changed = self
            .connection()?
            .execute(
                "INSERT OR IGNORE INTO rule_results (rule_code, rule_version, candle_id, outcome,
                     confidence, conditions_met, conditions_failed, evaluated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    result.rule_code,
                    result.rule_version,
                    candle_id.to_string(),
                    result.outcome.as_str(),
                    result.confidence.to_string(),
                    join_codes(&result.conditions_met),
                    join_codes(&result.conditions_failed),
                    ts_text(Utc::now()),
                ],
            )
            .map_err(db_err)?;
        Ok(changed > 0)
    }

    fn rule_results(&self, candle_id: Uuid) -> Result<Vec<RuleResult>, JournalError> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(
                "SELECT rule_code, rule_version, outcome, confidence,
                        conditions_met, conditions_failed
                 FROM rule_results WHERE candle_id = ?1 ORDER BY rule_code, rule_version",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![candle_id.to_string()], rule_result_from_row)
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }
}
