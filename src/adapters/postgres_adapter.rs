//! PostgreSQL journal and market data adapter.
//!
//! Journal transactions run at `SERIALIZABLE` isolation with a
//! transaction-local `statement_timeout`. Serialization failures and
//! deadlocks surface as `Conflict`, cancelled statements as `Timeout`.

use std::str::FromStr;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use postgres::error::SqlState;
use postgres::types::ToSql;
use postgres::{IsolationLevel, NoTls, Row, Transaction};
use r2d2::{Pool, PooledConnection};
use r2d2_postgres::PostgresConnectionManager;
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
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    balance NUMERIC NOT NULL,
    leverage BIGINT NOT NULL CHECK (leverage > 0),
    max_risk_pct NUMERIC NOT NULL,
    timezone TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL
);
CREATE TABLE IF NOT EXISTS candles (
    id UUID PRIMARY KEY,
    symbol TEXT NOT NULL,
    timeframe TEXT NOT NULL,
    timestamp TIMESTAMPTZ NOT NULL,
    open NUMERIC NOT NULL,
    high NUMERIC NOT NULL,
    low NUMERIC NOT NULL,
    close NUMERIC NOT NULL,
    volume BIGINT,
    UNIQUE (symbol, timeframe, timestamp)
);
CREATE TABLE IF NOT EXISTS indicators (
    candle_id UUID PRIMARY KEY REFERENCES candles(id),
    ema20 NUMERIC,
    ema50 NUMERIC,
    ema200 NUMERIC,
    range_size NUMERIC NOT NULL,
    body_size NUMERIC NOT NULL,
    upper_wick NUMERIC NOT NULL,
    lower_wick NUMERIC NOT NULL,
    mid_price NUMERIC NOT NULL,
    last_swing_high NUMERIC,
    last_swing_low NUMERIC
);
CREATE TABLE IF NOT EXISTS trades (
    id UUID PRIMARY KEY,
    account_id UUID NOT NULL REFERENCES accounts(id),
    candle_id UUID NOT NULL REFERENCES candles(id),
    symbol TEXT NOT NULL,
    timeframe TEXT NOT NULL,
    bias TEXT NOT NULL CHECK (bias IN ('long', 'short')),
    balance_at_setup NUMERIC NOT NULL,
    leverage_at_setup BIGINT NOT NULL,
    max_risk_pct_at_setup NUMERIC NOT NULL,
    timezone_at_setup TEXT NOT NULL,
    planned_entry NUMERIC NOT NULL,
    planned_sl NUMERIC NOT NULL,
    planned_tp NUMERIC NOT NULL,
    planned_rr NUMERIC NOT NULL,
    planned_risk_pct NUMERIC NOT NULL,
    planned_risk_amount NUMERIC NOT NULL,
    planned_position_size NUMERIC NOT NULL,
    reason TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    terminal_marker TEXT CHECK (terminal_marker IN ('cancelled', 'invalidated')),
    terminal_reason TEXT,
    terminal_at TIMESTAMPTZ
);
CREATE TABLE IF NOT EXISTS executions (
    seq BIGSERIAL PRIMARY KEY,
    id UUID NOT NULL UNIQUE,
    trade_id UUID NOT NULL REFERENCES trades(id),
    kind TEXT NOT NULL
        CHECK (kind IN ('entry', 'partial_close', 'tp_hit', 'sl_hit', 'manual_close')),
    price NUMERIC NOT NULL,
    position_size NUMERIC NOT NULL,
    pnl NUMERIC,
    pnl_pips NUMERIC,
    executed_at TIMESTAMPTZ NOT NULL,
    reason TEXT
);
CREATE INDEX IF NOT EXISTS idx_trades_account_candle ON trades(account_id, candle_id);
CREATE INDEX IF NOT EXISTS idx_executions_trade ON executions(trade_id, executed_at, seq);
CREATE TABLE IF NOT EXISTS rule_results (
    rule_code TEXT NOT NULL,
    rule_version BIGINT NOT NULL,
    candle_id UUID NOT NULL REFERENCES candles(id),
    outcome TEXT NOT NULL CHECK (outcome IN ('PASS', 'FAIL')),
    confidence NUMERIC NOT NULL,
    conditions_met TEXT[] NOT NULL,
    conditions_failed TEXT[] NOT NULL,
    evaluated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
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

type PgPool = Pool<PostgresConnectionManager<NoTls>>;

pub struct PostgresAdapter {
    pool: PgPool,
}

impl PostgresAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, JournalError> {
        // [postgres] connection_string first, then [database] conninfo
        let connection_string = config
            .get_string("postgres", "connection_string")
            .or_else(|| config.get_string("database", "conninfo"))
            .ok_or_else(|| JournalError::ConfigMissing {
                section: "database".into(),
                key: "conninfo".into(),
            })?;

        let pg_config = postgres::Config::from_str(&connection_string).map_err(|e| {
            JournalError::ConfigInvalid {
                section: "postgres".into(),
                key: "connection_string".into(),
                reason: e.to_string(),
            }
        })?;
        let pool_size = config.get_int("postgres", "pool_size", 4).max(1) as u32;

        let manager = PostgresConnectionManager::new(pg_config, NoTls);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e: r2d2::Error| JournalError::Database {
                reason: e.to_string(),
            })?;
        Ok(Self { pool })
    }

    fn connection(
        &self,
    ) -> Result<PooledConnection<PostgresConnectionManager<NoTls>>, JournalError> {
        self.pool.get().map_err(|e: r2d2::Error| JournalError::Database {
            reason: e.to_string(),
        })
    }

    pub fn initialize_schema(&self) -> Result<(), JournalError> {
        self.connection()?
            .batch_execute(SCHEMA)
            .map_err(|e| pg_err(e, 0))
    }
}

fn pg_err(e: postgres::Error, timeout_ms: u64) -> JournalError {
    match e.code() {
        Some(code)
            if *code == SqlState::T_R_SERIALIZATION_FAILURE
                || *code == SqlState::T_R_DEADLOCK_DETECTED =>
        {
            JournalError::Conflict {
                reason: e.to_string(),
            }
        }
        Some(code) if *code == SqlState::QUERY_CANCELED => JournalError::Timeout { timeout_ms },
        _ => JournalError::DatabaseQuery {
            reason: e.to_string(),
        },
    }
}

fn column<'a, T>(row: &'a Row, name: &str) -> Result<T, JournalError>
where
    T: postgres::types::FromSql<'a>,
{
    row.try_get(name).map_err(|e| pg_err(e, 0))
}

fn parsed<T>(row: &Row, name: &str) -> Result<T, JournalError>
where
    T: FromStr<Err = JournalError>,
{
    column::<String>(row, name)?.parse()
}

fn count_u32(value: i64, field: &str) -> Result<u32, JournalError> {
    u32::try_from(value).map_err(|_| JournalError::DatabaseQuery {
        reason: format!("{field} out of range: {value}"),
    })
}

fn code_strings(codes: &[ConditionCode]) -> Vec<String> {
    codes.iter().map(|c| c.as_str().to_string()).collect()
}

fn parse_codes(row: &Row, name: &str) -> Result<Vec<ConditionCode>, JournalError> {
    column::<Vec<String>>(row, name)?
        .iter()
        .map(|s| s.parse())
        .collect()
}

fn account_from_row(row: &Row) -> Result<Account, JournalError> {
    Ok(Account {
        id: column(row, "id")?,
        name: column(row, "name")?,
        balance: column(row, "balance")?,
        leverage: count_u32(column(row, "leverage")?, "leverage")?,
        max_risk_pct: column(row, "max_risk_pct")?,
        timezone: column(row, "timezone")?,
        created_at: column(row, "created_at")?,
    })
}

fn trade_from_row(row: &Row) -> Result<Trade, JournalError> {
    let marker: Option<String> = column(row, "terminal_marker")?;
    let terminal = match marker {
        Some(marker) => Some(TerminalRecord {
            marker: marker.parse()?,
            reason: column::<Option<String>>(row, "terminal_reason")?.unwrap_or_default(),
            marked_at: column(row, "terminal_at")?,
        }),
        None => None,
    };
    Ok(Trade {
        id: column(row, "id")?,
        account_id: column(row, "account_id")?,
        candle_id: column(row, "candle_id")?,
        symbol: column(row, "symbol")?,
        timeframe: parsed(row, "timeframe")?,
        bias: parsed(row, "bias")?,
        setup: AccountSnapshot {
            balance: column(row, "balance_at_setup")?,
            leverage: count_u32(column(row, "leverage_at_setup")?, "leverage_at_setup")?,
            max_risk_pct: column(row, "max_risk_pct_at_setup")?,
            timezone: column(row, "timezone_at_setup")?,
        },
        planned_entry: column(row, "planned_entry")?,
        planned_sl: column(row, "planned_sl")?,
        planned_tp: column(row, "planned_tp")?,
        planned_rr: column(row, "planned_rr")?,
        planned_risk_pct: column(row, "planned_risk_pct")?,
        planned_risk_amount: column(row, "planned_risk_amount")?,
        planned_position_size: column(row, "planned_position_size")?,
        reason: column(row, "reason")?,
        created_at: column(row, "created_at")?,
        terminal,
    })
}

fn execution_from_row(row: &Row) -> Result<Execution, JournalError> {
    Ok(Execution {
        id: column(row, "id")?,
        trade_id: column(row, "trade_id")?,
        kind: parsed(row, "kind")?,
        price: column(row, "price")?,
        position_size: column(row, "position_size")?,
        pnl: column(row, "pnl")?,
        pnl_pips: column(row, "pnl_pips")?,
        executed_at: column(row, "executed_at")?,
        reason: column(row, "reason")?,
    })
}

fn candle_from_row(row: &Row) -> Result<Candle, JournalError> {
    Ok(Candle {
        id: column(row, "id")?,
        symbol: column(row, "symbol")?,
        timeframe: parsed(row, "timeframe")?,
        timestamp: column(row, "timestamp")?,
        open: column(row, "open")?,
        high: column(row, "high")?,
        low: column(row, "low")?,
        close: column(row, "close")?,
        volume: column(row, "volume")?,
    })
}

fn indicators_from_row(row: &Row) -> Result<Indicators, JournalError> {
    Ok(Indicators {
        candle_id: column(row, "candle_id")?,
        ema20: column(row, "ema20")?,
        ema50: column(row, "ema50")?,
        ema200: column(row, "ema200")?,
        range_size: column(row, "range_size")?,
        body_size: column(row, "body_size")?,
        upper_wick: column(row, "upper_wick")?,
        lower_wick: column(row, "lower_wick")?,
        mid_price: column(row, "mid_price")?,
        last_swing_high: column(row, "last_swing_high")?,
        last_swing_low: column(row, "last_swing_low")?,
    })
}

fn rule_result_from_row(row: &Row) -> Result<RuleResult, JournalError> {
    Ok(RuleResult {
        rule_code: column(row, "rule_code")?,
        rule_version: count_u32(column(row, "rule_version")?, "rule_version")?,
        outcome: parsed(row, "outcome")?,
        confidence: column(row, "confidence")?,
        conditions_met: parse_codes(row, "conditions_met")?,
        conditions_failed: parse_codes(row, "conditions_failed")?,
    })
}

struct PostgresJournalTx<'a, 'b> {
    tx: &'a mut Transaction<'b>,
    timeout_ms: u64,
}

impl PostgresJournalTx<'_, '_> {
    fn execute(&mut self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<u64, JournalError> {
        let timeout_ms = self.timeout_ms;
        self.tx.execute(sql, params).map_err(|e| pg_err(e, timeout_ms))
    }

    fn query(
        &mut self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, JournalError> {
        let timeout_ms = self.timeout_ms;
        self.tx.query(sql, params).map_err(|e| pg_err(e, timeout_ms))
    }

    fn query_opt(
        &mut self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Option<Row>, JournalError> {
        let timeout_ms = self.timeout_ms;
        self.tx.query_opt(sql, params).map_err(|e| pg_err(e, timeout_ms))
    }
}

impl JournalTx for PostgresJournalTx<'_, '_> {
    fn insert_account(&mut self, account: &Account) -> Result<(), JournalError> {
        self.execute(
            "INSERT INTO accounts (id, name, balance, leverage, max_risk_pct, timezone, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
            &[
                &account.id,
                &account.name,
                &account.balance,
                &i64::from(account.leverage),
                &account.max_risk_pct,
                &account.timezone,
                &account.created_at,
            ],
        )?;
        Ok(())
    }

    fn load_account(&mut self, id: Uuid) -> Result<Account, JournalError> {
        let row = self
            .query_opt(
                "SELECT id, name, balance, leverage, max_risk_pct, timezone, created_at
                 FROM accounts WHERE id = $1",
                &[&id],
            )?
            .ok_or_else(|| JournalError::not_found("account", id))?;
        account_from_row(&row)
    }

    fn candle_exists(&mut self, id: Uuid) -> Result<bool, JournalError> {
        let rows = self.query("SELECT 1 FROM candles WHERE id = $1", &[&id])?;
        Ok(!rows.is_empty())
    }

    fn insert_trade(&mut self, trade: &Trade) -> Result<(), JournalError> {
        let marker = trade.terminal.as_ref().map(|t| t.marker.as_str());
        let terminal_reason = trade.terminal.as_ref().map(|t| t.reason.as_str());
        let terminal_at: Option<DateTime<Utc>> = trade.terminal.as_ref().map(|t| t.marked_at);
        self.execute(
            &format!(
                "INSERT INTO trades ({TRADE_COLUMNS}) VALUES
                 ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                  $16, $17, $18, $19, $20, $21, $22)"
            ),
            &[
                &trade.id,
                &trade.account_id,
                &trade.candle_id,
                &trade.symbol,
                &trade.timeframe.as_str(),
                &trade.bias.as_str(),
                &trade.setup.balance,
                &i64::from(trade.setup.leverage),
                &trade.setup.max_risk_pct,
                &trade.setup.timezone,
                &trade.planned_entry,
                &trade.planned_sl,
                &trade.planned_tp,
                &trade.planned_rr,
                &trade.planned_risk_pct,
                &trade.planned_risk_amount,
                &trade.planned_position_size,
                &trade.reason,
                &trade.created_at,
                &marker,
                &terminal_reason,
                &terminal_at,
            ],
        )?;
        Ok(())
    }

    fn load_trade(&mut self, id: Uuid) -> Result<Trade, JournalError> {
        let row = self
            .query_opt(
                &format!("SELECT {TRADE_COLUMNS} FROM trades WHERE id = $1"),
                &[&id],
            )?
            .ok_or_else(|| JournalError::not_found("trade", id))?;
        trade_from_row(&row)
    }

    fn trades_for_account_candle(
        &mut self,
        account_id: Uuid,
        candle_id: Uuid,
    ) -> Result<Vec<Trade>, JournalError> {
        self.query(
            &format!(
                "SELECT {TRADE_COLUMNS} FROM trades
                 WHERE account_id = $1 AND candle_id = $2 ORDER BY created_at ASC"
            ),
            &[&account_id, &candle_id],
        )?
        .iter()
        .map(trade_from_row)
        .collect()
    }

    fn load_executions(&mut self, trade_id: Uuid) -> Result<Vec<Execution>, JournalError> {
        self.query(
            &format!(
                "SELECT {EXECUTION_COLUMNS} FROM executions
                 WHERE trade_id = $1 ORDER BY executed_at ASC, seq ASC"
            ),
            &[&trade_id],
        )?
        .iter()
        .map(execution_from_row)
        .collect()
    }

    fn set_terminal_marker(
        &mut self,
        trade_id: Uuid,
        record: &TerminalRecord,
    ) -> Result<(), JournalError> {
        let changed = self.execute(
            "UPDATE trades SET terminal_marker = $2, terminal_reason = $3, terminal_at = $4
             WHERE id = $1 AND terminal_marker IS NULL",
            &[
                &trade_id,
                &record.marker.as_str(),
                &record.reason,
                &record.marked_at,
            ],
        )?;
        if changed == 0 {
            self.load_trade(trade_id)?;
            return Err(JournalError::Conflict {
                reason: format!("terminal marker already set on trade {trade_id}"),
            });
        }
        Ok(())
    }

    fn insert_execution(&mut self, execution: &Execution) -> Result<(), JournalError> {
        self.execute(
            &format!(
                "INSERT INTO executions ({EXECUTION_COLUMNS})
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
            ),
            &[
                &execution.id,
                &execution.trade_id,
                &execution.kind.as_str(),
                &execution.price,
                &execution.position_size,
                &execution.pnl,
                &execution.pnl_pips,
                &execution.executed_at,
                &execution.reason,
            ],
        )?;
        Ok(())
    }
}

impl JournalPort for PostgresAdapter {
    fn transaction<T, F>(&self, timeout: Duration, work: F) -> Result<T, JournalError>
    where
        F: FnOnce(&mut dyn JournalTx) -> Result<T, JournalError>,
    {
        let deadline = Instant::now() + timeout;
        let timeout_ms = timeout.as_millis() as u64;
        let mut client = self.connection()?;

        let mut tx = client
            .build_transaction()
            .isolation_level(IsolationLevel::Serializable)
            .start()
            .map_err(|e| pg_err(e, timeout_ms))?;
        tx.batch_execute(&format!("SET LOCAL statement_timeout = {timeout_ms}"))
            .map_err(|e| pg_err(e, timeout_ms))?;

        let value = {
            let mut journal_tx = PostgresJournalTx {
                tx: &mut tx,
                timeout_ms,
            };
            // An early return drops `tx`, which rolls it back.
            work(&mut journal_tx)?
        };

        if Instant::now() > deadline {
            return Err(JournalError::Timeout { timeout_ms });
        }
        tx.commit().map_err(|e| pg_err(e, timeout_ms))?;
        Ok(value)
    }
}

impl MarketDataPort for PostgresAdapter {
    fn insert_candle(&self, candle: &Candle) -> Result<bool, JournalError> {
        let changed = self
            .connection()?
            .execute(
                &format!(
                    "INSERT INTO candles ({CANDLE_COLUMNS})
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                     ON CONFLICT (symbol, timeframe, timestamp) DO NOTHING"
                ),
                &[
                    &candle.id,
                    &candle.symbol,
                    &candle.timeframe.as_str(),
                    &candle.timestamp,
                    &candle.open,
                    &candle.high,
                    &candle.low,
                    &candle.close,
                    &candle.volume,
                ],
            )
            .map_err(|e| pg_err(e, 0))?;
        Ok(changed > 0)
    }

    fn list_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<Vec<Candle>, JournalError> {
        self.connection()?
            .query(
                &format!(
                    "SELECT {CANDLE_COLUMNS} FROM candles
                     WHERE symbol = $1 AND timeframe = $2 ORDER BY timestamp ASC"
                ),
                &[&symbol, &timeframe.as_str()],
            )
            .map_err(|e| pg_err(e, 0))?
            .iter()
            .map(candle_from_row)
            .collect()
    }

    fn get_candle(&self, id: Uuid) -> Result<Candle, JournalError> {
        let row = self
            .connection()?
            .query_opt(
                &format!("SELECT {CANDLE_COLUMNS} FROM candles WHERE id = $1"),
                &[&id],
            )
            .map_err(|e| pg_err(e, 0))?
            .ok_or_else(|| JournalError::not_found("candle", id))?;
        candle_from_row(&row)
    }

    fn save_indicators(&self, indicators: &Indicators) -> Result<(), JournalError> {
        self.connection()?
            .execute(
                &format!(
                    "INSERT INTO indicators ({INDICATOR_COLUMNS})
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                     ON CONFLICT (candle_id) DO UPDATE SET
                         ema20 = EXCLUDED.ema20, ema50 = EXCLUDED.ema50,
                         ema200 = EXCLUDED.ema200, range_size = EXCLUDED.range_size,
                         body_size = EXCLUDED.body_size, upper_wick = EXCLUDED.upper_wick,
                         lower_wick = EXCLUDED.lower_wick, mid_price = EXCLUDED.mid_price,
                         last_swing_high = EXCLUDED.last_swing_high,
                         last_swing_low = EXCLUDED.last_swing_low"
                ),
                &[
                    &indicators.candle_id,
                    &indicators.ema20,
                    &indicators.ema50,
                    &indicators.ema200,
                    &indicators.range_size,
                    &indicators.body_size,
                    &indicators.upper_wick,
                    &indicators.lower_wick,
                    &indicators.mid_price,
                    &indicators.last_swing_high,
                    &indicators.last_swing_low,
                ],
            )
            .map_err(|e| pg_err(e, 0))?;
        Ok(())
    }

    fn get_indicators(&self, candle_id: Uuid) -> Result<Option<Indicators>, JournalError> {
        self.connection()?
            .query_opt(
                &format!("SELECT {INDICATOR_COLUMNS} FROM indicators WHERE candle_id = $1"),
                &[&candle_id],
            )
            .map_err(|e| pg_err(e, 0))?
            .map(|row| indicators_from_row(&row))
            .transpose()
    }

    fn get_previous_indicators(
        &self,
        candle: &Candle,
    ) -> Result<Option<Indicators>, JournalError> {
        self.connection()?
            .query_opt(
                &format!(
                    "SELECT {INDICATOR_COLUMNS} FROM indicators WHERE candle_id = (
                         SELECT id FROM candles
                         WHERE symbol = $1 AND timeframe = $2 AND timestamp < $3
                         ORDER BY timestamp DESC LIMIT 1
                     )"
                ),
                &[&candle.symbol, &candle.timeframe.as_str(), &candle.timestamp],
            )
            .map_err(|e| pg_err(e, 0))?
            .map(|row| indicators_from_row(&row))
            .transpose()
    }

    fn insert_rule_result(
        &self,
        candle_id: Uuid,
        result: &RuleResult,
    ) -> Result<bool, JournalError> {
        let changed = self
            .connection()?
            .execute(
                "INSERT INTO rule_results (rule_code, rule_version, candle_id, outcome,
                     confidence, conditions_met, conditions_failed)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                 ON CONFLICT (rule_code, rule_version, candle_id) DO NOTHING",
                &[
                    &result.rule_code,
                    &i64::from(result.rule_version),
                    &candle_id,
                    &result.outcome.as_str(),
                    &result.confidence,
                    &code_strings(&result.conditions_met),
                    &code_strings(&result.conditions_failed),
                ],
            )
            .map_err(|e| pg_err(e, 0))?;
        Ok(changed > 0)
    }

    fn rule_results(&self, candle_id: Uuid) -> Result<Vec<RuleResult>, JournalError> {
        self.connection()?
            .query(
                "SELECT rule_code, rule_version, outcome, confidence,
                        conditions_met, conditions_failed
                 FROM rule_results WHERE candle_id = $1 ORDER BY rule_code, rule_version",
                &[&candle_id],
            )
            .map_err(|e| pg_err(e, 0))?
            .iter()
            .map(rule_result_from_row)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MapConfig(Vec<(&'static str, &'static str, &'static str)>);

    impl ConfigPort for MapConfig {
        fn get_string(&self, section: &str, key: &str) -> Option<String> {
            self.0
                .iter()
                .find(|(s, k, _)| *s == section && *k == key)
                .map(|(_, _, v)| v.to_string())
        }
        fn get_int(&self, _section: &str, _key: &str, default: i64) -> i64 {
            default
        }
    }

    #[test]
    fn from_config_missing_connection_string() {
        let result = PostgresAdapter::from_config(&MapConfig(vec![]));
        match result {
            Err(JournalError::ConfigMissing { section, key }) => {
                assert_eq!(section, "database");
                assert_eq!(key, "conninfo");
            }
            Err(other) => panic!("expected ConfigMissing, got: {other}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }

    #[test]
    fn from_config_rejects_malformed_connection_string() {
        let config = MapConfig(vec![("postgres", "connection_string", "host='unterminated")]);
        assert!(matches!(
            PostgresAdapter::from_config(&config),
            Err(JournalError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn condition_codes_round_trip_through_text_arrays() {
        let codes = vec![ConditionCode::CloseGtEma50, ConditionCode::Ema50SlopeNegative];
        let parsed: Vec<ConditionCode> = code_strings(&codes)
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        assert_eq!(parsed, codes);
    }

    #[test]
    fn out_of_range_counts_are_rejected() {
        assert_eq!(count_u32(30, "leverage").unwrap(), 30);
        assert!(count_u32(-1, "leverage").is_err());
    }
}
