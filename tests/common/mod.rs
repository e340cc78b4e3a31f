#![allow(dead_code)]

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use trendjournal::domain::candle::Candle;
use trendjournal::domain::error::JournalError;
use trendjournal::domain::execution::Execution;
use trendjournal::domain::forex::Timeframe;
use trendjournal::domain::indicator::Indicators;
use trendjournal::domain::journal::JournalSettings;
use trendjournal::domain::retry::RetryPolicy;
use trendjournal::domain::rule::RuleResult;
use trendjournal::domain::trade::{Account, Bias, NewAccount, TerminalRecord, Trade, TradePlan};
use trendjournal::ports::journal_port::{JournalPort, JournalTx};
use trendjournal::ports::market_data_port::MarketDataPort;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct JournalState {
    pub accounts: HashMap<Uuid, Account>,
    pub candles: HashSet<Uuid>,
    pub trades: HashMap<Uuid, Trade>,
    /// Insertion order.
    pub executions: Vec<Execution>,
}

impl JournalTx for JournalState {
    fn insert_account(&mut self, account: &Account) -> Result<(), JournalError> {
        self.accounts.insert(account.id, account.clone());
        Ok(())
    }

    fn load_account(&mut self, id: Uuid) -> Result<Account, JournalError> {
        self.accounts
            .get(&id)
            .cloned()
            .ok_or_else(|| JournalError::not_found("account", id))
    }

    fn candle_exists(&mut self, id: Uuid) -> Result<bool, JournalError> {
        Ok(self.candles.contains(&id))
    }

    fn insert_trade(&mut self, trade: &Trade) -> Result<(), JournalError> {
        self.trades.insert(trade.id, trade.clone());
        Ok(())
    }

    fn load_trade(&mut self, id: Uuid) -> Result<Trade, JournalError> {
        self.trades
            .get(&id)
            .cloned()
            .ok_or_else(|| JournalError::not_found("trade", id))
    }

    fn trades_for_account_candle(
        &mut self,
        account_id: Uuid,
        candle_id: Uuid,
    ) -> Result<Vec<Trade>, JournalError> {
        let mut trades: Vec<Trade> = self
            .trades
            .values()
            .filter(|t| t.account_id == account_id && t.candle_id == candle_id)
            .cloned()
            .collect();
        trades.sort_by_key(|t| t.created_at);
        Ok(trades)
    }

    fn load_executions(&mut self, trade_id: Uuid) -> Result<Vec<Execution>, JournalError> {
        let mut history: Vec<Execution> = self
            .executions
            .iter()
            .filter(|e| e.trade_id == trade_id)
            .cloned()
            .collect();
        history.sort_by_key(|e| e.executed_at);
        Ok(history)
    }

    fn set_terminal_marker(
        &mut self,
        trade_id: Uuid,
        record: &TerminalRecord,
    ) -> Result<(), JournalError> {
        let trade = self
            .trades
            .get_mut(&trade_id)
            .ok_or_else(|| JournalError::not_found("trade", trade_id))?;
        if trade.terminal.is_some() {
            return Err(JournalError::Conflict {
                reason: "marker already set".into(),
            });
        }
        trade.terminal = Some(record.clone());
        Ok(())
    }

    fn insert_execution(&mut self, execution: &Execution) -> Result<(), JournalError> {
        self.executions.push(execution.clone());
        Ok(())
    }
}

/// In-memory journal. Each transaction works on a copy of the state that
/// replaces the committed state only on success. Injected conflicts fail
/// the commit after `work` has run.
pub struct MockJournal {
    pub state: Mutex<JournalState>,
    pub pending_conflicts: Mutex<u32>,
    pub attempts: Mutex<u32>,
    pub fail_with_timeout: bool,
}

impl MockJournal {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(JournalState::default()),
            pending_conflicts: Mutex::new(0),
            attempts: Mutex::new(0),
            fail_with_timeout: false,
        }
    }

    pub fn with_candle(self, candle_id: Uuid) -> Self {
        self.state.lock().unwrap().candles.insert(candle_id);
        self
    }

    pub fn with_conflicts(self, count: u32) -> Self {
        *self.pending_conflicts.lock().unwrap() = count;
        self
    }

    pub fn with_timeout(mut self) -> Self {
        self.fail_with_timeout = true;
        self
    }

    pub fn attempts(&self) -> u32 {
        *self.attempts.lock().unwrap()
    }

    pub fn reset_attempts(&self) {
        *self.attempts.lock().unwrap() = 0;
    }

    pub fn execution_count(&self) -> usize {
        self.state.lock().unwrap().executions.len()
    }

    pub fn trade(&self, id: Uuid) -> Option<Trade> {
        self.state.lock().unwrap().trades.get(&id).cloned()
    }
}

impl JournalPort for MockJournal {
    fn transaction<T, F>(&self, timeout: Duration, work: F) -> Result<T, JournalError>
    where
        F: FnOnce(&mut dyn JournalTx) -> Result<T, JournalError>,
    {
        *self.attempts.lock().unwrap() += 1;
        let mut working = self.state.lock().unwrap().clone();
        let value = work(&mut working)?;

        if self.fail_with_timeout {
            return Err(JournalError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            });
        }
        let mut pending = self.pending_conflicts.lock().unwrap();
        if *pending > 0 {
            *pending -= 1;
            return Err(JournalError::Conflict {
                reason: "could not serialize access".into(),
            });
        }
        *self.state.lock().unwrap() = working;
        Ok(value)
    }
}

#[derive(Debug, Default)]
pub struct MarketState {
    pub candles: Vec<Candle>,
    pub indicators: HashMap<Uuid, Indicators>,
    pub rule_results: HashMap<(Uuid, String, u32), RuleResult>,
}

/// In-memory market data with injectable write failures.
pub struct MockMarketData {
    pub state: Mutex<MarketState>,
    pub fail_indicator_writes: HashSet<Uuid>,
    pub fail_rule_writes: HashSet<String>,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MarketState::default()),
            fail_indicator_writes: HashSet::new(),
            fail_rule_writes: HashSet::new(),
        }
    }

    pub fn failing_indicator_write(mut self, candle_id: Uuid) -> Self {
        self.fail_indicator_writes.insert(candle_id);
        self
    }

    pub fn failing_rule_write(mut self, rule_code: &str) -> Self {
        self.fail_rule_writes.insert(rule_code.to_string());
        self
    }

    pub fn stored_rule_results(&self) -> usize {
        self.state.lock().unwrap().rule_results.len()
    }
}

impl MarketDataPort for MockMarketData {
    fn insert_candle(&self, candle: &Candle) -> Result<bool, JournalError> {
        let mut state = self.state.lock().unwrap();
        let duplicate = state.candles.iter().any(|c| {
            c.symbol == candle.symbol
                && c.timeframe == candle.timeframe
                && c.timestamp == candle.timestamp
        });
        if duplicate {
            return Ok(false);
        }
        state.candles.push(candle.clone());
        Ok(true)
    }

    fn list_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<Vec<Candle>, JournalError> {
        let mut candles: Vec<Candle> = self
            .state
            .lock()
            .unwrap()
            .candles
            .iter()
            .filter(|c| c.symbol == symbol && c.timeframe == timeframe)
            .cloned()
            .collect();
        candles.sort_by_key(|c| c.timestamp);
        Ok(candles)
    }

    fn get_candle(&self, id: Uuid) -> Result<Candle, JournalError> {
        self.state
            .lock()
            .unwrap()
            .candles
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| JournalError::not_found("candle", id))
    }

    fn save_indicators(&self, indicators: &Indicators) -> Result<(), JournalError> {
        if self.fail_indicator_writes.contains(&indicators.candle_id) {
            return Err(JournalError::DatabaseQuery {
                reason: "disk I/O error".into(),
            });
        }
        self.state
            .lock()
            .unwrap()
            .indicators
            .insert(indicators.candle_id, indicators.clone());
        Ok(())
    }

    fn get_indicators(&self, candle_id: Uuid) -> Result<Option<Indicators>, JournalError> {
        Ok(self.state.lock().unwrap().indicators.get(&candle_id).cloned())
    }

    fn get_previous_indicators(&self, candle: &Candle) -> Result<Option<Indicators>, JournalError> {
        let state = self.state.lock().unwrap();
        let previous = state
            .candles
            .iter()
            .filter(|c| {
                c.symbol == candle.symbol
                    && c.timeframe == candle.timeframe
                    && c.timestamp < candle.timestamp
            })
            .max_by_key(|c| c.timestamp);
        Ok(previous.and_then(|c| state.indicators.get(&c.id).cloned()))
    }

    fn insert_rule_result(
        &self,
        candle_id: Uuid,
        result: &RuleResult,
    ) -> Result<bool, JournalError> {
        if self.fail_rule_writes.contains(&result.rule_code) {
            return Err(JournalError::DatabaseQuery {
                reason: "database is read-only".into(),
            });
        }
        let key = (candle_id, result.rule_code.clone(), result.rule_version);
        let mut state = self.state.lock().unwrap();
        if state.rule_results.contains_key(&key) {
            return Ok(false);
        }
        state.rule_results.insert(key, result.clone());
        Ok(true)
    }

    fn rule_results(&self, candle_id: Uuid) -> Result<Vec<RuleResult>, JournalError> {
        let mut results: Vec<RuleResult> = self
            .state
            .lock()
            .unwrap()
            .rule_results
            .iter()
            .filter(|((id, _, _), _)| *id == candle_id)
            .map(|(_, r)| r.clone())
            .collect();
        results.sort_by(|a, b| a.rule_code.cmp(&b.rule_code));
        Ok(results)
    }
}

pub fn fast_settings() -> JournalSettings {
    JournalSettings {
        retry: RetryPolicy {
            max_attempts: 3,
            base_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        },
        ..Default::default()
    }
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()
}

pub fn minutes(n: i64) -> DateTime<Utc> {
    t0() + ChronoDuration::minutes(n)
}

/// 10 000 balance, 2% max risk, 1:30 leverage.
pub fn new_account() -> NewAccount {
    NewAccount {
        name: "Main".into(),
        balance: dec!(10000),
        leverage: 30,
        max_risk_pct: dec!(2),
        timezone: "Europe/London".into(),
    }
}

/// Long 1.1000 / SL 1.0990 / TP 1.1030 at 1% risk: exactly 1.00 lot, RR 3.
pub fn long_plan(account_id: Uuid, candle_id: Uuid) -> TradePlan {
    TradePlan {
        account_id,
        candle_id,
        bias: Bias::Long,
        planned_entry: dec!(1.1000),
        planned_sl: dec!(1.0990),
        planned_tp: dec!(1.1030),
        planned_risk_pct: dec!(1),
        reason: "W1 trend bullish, pullback to EMA20".into(),
    }
}

/// Weekly candles starting 2020-01-06 with a steady drift per week.
pub fn weekly_series(count: usize, start: Decimal, drift: Decimal) -> Vec<Candle> {
    let first = Utc.with_ymd_and_hms(2020, 1, 6, 0, 0, 0).unwrap();
    (0..count)
        .map(|i| {
            let open = start + drift * Decimal::from(i as u64);
            let close = open + drift;
            let high = open.max(close) + dec!(0.0020);
            let low = open.min(close) - dec!(0.0020);
            Candle::new(
                "EURUSD",
                Timeframe::W1,
                first + ChronoDuration::weeks(i as i64),
                open,
                high,
                low,
                close,
                None,
            )
            .unwrap()
        })
        .collect()
}
