//! Journal write operations and trade status queries.
//!
//! Every operation runs in one serializable transaction through a
//! [`JournalPort`] and is retried under the configured [`RetryPolicy`] when
//! it loses a serialization race. A validation failure aborts the
//! transaction with nothing written.

use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::error::JournalError;
use crate::domain::execution::{Execution, ExecutionKind, ExecutionRequest};
use crate::domain::forex::{
    CONTRACT_SIZE_EURUSD, DEFAULT_MAX_ENTRY_SLIPPAGE_PIPS, PIP_SIZE_EURUSD,
};
use crate::domain::lifecycle::{self, TradeState};
use crate::domain::retry::{with_retry, RetryPolicy};
use crate::domain::risk;
use crate::domain::trade::{
    self, Account, NewAccount, TerminalMarker, TerminalRecord, Trade, TradePlan,
};
use crate::ports::journal_port::{JournalPort, JournalTx};

#[derive(Debug, Clone, PartialEq)]
pub struct JournalSettings {
    pub max_entry_slippage_pips: Decimal,
    pub transaction_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for JournalSettings {
    fn default() -> Self {
        Self {
            max_entry_slippage_pips: DEFAULT_MAX_ENTRY_SLIPPAGE_PIPS,
            transaction_timeout: Duration::from_millis(5000),
            retry: RetryPolicy::default(),
        }
    }
}

/// Instants are kept to the microsecond, the finest precision every backend stores.
pub fn stored_instant(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(6)
}

fn in_transaction<P, T, F>(
    port: &P,
    settings: &JournalSettings,
    work: F,
) -> Result<T, JournalError>
where
    P: JournalPort,
    F: Fn(&mut dyn JournalTx) -> Result<T, JournalError>,
{
    with_retry(&settings.retry, || {
        port.transaction(settings.transaction_timeout, |tx| work(tx))
    })
}

pub fn create_account<P: JournalPort>(
    port: &P,
    settings: &JournalSettings,
    new_account: NewAccount,
) -> Result<Account, JournalError> {
    let account = new_account.into_account(stored_instant(Utc::now()))?;
    in_transaction(port, settings, |tx| tx.insert_account(&account))?;
    info!(account = %account.id, name = %account.name, "account created");
    Ok(account)
}

/// Plans, sizes and stores a trade against the account's current figures.
///
/// An account holds at most one live trade per bias on a candle; trades
/// that were cancelled or invalidated do not count.
pub fn create_trade<P: JournalPort>(
    port: &P,
    settings: &JournalSettings,
    plan: TradePlan,
) -> Result<Trade, JournalError> {
    let now = stored_instant(Utc::now());
    let trade = in_transaction(port, settings, |tx| {
        let account = tx.load_account(plan.account_id)?;
        if !tx.candle_exists(plan.candle_id)? {
            return Err(JournalError::not_found("candle", plan.candle_id));
        }
        let existing = tx
            .trades_for_account_candle(plan.account_id, plan.candle_id)?
            .into_iter()
            .find(|t| t.bias == plan.bias && t.terminal.is_none());
        if let Some(existing) = existing {
            return Err(JournalError::DuplicateTrade {
                bias: plan.bias,
                existing: existing.id,
            });
        }
        let trade = trade::plan_trade(&account, plan.clone(), now)?;
        tx.insert_trade(&trade)?;
        Ok(trade)
    })?;
    info!(
        trade = %trade.id,
        bias = %trade.bias,
        size = %trade.planned_position_size,
        rr = %trade.planned_rr,
        "trade planned"
    );
    Ok(trade)
}

/// Validates `request` against the trade's history and appends it.
pub fn record_execution<P: JournalPort>(
    port: &P,
    settings: &JournalSettings,
    request: &ExecutionRequest,
) -> Result<Execution, JournalError> {
    let execution = in_transaction(port, settings, |tx| {
        append_execution(tx, settings.max_entry_slippage_pips, request)
    })?;
    info!(
        trade = %execution.trade_id,
        kind = %execution.kind,
        price = %execution.price,
        size = %execution.position_size,
        "execution recorded"
    );
    Ok(execution)
}

/// Body of [`record_execution`], run inside its transaction.
///
/// Steps:
/// 1. Load the trade and its ordered history
/// 2. Reject terminal trades (marker set, or closed)
/// 3. Check the transition, positive price/size and monotonic timestamp
/// 4. Check the size against the remaining position
/// 5. Guard entry slippage; compute PnL for closing kinds
/// 6. Insert
pub fn append_execution(
    tx: &mut dyn JournalTx,
    max_entry_slippage_pips: Decimal,
    request: &ExecutionRequest,
) -> Result<Execution, JournalError> {
    let trade = tx.load_trade(request.trade_id)?;
    let history = tx.load_executions(trade.id)?;
    let executed_at = stored_instant(request.executed_at);

    if let Some(marker) = trade.terminal_marker() {
        return Err(JournalError::TerminalTrade {
            state: marker.into(),
        });
    }

    let state = lifecycle::derive_state(None, &history)?;
    if state.is_terminal() {
        return Err(JournalError::TerminalTrade { state });
    }
    lifecycle::ensure_transition(state, request.kind, history.len())?;

    if request.price <= Decimal::ZERO {
        return Err(JournalError::invalid("price", "must be positive"));
    }
    if request.position_size <= Decimal::ZERO {
        return Err(JournalError::invalid("position size", "must be positive"));
    }
    if let Some(latest) = history.iter().map(|e| e.executed_at).max() {
        if executed_at < latest {
            return Err(JournalError::invalid(
                "executed_at",
                format!("{executed_at} precedes the latest execution at {latest}"),
            ));
        }
    }

    lifecycle::validate_execution_size(
        request.kind,
        request.position_size,
        trade.planned_position_size,
        &history,
    )?;

    if request.kind == ExecutionKind::Entry {
        risk::validate_entry_price(
            trade.planned_entry,
            request.price,
            PIP_SIZE_EURUSD,
            max_entry_slippage_pips,
        )?;
    }

    let pnl = if request.kind.is_closing() {
        Some(risk::compute_pnl(
            trade.bias,
            &history,
            request.price,
            request.position_size,
            PIP_SIZE_EURUSD,
            CONTRACT_SIZE_EURUSD,
        )?)
    } else {
        None
    };

    let execution = Execution {
        id: Uuid::new_v4(),
        trade_id: trade.id,
        kind: request.kind,
        price: request.price,
        position_size: request.position_size,
        pnl: pnl.map(|p| p.money),
        pnl_pips: pnl.map(|p| p.pips),
        executed_at,
        reason: request.reason.clone().filter(|r| !r.trim().is_empty()),
    };
    tx.insert_execution(&execution)?;
    Ok(execution)
}

/// Cancels or invalidates a trade that has never been executed.
pub fn set_terminal_marker<P: JournalPort>(
    port: &P,
    settings: &JournalSettings,
    trade_id: Uuid,
    marker: TerminalMarker,
    reason: &str,
) -> Result<Trade, JournalError> {
    if reason.trim().is_empty() {
        return Err(JournalError::invalid("reason", "must not be empty"));
    }
    let record = TerminalRecord {
        marker,
        reason: reason.trim().to_string(),
        marked_at: stored_instant(Utc::now()),
    };

    let trade = in_transaction(port, settings, |tx| {
        let mut trade = tx.load_trade(trade_id)?;
        if let Some(existing) = trade.terminal_marker() {
            return Err(JournalError::TerminalTrade {
                state: existing.into(),
            });
        }
        let history = tx.load_executions(trade_id)?;
        if !history.is_empty() {
            return Err(JournalError::HasExecutions {
                count: history.len(),
            });
        }
        tx.set_terminal_marker(trade_id, &record)?;
        trade.terminal = Some(record.clone());
        Ok(trade)
    })?;
    info!(trade = %trade_id, marker = %marker, "terminal marker set");
    Ok(trade)
}

pub fn trade_state<P: JournalPort>(
    port: &P,
    settings: &JournalSettings,
    trade_id: Uuid,
) -> Result<TradeState, JournalError> {
    let state = in_transaction(port, settings, |tx| {
        let trade = tx.load_trade(trade_id)?;
        let history = tx.load_executions(trade_id)?;
        lifecycle::derive_state(trade.terminal_marker(), &history)
    })?;
    debug!(trade = %trade_id, state = %state, "state derived");
    Ok(state)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeStatus {
    pub trade: Trade,
    pub state: TradeState,
    pub remaining_position: Decimal,
    pub realized_pnl: Decimal,
    pub realized_pnl_pips: Decimal,
    pub executions: Vec<Execution>,
    pub last_execution_at: Option<DateTime<Utc>>,
}

/// State, open size and realized PnL of one trade.
pub fn trade_status<P: JournalPort>(
    port: &P,
    settings: &JournalSettings,
    trade_id: Uuid,
) -> Result<TradeStatus, JournalError> {
    in_transaction(port, settings, |tx| {
        let trade = tx.load_trade(trade_id)?;
        let executions = tx.load_executions(trade_id)?;
        let state = lifecycle::derive_state(trade.terminal_marker(), &executions)?;
        let remaining_position = match state {
            TradeState::Cancelled | TradeState::Invalidated => Decimal::ZERO,
            _ => lifecycle::compute_remaining_position(trade.planned_position_size, &executions)?,
        };
        let realized_pnl =
            checked_total("realized pnl", executions.iter().filter_map(|e| e.pnl))?;
        let realized_pnl_pips =
            checked_total("realized pnl pips", executions.iter().filter_map(|e| e.pnl_pips))?;
        let last_execution_at = executions.iter().map(|e| e.executed_at).max();
        Ok(TradeStatus {
            trade,
            state,
            remaining_position,
            realized_pnl,
            realized_pnl_pips,
            executions,
            last_execution_at,
        })
    })
}

fn checked_total(
    field: &str,
    mut values: impl Iterator<Item = Decimal>,
) -> Result<Decimal, JournalError> {
    values.try_fold(Decimal::ZERO, |acc, v| risk::in_range(field, acc.checked_add(v)))
}
