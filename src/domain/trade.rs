//! Accounts, planned trades and their immutable setup snapshots.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::error::JournalError;
use crate::domain::forex::{
    Timeframe, CONTRACT_SIZE_EURUSD, LOT_STEP, MAX_STOP_PIPS, MIN_RR, MIN_STOP_PIPS, MONEY_SCALE,
    PIP_SIZE_EURUSD, PIP_VALUE_PER_LOT_EURUSD, RR_SCALE, SYMBOL_EURUSD,
};
use crate::domain::risk;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Bias {
    Long,
    Short,
}

impl Bias {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bias::Long => "long",
            Bias::Short => "short",
        }
    }
}

impl fmt::Display for Bias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Bias {
    type Err = JournalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "long" => Ok(Bias::Long),
            "short" => Ok(Bias::Short),
            other => Err(JournalError::invalid(
                "bias",
                format!("must be 'long' or 'short', got '{other}'"),
            )),
        }
    }
}

/// User decision ending a trade before it was ever executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalMarker {
    Cancelled,
    Invalidated,
}

impl TerminalMarker {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalMarker::Cancelled => "cancelled",
            TerminalMarker::Invalidated => "invalidated",
        }
    }
}

impl fmt::Display for TerminalMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TerminalMarker {
    type Err = JournalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cancelled" => Ok(TerminalMarker::Cancelled),
            "invalidated" => Ok(TerminalMarker::Invalidated),
            other => Err(JournalError::invalid(
                "terminal marker",
                format!("must be 'cancelled' or 'invalidated', got '{other}'"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerminalRecord {
    pub marker: TerminalMarker,
    pub reason: String,
    pub marked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub balance: Decimal,
    pub leverage: u32,
    pub max_risk_pct: Decimal,
    pub timezone: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAccount {
    pub name: String,
    pub balance: Decimal,
    pub leverage: u32,
    pub max_risk_pct: Decimal,
    pub timezone: String,
}

impl NewAccount {
    pub fn into_account(self, now: DateTime<Utc>) -> Result<Account, JournalError> {
        if self.balance <= Decimal::ZERO {
            return Err(JournalError::invalid("balance", "must be positive"));
        }
        if self.leverage == 0 {
            return Err(JournalError::invalid("leverage", "must be positive"));
        }
        if self.max_risk_pct <= Decimal::ZERO || self.max_risk_pct > Decimal::ONE_HUNDRED {
            return Err(JournalError::invalid(
                "max risk percentage",
                "must be greater than 0 and at most 100",
            ));
        }
        Ok(Account {
            id: Uuid::new_v4(),
            name: self.name,
            balance: self.balance,
            leverage: self.leverage,
            max_risk_pct: self.max_risk_pct,
            timezone: self.timezone,
            created_at: now,
        })
    }
}

/// Account figures frozen into a trade at setup time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountSnapshot {
    pub balance: Decimal,
    pub leverage: u32,
    pub max_risk_pct: Decimal,
    pub timezone: String,
}

impl From<&Account> for AccountSnapshot {
    fn from(account: &Account) -> Self {
        AccountSnapshot {
            balance: account.balance,
            leverage: account.leverage,
            max_risk_pct: account.max_risk_pct,
            timezone: account.timezone.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub id: Uuid,
    pub account_id: Uuid,
    pub candle_id: Uuid,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub bias: Bias,
    pub setup: AccountSnapshot,
    pub planned_entry: Decimal,
    pub planned_sl: Decimal,
    pub planned_tp: Decimal,
    pub planned_rr: Decimal,
    pub planned_risk_pct: Decimal,
    pub planned_risk_amount: Decimal,
    pub planned_position_size: Decimal,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    pub terminal: Option<TerminalRecord>,
}

impl Trade {
    pub fn terminal_marker(&self) -> Option<TerminalMarker> {
        self.terminal.as_ref().map(|t| t.marker)
    }
}

/// A trader's planned setup, before any risk math has been applied.
#[derive(Debug, Clone, PartialEq)]
pub struct TradePlan {
    pub account_id: Uuid,
    pub candle_id: Uuid,
    pub bias: Bias,
    pub planned_entry: Decimal,
    pub planned_sl: Decimal,
    pub planned_tp: Decimal,
    pub planned_risk_pct: Decimal,
    pub reason: String,
}

/// Validates a plan against the account and derives the sized trade.
///
/// Steps:
/// 1. Geometry must be valid for the bias
/// 2. Planned risk % must be positive and within the account max
/// 3. Stop distance within [`MIN_STOP_PIPS`, `MAX_STOP_PIPS`]
/// 4. RR at least [`MIN_RR`]
/// 5. Risk amount and position size, truncated to the lot step; zero is rejected
/// 6. Position size must fit the account's leverage
/// 7. RR rounded for storage; account snapshot copied in
pub fn plan_trade(
    account: &Account,
    plan: TradePlan,
    now: DateTime<Utc>,
) -> Result<Trade, JournalError> {
    risk::validate_trade_geometry(
        plan.planned_entry,
        plan.planned_sl,
        plan.planned_tp,
        plan.bias,
    )?;

    if plan.planned_risk_pct <= Decimal::ZERO {
        return Err(JournalError::invalid("planned risk", "must be positive"));
    }
    if plan.planned_risk_pct > account.max_risk_pct {
        return Err(JournalError::RiskExceeded {
            reason: format!(
                "planned risk {}% exceeds account max {}%",
                plan.planned_risk_pct, account.max_risk_pct
            ),
        });
    }

    let stop_distance = risk::compute_stop_distance(plan.planned_entry, plan.planned_sl)?;
    let stop_pips = risk::compute_stop_distance_pips(stop_distance, PIP_SIZE_EURUSD)?;
    if stop_pips < MIN_STOP_PIPS || stop_pips > MAX_STOP_PIPS {
        return Err(JournalError::Geometry {
            reason: format!(
                "stop distance {stop_pips} pips outside {MIN_STOP_PIPS}..={MAX_STOP_PIPS} pips"
            ),
        });
    }

    let rr = risk::compute_rr(plan.planned_entry, plan.planned_sl, plan.planned_tp, plan.bias)?;
    if rr < MIN_RR {
        return Err(JournalError::RiskExceeded {
            reason: format!("RR {} is below the minimum of {MIN_RR}", rr.round_dp(RR_SCALE)),
        });
    }

    let risk_amount = risk::compute_risk_amount(account.balance, plan.planned_risk_pct)?;
    let raw_size =
        risk::compute_position_size(risk_amount, stop_pips, PIP_VALUE_PER_LOT_EURUSD)?;

    let position_size = round_down_to_step(raw_size, LOT_STEP);
    if position_size.is_zero() {
        return Err(JournalError::RiskExceeded {
            reason: format!(
                "position size {raw_size} lots is below the minimum of {LOT_STEP} lots"
            ),
        });
    }

    let max_size =
        risk::compute_max_position_size(account.balance, account.leverage, CONTRACT_SIZE_EURUSD)?;
    if position_size > max_size {
        return Err(JournalError::RiskExceeded {
            reason: format!(
                "position size {position_size} lots exceeds leverage limit {max_size} lots"
            ),
        });
    }

    Ok(Trade {
        id: Uuid::new_v4(),
        account_id: account.id,
        candle_id: plan.candle_id,
        symbol: SYMBOL_EURUSD.to_string(),
        timeframe: Timeframe::W1,
        bias: plan.bias,
        setup: AccountSnapshot::from(account),
        planned_entry: plan.planned_entry,
        planned_sl: plan.planned_sl,
        planned_tp: plan.planned_tp,
        planned_rr: rr.round_dp(RR_SCALE),
        planned_risk_pct: plan.planned_risk_pct,
        planned_risk_amount: risk_amount.round_dp(MONEY_SCALE),
        planned_position_size: position_size,
        reason: plan.reason,
        created_at: now,
        terminal: None,
    })
}

fn round_down_to_step(value: Decimal, step: Decimal) -> Decimal {
    let scale = step.scale();
    value.round_dp_with_strategy(scale, RoundingStrategy::ToZero)
}
