//! Market execution events recorded against a trade.
//!
//! Executions are append-only. State derivation orders them by
//! `executed_at`, never by insertion.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::error::JournalError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionKind {
    Entry,
    PartialClose,
    TpHit,
    SlHit,
    ManualClose,
}

impl ExecutionKind {
    pub const ALL: [ExecutionKind; 5] = [
        ExecutionKind::Entry,
        ExecutionKind::PartialClose,
        ExecutionKind::TpHit,
        ExecutionKind::SlHit,
        ExecutionKind::ManualClose,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionKind::Entry => "entry",
            ExecutionKind::PartialClose => "partial_close",
            ExecutionKind::TpHit => "tp_hit",
            ExecutionKind::SlHit => "sl_hit",
            ExecutionKind::ManualClose => "manual_close",
        }
    }

    /// `tp_hit`, `sl_hit` and `manual_close` flatten the remaining position.
    pub fn is_closing(&self) -> bool {
        matches!(
            self,
            ExecutionKind::TpHit | ExecutionKind::SlHit | ExecutionKind::ManualClose
        )
    }
}

impl fmt::Display for ExecutionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionKind {
    type Err = JournalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExecutionKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| {
                JournalError::invalid("execution kind", format!("unknown event type '{s}'"))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Execution {
    pub id: Uuid,
    pub trade_id: Uuid,
    pub kind: ExecutionKind,
    pub price: Decimal,
    pub position_size: Decimal,
    pub pnl: Option<Decimal>,
    pub pnl_pips: Option<Decimal>,
    pub executed_at: DateTime<Utc>,
    pub reason: Option<String>,
}

/// A caller's request to append one execution to a trade's history.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionRequest {
    pub trade_id: Uuid,
    pub kind: ExecutionKind,
    pub price: Decimal,
    pub position_size: Decimal,
    pub reason: Option<String>,
    pub executed_at: DateTime<Utc>,
}

/// Returns the history ordered by execution time. The sort is stable, so
/// events sharing a timestamp keep their input order.
pub fn sorted_by_time(executions: &[Execution]) -> Vec<&Execution> {
    let mut sorted: Vec<&Execution> = executions.iter().collect();
    sorted.sort_by_key(|e| e.executed_at);
    sorted
}
