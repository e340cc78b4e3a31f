//! Trade lifecycle state machine.
//!
//! A trade's state is never stored. It is a pure fold over the trade's
//! terminal marker and its execution history:
//!
//! ```text
//! planned --entry--> open --partial_close--> partial --partial_close--> partial
//!    |                 |                        |
//!    |                 +--tp/sl/manual--> closed <--tp/sl/manual--+
//!    +--(marker, zero executions)--> cancelled | invalidated
//! ```
//!
//! Position bookkeeping (`compute_remaining_position`,
//! `validate_execution_size`) replays the same ordered history.

use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

use crate::domain::error::JournalError;
use crate::domain::execution::{sorted_by_time, Execution, ExecutionKind};
use crate::domain::trade::TerminalMarker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeState {
    Planned,
    Open,
    Partial,
    Closed,
    Cancelled,
    Invalidated,
}

impl TradeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeState::Planned => "planned",
            TradeState::Open => "open",
            TradeState::Partial => "partial",
            TradeState::Closed => "closed",
            TradeState::Cancelled => "cancelled",
            TradeState::Invalidated => "invalidated",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TradeState::Closed | TradeState::Cancelled | TradeState::Invalidated
        )
    }

    /// Event kinds legal from this state.
    pub fn allowed_events(&self) -> &'static [ExecutionKind] {
        const FROM_PLANNED: &[ExecutionKind] = &[ExecutionKind::Entry];
        const FROM_POSITION: &[ExecutionKind] = &[
            ExecutionKind::PartialClose,
            ExecutionKind::TpHit,
            ExecutionKind::SlHit,
            ExecutionKind::ManualClose,
        ];
        match self {
            TradeState::Planned => FROM_PLANNED,
            TradeState::Open | TradeState::Partial => FROM_POSITION,
            TradeState::Closed | TradeState::Cancelled | TradeState::Invalidated => &[],
        }
    }

    fn apply(self, event: ExecutionKind) -> TradeState {
        match event {
            ExecutionKind::Entry => TradeState::Open,
            ExecutionKind::PartialClose => TradeState::Partial,
            ExecutionKind::TpHit | ExecutionKind::SlHit | ExecutionKind::ManualClose => {
                TradeState::Closed
            }
        }
    }
}

impl fmt::Display for TradeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<TerminalMarker> for TradeState {
    fn from(marker: TerminalMarker) -> Self {
        match marker {
            TerminalMarker::Cancelled => TradeState::Cancelled,
            TerminalMarker::Invalidated => TradeState::Invalidated,
        }
    }
}

pub fn can_transition(state: TradeState, event: ExecutionKind) -> bool {
    state.allowed_events().contains(&event)
}

/// Rejects `event` from `state`, citing `index` as the offending position
/// in the ordered history.
pub fn ensure_transition(
    state: TradeState,
    event: ExecutionKind,
    index: usize,
) -> Result<(), JournalError> {
    if can_transition(state, event) {
        Ok(())
    } else {
        Err(JournalError::InvalidTransition {
            index,
            state,
            event,
        })
    }
}

/// Derives the current state from the terminal marker and execution history.
///
/// A terminal marker dominates. Otherwise executions are replayed in
/// timestamp order (stable for equal timestamps) starting from `planned`.
pub fn derive_state(
    marker: Option<TerminalMarker>,
    executions: &[Execution],
) -> Result<TradeState, JournalError> {
    if let Some(marker) = marker {
        return Ok(marker.into());
    }

    sorted_by_time(executions)
        .into_iter()
        .enumerate()
        .try_fold(
            TradeState::Planned,
            |state, (index, execution)| -> Result<TradeState, JournalError> {
                ensure_transition(state, execution.kind, index)?;
                Ok(state.apply(execution.kind))
            },
        )
}

/// Replays the history and returns the size still open.
///
/// Before `entry` the full planned size is reported as remaining.
pub fn compute_remaining_position(
    planned_size: Decimal,
    executions: &[Execution],
) -> Result<Decimal, JournalError> {
    if planned_size <= Decimal::ZERO {
        return Err(JournalError::invalid(
            "planned position size",
            "must be positive",
        ));
    }

    let mut remaining = planned_size;
    let mut entry_filled = false;

    for execution in sorted_by_time(executions) {
        if execution.kind == ExecutionKind::Entry {
            entry_filled = true;
            continue;
        }
        if !entry_filled {
            return Err(JournalError::PrematureExecution {
                event: execution.kind,
            });
        }
        remaining = apply_size(execution.kind, execution.position_size, remaining)?;
    }

    Ok(remaining)
}

/// Checks a candidate execution against the remaining position derived
/// from the existing history, before it is appended.
pub fn validate_execution_size(
    kind: ExecutionKind,
    size: Decimal,
    planned_size: Decimal,
    existing: &[Execution],
) -> Result<(), JournalError> {
    let remaining = compute_remaining_position(planned_size, existing)?;

    match kind {
        ExecutionKind::Entry => {
            if size != planned_size {
                return Err(JournalError::SizeMismatch {
                    reason: format!("entry size {size} must match planned {planned_size}"),
                });
            }
            Ok(())
        }
        _ => {
            if !existing.iter().any(|e| e.kind == ExecutionKind::Entry) {
                return Err(JournalError::PrematureExecution { event: kind });
            }
            apply_size(kind, size, remaining).map(|_| ())
        }
    }
}

fn apply_size(
    kind: ExecutionKind,
    size: Decimal,
    remaining: Decimal,
) -> Result<Decimal, JournalError> {
    match kind {
        ExecutionKind::PartialClose => {
            if size <= Decimal::ZERO {
                return Err(JournalError::SizeMismatch {
                    reason: "partial close size must be positive".into(),
                });
            }
            if size >= remaining {
                return Err(JournalError::SizeMismatch {
                    reason: format!(
                        "partial close {size} must be less than remaining {remaining}"
                    ),
                });
            }
            Ok(remaining - size)
        }
        ExecutionKind::TpHit | ExecutionKind::SlHit | ExecutionKind::ManualClose => {
            if size != remaining {
                return Err(JournalError::SizeMismatch {
                    reason: format!("close size {size} must match remaining {remaining}"),
                });
            }
            Ok(Decimal::ZERO)
        }
        ExecutionKind::Entry => Ok(remaining),
    }
}

/// Price actually filled by the `entry` execution.
pub fn actual_entry_price(executions: &[Execution]) -> Result<Decimal, JournalError> {
    let entry = sorted_by_time(executions)
        .into_iter()
        .find(|e| e.kind == ExecutionKind::Entry)
        .ok_or_else(|| JournalError::invalid("history", "no entry execution found"))?;

    if entry.price <= Decimal::ZERO {
        return Err(JournalError::invalid("entry price", "must be positive"));
    }
    Ok(entry.price)
}
