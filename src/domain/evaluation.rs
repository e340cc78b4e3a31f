//! Candle import, indicator back-fill and rule evaluation over stored candles.
//!
//! These are batch operations. Writes are independent per candle: a failed
//! write is logged and counted, and the batch carries on.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::candle::Candle;
use crate::domain::error::JournalError;
use crate::domain::forex::Timeframe;
use crate::domain::indicator::{compute_indicators, Indicators};
use crate::domain::rule::{EvaluationInput, RuleOutcome, RuleResult};
use crate::domain::rule_eval::evaluate_all_rules;
use crate::ports::market_data_port::MarketDataPort;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub inserted: usize,
    pub duplicates: usize,
}

/// Stores new candles with their geometry indicators. Candles already
/// present for the same timestamp are left as they are.
pub fn import_candles(
    port: &dyn MarketDataPort,
    candles: &[Candle],
) -> Result<ImportSummary, JournalError> {
    let mut summary = ImportSummary::default();
    for candle in candles {
        candle.validate()?;
        if port.insert_candle(candle)? {
            port.save_indicators(&Indicators::from_candle(candle))?;
            summary.inserted += 1;
        } else {
            summary.duplicates += 1;
        }
    }
    info!(
        inserted = summary.inserted,
        duplicates = summary.duplicates,
        "candles imported"
    );
    Ok(summary)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackfillSummary {
    pub candles: usize,
    pub saved: usize,
    pub failed: usize,
    pub with_ema200: usize,
}

/// Recomputes every candle's indicators in one forward pass over the series.
pub fn backfill_indicators(
    port: &dyn MarketDataPort,
    symbol: &str,
    timeframe: Timeframe,
) -> Result<BackfillSummary, JournalError> {
    let candles = port.list_candles(symbol, timeframe)?;
    let mut summary = BackfillSummary {
        candles: candles.len(),
        ..Default::default()
    };

    for indicators in compute_indicators(&candles) {
        if indicators.ema200.is_some() {
            summary.with_ema200 += 1;
        }
        match port.save_indicators(&indicators) {
            Ok(()) => summary.saved += 1,
            Err(e) => {
                warn!(candle = %indicators.candle_id, error = %e, "failed to save indicators");
                summary.failed += 1;
            }
        }
    }

    info!(
        symbol,
        timeframe = %timeframe,
        candles = summary.candles,
        saved = summary.saved,
        failed = summary.failed,
        "indicators back-filled"
    );
    Ok(summary)
}

/// Runs every registered rule against one stored candle and stores the
/// results. A result that fails to store is logged and skipped.
pub fn evaluate_candle(
    port: &dyn MarketDataPort,
    candle_id: Uuid,
) -> Result<BTreeMap<String, RuleResult>, JournalError> {
    let candle = port.get_candle(candle_id)?;
    let indicators = port
        .get_indicators(candle_id)?
        .ok_or_else(|| JournalError::not_found("indicators", candle_id))?;
    let previous = port.get_previous_indicators(&candle)?;

    let input = EvaluationInput {
        candle: &candle,
        indicators: &indicators,
        previous: previous.as_ref(),
    };
    let results = evaluate_all_rules(&input);

    let mut written = 0;
    for result in results.values() {
        match port.insert_rule_result(candle_id, result) {
            Ok(true) => written += 1,
            Ok(false) => {}
            Err(e) => {
                warn!(
                    candle = %candle_id,
                    rule = %result.rule_code,
                    error = %e,
                    "failed to store rule result"
                );
            }
        }
    }

    info!(candle = %candle_id, rules = results.len(), written, "candle evaluated");
    Ok(results)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub candles: usize,
    pub evaluated: usize,
    pub failed: usize,
    pub passes: BTreeMap<String, usize>,
}

/// Evaluates every stored candle of the series. A candle that cannot be
/// evaluated is logged and counted.
pub fn evaluate_all_candles(
    port: &dyn MarketDataPort,
    symbol: &str,
    timeframe: Timeframe,
) -> Result<BatchSummary, JournalError> {
    let candles = port.list_candles(symbol, timeframe)?;
    let mut summary = BatchSummary {
        candles: candles.len(),
        ..Default::default()
    };

    for candle in &candles {
        match evaluate_candle(port, candle.id) {
            Ok(results) => {
                summary.evaluated += 1;
                for (code, result) in results {
                    if result.outcome == RuleOutcome::Pass {
                        *summary.passes.entry(code).or_default() += 1;
                    }
                }
            }
            Err(e) => {
                warn!(candle = %candle.id, error = %e, "candle evaluation failed");
                summary.failed += 1;
            }
        }
    }

    info!(
        candles = summary.candles,
        evaluated = summary.evaluated,
        failed = summary.failed,
        "batch evaluation complete"
    );
    Ok(summary)
}
