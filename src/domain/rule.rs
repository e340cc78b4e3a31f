//! Condition codes, rule definitions and the frozen rule registry.
//!
//! A rule is identified by its code and version. Once a version has been used
//! to score history its condition list must never change; a new version is
//! registered instead.

use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::domain::candle::Candle;
use crate::domain::error::JournalError;
use crate::domain::forex::Timeframe;
use crate::domain::indicator::Indicators;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionCode {
    Ema50GtEma200,
    CloseGtEma50,
    Ema50SlopePositive,
    Ema50LtEma200,
    CloseLtEma50,
    Ema50SlopeNegative,
}

impl ConditionCode {
    pub const ALL: [ConditionCode; 6] = [
        ConditionCode::Ema50GtEma200,
        ConditionCode::CloseGtEma50,
        ConditionCode::Ema50SlopePositive,
        ConditionCode::Ema50LtEma200,
        ConditionCode::CloseLtEma50,
        ConditionCode::Ema50SlopeNegative,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionCode::Ema50GtEma200 => "ema50_gt_ema200",
            ConditionCode::CloseGtEma50 => "close_gt_ema50",
            ConditionCode::Ema50SlopePositive => "ema50_slope_positive",
            ConditionCode::Ema50LtEma200 => "ema50_lt_ema200",
            ConditionCode::CloseLtEma50 => "close_lt_ema50",
            ConditionCode::Ema50SlopeNegative => "ema50_slope_negative",
        }
    }
}

impl fmt::Display for ConditionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConditionCode {
    type Err = JournalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConditionCode::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| {
                JournalError::invalid("condition code", format!("unknown condition '{s}'"))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSpec {
    pub code: &'static str,
    pub version: u32,
    pub name: &'static str,
    pub description: &'static str,
    pub timeframe: Timeframe,
    pub conditions: &'static [ConditionCode],
}

pub const W1_TREND_BULLISH: &str = "W1_TREND_BULLISH";
pub const W1_TREND_BEARISH: &str = "W1_TREND_BEARISH";

pub static RULES: [RuleSpec; 2] = [
    RuleSpec {
        code: W1_TREND_BULLISH,
        version: 1,
        name: "Weekly bullish trend",
        description: "EMA50 above EMA200, close above EMA50, EMA50 rising",
        timeframe: Timeframe::W1,
        conditions: &[
            ConditionCode::Ema50GtEma200,
            ConditionCode::CloseGtEma50,
            ConditionCode::Ema50SlopePositive,
        ],
    },
    RuleSpec {
        code: W1_TREND_BEARISH,
        version: 1,
        name: "Weekly bearish trend",
        description: "EMA50 below EMA200, close below EMA50, EMA50 falling",
        timeframe: Timeframe::W1,
        conditions: &[
            ConditionCode::Ema50LtEma200,
            ConditionCode::CloseLtEma50,
            ConditionCode::Ema50SlopeNegative,
        ],
    },
];

pub fn rule_by_code(code: &str) -> Result<&'static RuleSpec, JournalError> {
    RULES
        .iter()
        .find(|r| r.code == code)
        .ok_or_else(|| JournalError::UnknownRule {
            code: code.to_string(),
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RuleOutcome {
    Pass,
    Fail,
}

impl RuleOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleOutcome::Pass => "PASS",
            RuleOutcome::Fail => "FAIL",
        }
    }
}

impl FromStr for RuleOutcome {
    type Err = JournalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PASS" => Ok(RuleOutcome::Pass),
            "FAIL" => Ok(RuleOutcome::Fail),
            other => Err(JournalError::invalid(
                "rule outcome",
                format!("unknown outcome '{other}'"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleResult {
    pub rule_code: String,
    pub rule_version: u32,
    pub outcome: RuleOutcome,
    pub confidence: Decimal,
    pub conditions_met: Vec<ConditionCode>,
    pub conditions_failed: Vec<ConditionCode>,
}

/// Everything a condition may look at for one candle.
///
/// `previous` holds the indicators of the immediately preceding candle of
/// the same symbol and timeframe, if any.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationInput<'a> {
    pub candle: &'a Candle,
    pub indicators: &'a Indicators,
    pub previous: Option<&'a Indicators>,
}

impl EvaluationInput<'_> {
    pub fn ema50_prev(&self) -> Option<Decimal> {
        self.previous.and_then(|p| p.ema50)
    }
}
