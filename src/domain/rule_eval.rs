//! Condition predicates and the rule evaluator.
//!
//! # Evaluation semantics
//!
//! - Each condition is evaluated independently; there is no short-circuit.
//! - A rule passes only when every one of its conditions is met.
//! - A condition reading an absent EMA (not yet back-filled, or no previous
//!   candle) is not met.
//! - Confidence is frozen: 0 for a failing rule or a rule with no conditions,
//!   otherwise met / total.

use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::domain::error::JournalError;
use crate::domain::rule::{
    rule_by_code, ConditionCode, EvaluationInput, RuleOutcome, RuleResult, RuleSpec, RULES,
};

/// Decimal places kept for confidence values.
pub const CONFIDENCE_SCALE: u32 = 4;

type Predicate = fn(&EvaluationInput<'_>) -> bool;

static CONDITIONS: [(ConditionCode, Predicate); 6] = [
    (ConditionCode::Ema50GtEma200, ema50_gt_ema200),
    (ConditionCode::CloseGtEma50, close_gt_ema50),
    (ConditionCode::Ema50SlopePositive, ema50_slope_positive),
    (ConditionCode::Ema50LtEma200, ema50_lt_ema200),
    (ConditionCode::CloseLtEma50, close_lt_ema50),
    (ConditionCode::Ema50SlopeNegative, ema50_slope_negative),
];

fn ema50_gt_ema200(input: &EvaluationInput<'_>) -> bool {
    match (input.indicators.ema50, input.indicators.ema200) {
        (Some(ema50), Some(ema200)) => ema50 > ema200,
        _ => false,
    }
}

fn ema50_lt_ema200(input: &EvaluationInput<'_>) -> bool {
    match (input.indicators.ema50, input.indicators.ema200) {
        (Some(ema50), Some(ema200)) => ema50 < ema200,
        _ => false,
    }
}

fn close_gt_ema50(input: &EvaluationInput<'_>) -> bool {
    input
        .indicators
        .ema50
        .is_some_and(|ema50| input.candle.close > ema50)
}

fn close_lt_ema50(input: &EvaluationInput<'_>) -> bool {
    input
        .indicators
        .ema50
        .is_some_and(|ema50| input.candle.close < ema50)
}

fn ema50_slope_positive(input: &EvaluationInput<'_>) -> bool {
    match (input.indicators.ema50, input.ema50_prev()) {
        (Some(current), Some(prev)) => current > prev,
        _ => false,
    }
}

fn ema50_slope_negative(input: &EvaluationInput<'_>) -> bool {
    match (input.indicators.ema50, input.ema50_prev()) {
        (Some(current), Some(prev)) => current < prev,
        _ => false,
    }
}

pub fn evaluate_condition(code: ConditionCode, input: &EvaluationInput<'_>) -> bool {
    CONDITIONS
        .iter()
        .find(|(c, _)| *c == code)
        .is_some_and(|(_, predicate)| predicate(input))
}

/// All-or-nothing: true only when at least one condition exists and all are met.
pub fn should_pass(met: usize, total: usize) -> bool {
    total > 0 && met == total
}

/// Frozen confidence formula.
pub fn compute_confidence(met: usize, total: usize, outcome: RuleOutcome) -> Decimal {
    if total == 0 || outcome == RuleOutcome::Fail {
        return Decimal::ZERO;
    }
    (Decimal::from(met as u64) / Decimal::from(total as u64)).round_dp(CONFIDENCE_SCALE)
}

pub fn evaluate_rule(rule: &RuleSpec, input: &EvaluationInput<'_>) -> RuleResult {
    let (met, failed): (Vec<ConditionCode>, Vec<ConditionCode>) = rule
        .conditions
        .iter()
        .partition(|code| evaluate_condition(**code, input));

    let total = rule.conditions.len();
    let outcome = if should_pass(met.len(), total) {
        RuleOutcome::Pass
    } else {
        RuleOutcome::Fail
    };

    RuleResult {
        rule_code: rule.code.to_string(),
        rule_version: rule.version,
        outcome,
        confidence: compute_confidence(met.len(), total, outcome),
        conditions_met: met,
        conditions_failed: failed,
    }
}

/// Evaluates the named rules. Unknown codes are logged and skipped.
pub fn evaluate_rules(codes: &[&str], input: &EvaluationInput<'_>) -> BTreeMap<String, RuleResult> {
    let mut results = BTreeMap::new();
    for code in codes {
        match rule_by_code(code) {
            Ok(rule) => {
                results.insert(rule.code.to_string(), evaluate_rule(rule, input));
            }
            Err(e) => {
                tracing::warn!(rule = %code, error = %e, "skipping rule");
            }
        }
    }
    results
}

pub fn evaluate_all_rules(input: &EvaluationInput<'_>) -> BTreeMap<String, RuleResult> {
    let codes: Vec<&str> = RULES.iter().map(|r| r.code).collect();
    evaluate_rules(&codes, input)
}

/// Looks up and evaluates a single rule by code.
pub fn evaluate_rule_by_code(
    code: &str,
    input: &EvaluationInput<'_>,
) -> Result<RuleResult, JournalError> {
    Ok(evaluate_rule(rule_by_code(code)?, input))
}
