//! Core domain types and logic.

pub mod error;
pub mod forex;
pub mod execution;
pub mod lifecycle;
pub mod risk;
pub mod trade;
pub mod session;
pub mod candle;
pub mod indicator;
pub mod rule;
pub mod rule_eval;
pub mod retry;
pub mod journal;
pub mod evaluation;
pub mod config_validation;
