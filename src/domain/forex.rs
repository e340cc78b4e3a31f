//! Instrument constants for the journalled pair.
//!
//! The engine is EURUSD/W1 specific by constant; the formulas themselves
//! take these as parameters.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub const SYMBOL_EURUSD: &str = "EURUSD";

/// Price increment of one pip.
pub const PIP_SIZE_EURUSD: Decimal = dec!(0.0001);

/// Units per standard lot.
pub const CONTRACT_SIZE_EURUSD: Decimal = dec!(100000);

/// Account-currency value of one pip on one standard lot.
pub const PIP_VALUE_PER_LOT_EURUSD: Decimal = dec!(10);

/// Smallest tradeable position increment, in lots.
pub const LOT_STEP: Decimal = dec!(0.01);

pub const DEFAULT_MAX_ENTRY_SLIPPAGE_PIPS: Decimal = dec!(20);

/// Planned stop distance bounds, in pips, inclusive.
pub const MIN_STOP_PIPS: Decimal = dec!(5);
pub const MAX_STOP_PIPS: Decimal = dec!(500);

/// Lowest reward-to-risk ratio a trade may be planned with.
pub const MIN_RR: Decimal = dec!(1.5);

/// Decimal places kept for planned risk-reward ratios.
pub const RR_SCALE: u32 = 2;

/// Decimal places kept for planned risk amounts.
pub const MONEY_SCALE: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum Timeframe {
    #[serde(rename = "W1")]
    W1,
    #[serde(rename = "D1")]
    D1,
    #[serde(rename = "H4")]
    H4,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::W1 => "W1",
            Timeframe::D1 => "D1",
            Timeframe::H4 => "H4",
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Timeframe {
    type Err = crate::domain::error::JournalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "W1" => Ok(Timeframe::W1),
            "D1" => Ok(Timeframe::D1),
            "H4" => Ok(Timeframe::H4),
            other => Err(crate::domain::error::JournalError::invalid(
                "timeframe",
                format!("unknown timeframe '{other}'"),
            )),
        }
    }
}
