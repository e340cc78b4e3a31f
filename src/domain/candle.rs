//! OHLC candle representation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::error::JournalError;
use crate::domain::forex::Timeframe;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candle {
    pub id: Uuid,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Option<i64>,
}

impl Candle {
    /// Builds a candle with a fresh id after checking OHLC consistency.
    pub fn new(
        symbol: &str,
        timeframe: Timeframe,
        timestamp: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Option<i64>,
    ) -> Result<Self, JournalError> {
        let candle = Candle {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            timeframe,
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        };
        candle.validate()?;
        Ok(candle)
    }

    pub fn validate(&self) -> Result<(), JournalError> {
        if [self.open, self.high, self.low, self.close]
            .iter()
            .any(|p| *p <= Decimal::ZERO)
        {
            return Err(JournalError::invalid("candle", "prices must be positive"));
        }
        if self.high < self.low {
            return Err(JournalError::invalid("candle", "high below low"));
        }
        if self.open > self.high || self.open < self.low {
            return Err(JournalError::invalid("candle", "open outside high/low range"));
        }
        if self.close > self.high || self.close < self.low {
            return Err(JournalError::invalid("candle", "close outside high/low range"));
        }
        Ok(())
    }

    pub fn range_size(&self) -> Decimal {
        self.high - self.low
    }

    pub fn body_size(&self) -> Decimal {
        (self.close - self.open).abs()
    }

    pub fn upper_wick(&self) -> Decimal {
        self.high - self.open.max(self.close)
    }

    pub fn lower_wick(&self) -> Decimal {
        self.open.min(self.close) - self.low
    }

    /// (high + low) / 2
    pub fn mid_price(&self) -> Decimal {
        self.low + self.range_size() / Decimal::TWO
    }
}
