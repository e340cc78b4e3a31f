//! Candle, indicator and rule-result storage port.
//!
//! These writes are independent per candle and carry no cross-candle
//! transaction.

use uuid::Uuid;

use crate::domain::candle::Candle;
use crate::domain::error::JournalError;
use crate::domain::forex::Timeframe;
use crate::domain::indicator::Indicators;
use crate::domain::rule::RuleResult;

pub trait MarketDataPort {
    /// Inserts a candle unless one already exists for the same symbol,
    /// timeframe and timestamp. Returns whether it was written.
    fn insert_candle(&self, candle: &Candle) -> Result<bool, JournalError>;

    /// Candles for the symbol and timeframe, oldest first.
    fn list_candles(&self, symbol: &str, timeframe: Timeframe) -> Result<Vec<Candle>, JournalError>;

    /// Fails with `NotFound` if the candle does not exist.
    fn get_candle(&self, id: Uuid) -> Result<Candle, JournalError>;

    /// Inserts or replaces the indicators of one candle.
    fn save_indicators(&self, indicators: &Indicators) -> Result<(), JournalError>;

    fn get_indicators(&self, candle_id: Uuid) -> Result<Option<Indicators>, JournalError>;

    /// Indicators of the candle immediately before `candle` in its series.
    fn get_previous_indicators(&self, candle: &Candle) -> Result<Option<Indicators>, JournalError>;

    /// Writes the result unless one already exists for this rule version and
    /// candle. Returns whether it was written.
    fn insert_rule_result(
        &self,
        candle_id: Uuid,
        result: &RuleResult,
    ) -> Result<bool, JournalError>;

    fn rule_results(&self, candle_id: Uuid) -> Result<Vec<RuleResult>, JournalError>;
}
