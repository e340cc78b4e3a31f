//! Per-candle indicators.
//!
//! Indicators are computed in two stages:
//! - Geometry (range, body, wicks, mid price) from a single candle, available
//!   as soon as the candle is imported.
//! - EMA20/50/200 and the last confirmed swing points, which need the whole
//!   preceding history and are produced by one forward pass over the ordered
//!   candles ([`IndicatorPass`]).

pub mod ema;
pub mod swing;

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::candle::Candle;
use ema::{Ema, EMA_SCALE};
use swing::SwingTracker;

pub const EMA_FAST: usize = 20;
pub const EMA_MID: usize = 50;
pub const EMA_SLOW: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Indicators {
    pub candle_id: Uuid,
    pub ema20: Option<Decimal>,
    pub ema50: Option<Decimal>,
    pub ema200: Option<Decimal>,
    pub range_size: Decimal,
    pub body_size: Decimal,
    pub upper_wick: Decimal,
    pub lower_wick: Decimal,
    pub mid_price: Decimal,
    pub last_swing_high: Option<Decimal>,
    pub last_swing_low: Option<Decimal>,
}

impl Indicators {
    /// Geometry-only indicators; history-dependent fields are absent.
    pub fn from_candle(candle: &Candle) -> Self {
        Indicators {
            candle_id: candle.id,
            ema20: None,
            ema50: None,
            ema200: None,
            range_size: candle.range_size(),
            body_size: candle.body_size(),
            upper_wick: candle.upper_wick(),
            lower_wick: candle.lower_wick(),
            mid_price: candle.mid_price(),
            last_swing_high: None,
            last_swing_low: None,
        }
    }
}

/// Lazy forward pass producing full indicators for each candle in order.
///
/// Candles must be supplied oldest first. The pass carries EMA and swing
/// state, so it cannot be restarted part way through.
pub struct IndicatorPass<I> {
    candles: I,
    ema20: Ema,
    ema50: Ema,
    ema200: Ema,
    swings: SwingTracker,
}

impl<'a, I> IndicatorPass<I>
where
    I: Iterator<Item = &'a Candle>,
{
    pub fn new(candles: I) -> Self {
        IndicatorPass {
            candles,
            ema20: Ema::new(EMA_FAST),
            ema50: Ema::new(EMA_MID),
            ema200: Ema::new(EMA_SLOW),
            swings: SwingTracker::new(),
        }
    }
}

impl<'a, I> Iterator for IndicatorPass<I>
where
    I: Iterator<Item = &'a Candle>,
{
    type Item = Indicators;

    fn next(&mut self) -> Option<Indicators> {
        let candle = self.candles.next()?;
        let (last_swing_high, last_swing_low) = self.swings.update(candle.high, candle.low);
        Some(Indicators {
            ema20: self.ema20.update(candle.close).map(|v| v.round_dp(EMA_SCALE)),
            ema50: self.ema50.update(candle.close).map(|v| v.round_dp(EMA_SCALE)),
            ema200: self.ema200.update(candle.close).map(|v| v.round_dp(EMA_SCALE)),
            last_swing_high,
            last_swing_low,
            ..Indicators::from_candle(candle)
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.candles.size_hint()
    }
}

pub fn compute_indicators<'a, I>(candles: I) -> IndicatorPass<I::IntoIter>
where
    I: IntoIterator<Item = &'a Candle>,
{
    IndicatorPass::new(candles.into_iter())
}
