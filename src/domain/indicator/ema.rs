//! Exponential Moving Average.
//!
//! k = 2/(n+1), seeded with the SMA of the first n closes, then
//! EMA[i] = C[i]*k + EMA[i-1]*(1-k). No value before the n-th close.
//!
//! Both the seed and the recursion are kept as a step from the previous
//! value towards the close, so intermediate values never leave the range
//! spanned by the inputs.

use rust_decimal::Decimal;

/// Decimal places kept for stored EMA values.
pub const EMA_SCALE: u32 = 8;

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    k: Decimal,
    seen: usize,
    seed_mean: Decimal,
    value: Option<Decimal>,
}

impl Ema {
    /// `period` must be at least 1.
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Ema {
            period,
            k: Decimal::TWO / Decimal::from(period as u64 + 1),
            seen: 0,
            seed_mean: Decimal::ZERO,
            value: None,
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Feeds the next close and returns the EMA as of that close.
    pub fn update(&mut self, close: Decimal) -> Option<Decimal> {
        self.seen += 1;
        self.value = match self.value {
            Some(prev) => Some(prev + (close - prev) * self.k),
            None => {
                // running mean of the first `period` closes
                self.seed_mean += (close - self.seed_mean) / Decimal::from(self.seen as u64);
                if self.seen == self.period {
                    Some(self.seed_mean)
                } else {
                    None
                }
            }
        };
        self.value
    }

    pub fn value(&self) -> Option<Decimal> {
        self.value
    }
}

pub fn calculate_ema(closes: &[Decimal], period: usize) -> Vec<Option<Decimal>> {
    let mut ema = Ema::new(period);
    closes.iter().map(|c| ema.update(*c)).collect()
}
