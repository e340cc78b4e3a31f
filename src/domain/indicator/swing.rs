//! Five-bar fractal swing points.
//!
//! A swing high is confirmed when a bar's high is strictly greater than the
//! highs of the two bars on each side; swing lows mirror this. Confirmation
//! therefore lags the swing bar by two candles.

use rust_decimal::Decimal;
use std::collections::VecDeque;

const WINDOW: usize = 5;
const MIDDLE: usize = WINDOW / 2;

#[derive(Debug, Clone, Default)]
pub struct SwingTracker {
    window: VecDeque<(Decimal, Decimal)>,
    last_high: Option<Decimal>,
    last_low: Option<Decimal>,
}

impl SwingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds the next bar and returns the last confirmed (swing high, swing low).
    pub fn update(&mut self, high: Decimal, low: Decimal) -> (Option<Decimal>, Option<Decimal>) {
        if self.window.len() == WINDOW {
            self.window.pop_front();
        }
        self.window.push_back((high, low));

        if self.window.len() == WINDOW {
            let (mid_high, mid_low) = self.window[MIDDLE];
            let others = self
                .window
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != MIDDLE)
                .map(|(_, bar)| *bar);

            let (mut is_high, mut is_low) = (true, true);
            for (h, l) in others {
                is_high &= mid_high > h;
                is_low &= mid_low < l;
            }
            if is_high {
                self.last_high = Some(mid_high);
            }
            if is_low {
                self.last_low = Some(mid_low);
            }
        }

        (self.last_high, self.last_low)
    }
}
