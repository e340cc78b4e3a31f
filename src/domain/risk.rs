//! Risk, geometry and PnL arithmetic.
//!
//! Every function here is pure and validates its own preconditions.
//! [`validate_trade_geometry`] is the single authority on geometric
//! validity; the other calculators assume it has already passed.
//!
//! All quantities are exact decimals so replaying years of history yields
//! identical figures.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::error::JournalError;
use crate::domain::execution::Execution;
use crate::domain::lifecycle::actual_entry_price;
use crate::domain::trade::Bias;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

fn require_positive(field: &str, value: Decimal) -> Result<(), JournalError> {
    if value <= Decimal::ZERO {
        return Err(JournalError::invalid(field, "must be positive"));
    }
    Ok(())
}

/// Maps an overflowed checked operation to a validation error on `field`.
pub(crate) fn in_range(field: &str, value: Option<Decimal>) -> Result<Decimal, JournalError> {
    value.ok_or_else(|| JournalError::invalid(field, "exceeds the representable decimal range"))
}

fn require_positive_prices(prices: &[Decimal]) -> Result<(), JournalError> {
    if prices.iter().any(|p| *p <= Decimal::ZERO) {
        return Err(JournalError::Geometry {
            reason: "all prices must be positive".into(),
        });
    }
    Ok(())
}

/// Long: `sl < entry < tp`. Short: `tp < entry < sl`.
pub fn validate_trade_geometry(
    entry: Decimal,
    sl: Decimal,
    tp: Decimal,
    bias: Bias,
) -> Result<(), JournalError> {
    require_positive_prices(&[entry, sl, tp])?;

    let reason = match bias {
        Bias::Long if sl >= entry => "long trade: sl must be below entry",
        Bias::Long if tp <= entry => "long trade: tp must be above entry",
        Bias::Short if sl <= entry => "short trade: sl must be above entry",
        Bias::Short if tp >= entry => "short trade: tp must be below entry",
        _ => return Ok(()),
    };
    Err(JournalError::Geometry {
        reason: reason.into(),
    })
}

/// `|entry - sl|` in price units.
pub fn compute_stop_distance(entry: Decimal, sl: Decimal) -> Result<Decimal, JournalError> {
    require_positive_prices(&[entry, sl])?;

    let distance = (entry - sl).abs();
    if distance.is_zero() {
        return Err(JournalError::Geometry {
            reason: "entry and sl cannot be equal".into(),
        });
    }
    Ok(distance)
}

/// Converts a price distance into pips, e.g. `0.0050 / 0.0001 = 50`.
pub fn compute_stop_distance_pips(
    stop_distance: Decimal,
    pip_size: Decimal,
) -> Result<Decimal, JournalError> {
    require_positive("pip size", pip_size)?;
    require_positive("stop distance", stop_distance)?;
    in_range("stop distance", stop_distance.checked_div(pip_size))
}

/// `risk_amount / (stop_pips * pip_value_per_lot)`, in lots.
pub fn compute_position_size(
    risk_amount: Decimal,
    stop_distance_pips: Decimal,
    pip_value_per_lot: Decimal,
) -> Result<Decimal, JournalError> {
    require_positive("risk amount", risk_amount)?;
    require_positive("stop distance", stop_distance_pips)?;
    require_positive("pip value per lot", pip_value_per_lot)?;
    let stop_value = in_range(
        "stop distance",
        stop_distance_pips.checked_mul(pip_value_per_lot),
    )?;
    in_range("position size", risk_amount.checked_div(stop_value))
}

/// Reward over risk. Long: `(tp-entry)/(entry-sl)`. Short: `(entry-tp)/(sl-entry)`.
pub fn compute_rr(
    entry: Decimal,
    sl: Decimal,
    tp: Decimal,
    bias: Bias,
) -> Result<Decimal, JournalError> {
    require_positive_prices(&[entry, sl, tp])?;

    let (reward, risk) = match bias {
        Bias::Long => (tp - entry, entry - sl),
        Bias::Short => (entry - tp, sl - entry),
    };

    if risk <= Decimal::ZERO {
        return Err(JournalError::Geometry {
            reason: "risk must be positive".into(),
        });
    }

    let rr = in_range("RR", reward.checked_div(risk))?;
    if rr <= Decimal::ZERO {
        return Err(JournalError::Geometry {
            reason: "RR must be positive".into(),
        });
    }
    Ok(rr)
}

/// `balance * risk_pct / 100`, with `risk_pct` in `(0, 100]`.
pub fn compute_risk_amount(balance: Decimal, risk_pct: Decimal) -> Result<Decimal, JournalError> {
    require_positive("balance", balance)?;
    if risk_pct <= Decimal::ZERO || risk_pct > HUNDRED {
        return Err(JournalError::invalid(
            "risk percentage",
            "must be greater than 0 and at most 100",
        ));
    }
    let scaled = in_range("balance", balance.checked_mul(risk_pct))?;
    in_range("risk amount", scaled.checked_div(HUNDRED))
}

/// Largest position the account's leverage allows, in lots.
pub fn compute_max_position_size(
    balance: Decimal,
    leverage: u32,
    contract_size: Decimal,
) -> Result<Decimal, JournalError> {
    require_positive("balance", balance)?;
    if leverage == 0 {
        return Err(JournalError::invalid("leverage", "must be positive"));
    }
    require_positive("contract size", contract_size)?;
    let notional = in_range("balance", balance.checked_mul(Decimal::from(leverage)))?;
    in_range("max position size", notional.checked_div(contract_size))
}

/// Rejects a fill whose distance from the planned entry exceeds
/// `max_slippage_pips`.
pub fn validate_entry_price(
    planned: Decimal,
    actual: Decimal,
    pip_size: Decimal,
    max_slippage_pips: Decimal,
) -> Result<(), JournalError> {
    require_positive_prices(&[planned, actual])?;
    require_positive("pip size", pip_size)?;

    let slippage_pips = in_range("entry price", (actual - planned).abs().checked_div(pip_size))?;
    if slippage_pips > max_slippage_pips {
        return Err(JournalError::SlippageExceeded {
            slippage_pips,
            max_pips: max_slippage_pips,
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pnl {
    pub money: Decimal,
    pub pips: Decimal,
}

/// Profit and loss of closing `position_size` lots at `close_price`.
///
/// The entry side is the price filled by the `entry` execution in
/// `executions`, never the planned entry.
pub fn compute_pnl(
    bias: Bias,
    executions: &[Execution],
    close_price: Decimal,
    position_size: Decimal,
    pip_size: Decimal,
    contract_size: Decimal,
) -> Result<Pnl, JournalError> {
    require_positive("pip size", pip_size)?;
    require_positive("close price", close_price)?;
    let entry = actual_entry_price(executions)?;

    let move_in_favour = match bias {
        Bias::Long => close_price - entry,
        Bias::Short => entry - close_price,
    };
    let pips = in_range("pnl", move_in_favour.checked_div(pip_size))?;
    let money = pips
        .checked_mul(pip_size)
        .and_then(|v| v.checked_mul(position_size))
        .and_then(|v| v.checked_mul(contract_size));
    let money = in_range("pnl", money)?;

    Ok(Pnl { money, pips })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::execution::ExecutionKind;
    use crate::domain::forex::{CONTRACT_SIZE_EURUSD, PIP_SIZE_EURUSD, PIP_VALUE_PER_LOT_EURUSD};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn entry_at(price: Decimal) -> Vec<Execution> {
        vec![Execution {
            id: Uuid::new_v4(),
            trade_id: Uuid::nil(),
            kind: ExecutionKind::Entry,
            price,
            position_size: dec!(1),
            pnl: None,
            pnl_pips: None,
            executed_at: Utc::now(),
            reason: None,
        }]
    }

    #[test]
    fn long_geometry() {
        assert!(
            validate_trade_geometry(dec!(1.1050), dec!(1.1000), dec!(1.1200), Bias::Long).is_ok()
        );
        assert!(matches!(
            validate_trade_geometry(dec!(1.1050), dec!(1.1100), dec!(1.1200), Bias::Long),
            Err(JournalError::Geometry { .. })
        ));
        assert!(
            validate_trade_geometry(dec!(1.1050), dec!(1.1000), dec!(1.1050), Bias::Long).is_err()
        );
    }

    #[test]
    fn short_geometry() {
        assert!(
            validate_trade_geometry(dec!(1.1050), dec!(1.1100), dec!(1.0950), Bias::Short).is_ok()
        );
        assert!(
            validate_trade_geometry(dec!(1.1050), dec!(1.1000), dec!(1.0950), Bias::Short)
                .is_err()
        );
        assert!(
            validate_trade_geometry(dec!(1.1050), dec!(1.1100), dec!(1.1150), Bias::Short)
                .is_err()
        );
    }

    #[test]
    fn geometry_rejects_non_positive_prices() {
        assert!(
            validate_trade_geometry(dec!(0), dec!(1.1000), dec!(1.1200), Bias::Long).is_err()
        );
        assert!(
            validate_trade_geometry(dec!(1.1050), dec!(-1), dec!(1.1200), Bias::Long).is_err()
        );
    }

    #[test]
    fn stop_distance() {
        assert_eq!(compute_stop_distance(dec!(1.1050), dec!(1.1000)).unwrap(), dec!(0.0050));
        assert_eq!(compute_stop_distance(dec!(1.1000), dec!(1.1050)).unwrap(), dec!(0.0050));
        assert!(compute_stop_distance(dec!(1.1000), dec!(1.1000)).is_err());
        assert!(compute_stop_distance(dec!(0), dec!(1.1000)).is_err());
    }

    #[test]
    fn stop_distance_pips() {
        assert_eq!(
            compute_stop_distance_pips(dec!(0.0050), PIP_SIZE_EURUSD).unwrap(),
            dec!(50)
        );
        assert!(compute_stop_distance_pips(dec!(0.0050), dec!(0)).is_err());
        assert!(compute_stop_distance_pips(dec!(0), PIP_SIZE_EURUSD).is_err());
    }

    #[test]
    fn position_size() {
        assert_eq!(
            compute_position_size(dec!(100), dec!(50), PIP_VALUE_PER_LOT_EURUSD).unwrap(),
            dec!(0.2)
        );
        assert!(compute_position_size(dec!(0), dec!(50), dec!(10)).is_err());
        assert!(compute_position_size(dec!(100), dec!(0), dec!(10)).is_err());
        assert!(compute_position_size(dec!(100), dec!(50), dec!(0)).is_err());
    }

    #[test]
    fn rr_long_and_short() {
        assert_eq!(
            compute_rr(dec!(1.1050), dec!(1.1000), dec!(1.1150), Bias::Long).unwrap(),
            dec!(2)
        );
        assert_eq!(
            compute_rr(dec!(1.1050), dec!(1.1100), dec!(1.0900), Bias::Short).unwrap(),
            dec!(3)
        );
        assert!(compute_rr(dec!(1.1050), dec!(1.1100), dec!(1.1150), Bias::Long).is_err());
    }

    #[test]
    fn risk_amount() {
        assert_eq!(compute_risk_amount(dec!(10000), dec!(1)).unwrap(), dec!(100));
        assert_eq!(compute_risk_amount(dec!(20000), dec!(0.5)).unwrap(), dec!(100));
        assert_eq!(compute_risk_amount(dec!(500), dec!(100)).unwrap(), dec!(500));
        assert!(compute_risk_amount(dec!(10000), dec!(0)).is_err());
        assert!(compute_risk_amount(dec!(10000), dec!(150)).is_err());
        assert!(compute_risk_amount(dec!(-10000), dec!(1)).is_err());
    }

    #[test]
    fn max_position_size() {
        assert_eq!(
            compute_max_position_size(dec!(10000), 100, CONTRACT_SIZE_EURUSD).unwrap(),
            dec!(10)
        );
        assert!(compute_max_position_size(dec!(10000), 0, CONTRACT_SIZE_EURUSD).is_err());
        assert!(compute_max_position_size(dec!(0), 100, CONTRACT_SIZE_EURUSD).is_err());
    }

    #[test]
    fn overflow_is_an_error_not_a_panic() {
        assert!(matches!(
            compute_max_position_size(Decimal::MAX, 2, CONTRACT_SIZE_EURUSD),
            Err(JournalError::InvalidInput { .. })
        ));
        assert!(compute_risk_amount(Decimal::MAX, dec!(50)).is_err());
        assert!(compute_stop_distance_pips(Decimal::MAX, PIP_SIZE_EURUSD).is_err());
        assert!(compute_position_size(Decimal::MAX, dec!(0.5), dec!(1)).is_err());

        let history = entry_at(dec!(1.1000));
        assert!(compute_pnl(
            Bias::Long,
            &history,
            Decimal::MAX,
            dec!(100),
            PIP_SIZE_EURUSD,
            CONTRACT_SIZE_EURUSD
        )
        .is_err());
    }

    #[test]
    fn entry_price_slippage() {
        assert!(
            validate_entry_price(dec!(1.1050), dec!(1.1070), PIP_SIZE_EURUSD, dec!(20)).is_ok()
        );
        match validate_entry_price(dec!(1.1050), dec!(1.1071), PIP_SIZE_EURUSD, dec!(20)) {
            Err(JournalError::SlippageExceeded { slippage_pips, .. }) => {
                assert_eq!(slippage_pips, dec!(21))
            }
            other => panic!("expected SlippageExceeded, got {other:?}"),
        }
    }

    #[test]
    fn pnl_uses_filled_entry_not_planned() {
        // Planned 1.1050 but filled 1.1060 after slippage.
        let history = entry_at(dec!(1.1060));
        let pnl = compute_pnl(
            Bias::Long,
            &history,
            dec!(1.1150),
            dec!(0.6),
            PIP_SIZE_EURUSD,
            CONTRACT_SIZE_EURUSD,
        )
        .unwrap();
        assert_eq!(pnl.pips, dec!(90));
        assert_eq!(pnl.money, dec!(540));
    }

    #[test]
    fn pnl_short_loss() {
        let history = entry_at(dec!(1.1050));
        let pnl = compute_pnl(
            Bias::Short,
            &history,
            dec!(1.1100),
            dec!(1),
            PIP_SIZE_EURUSD,
            CONTRACT_SIZE_EURUSD,
        )
        .unwrap();
        assert_eq!(pnl.pips, dec!(-50));
        assert_eq!(pnl.money, dec!(-500));
    }

    #[test]
    fn pnl_without_entry_fails() {
        assert!(compute_pnl(
            Bias::Long,
            &[],
            dec!(1.1100),
            dec!(1),
            PIP_SIZE_EURUSD,
            CONTRACT_SIZE_EURUSD
        )
        .is_err());
    }
}
