//! Trailing-stop math. Pure functions of a position's extreme price and
//! configured trail percentage, recomputed on every tick of an OPEN
//! position.

use intraday_data::model::Direction;

use super::{ExitReason, Position};

/*----- */
// Extreme price
/*----- */
/// Ratchet the tracked extreme in the favorable direction only: highest
/// seen for Long, lowest seen for Short.
pub fn ratchet_extreme(direction: Direction, extreme: f64, ltp: f64) -> f64 {
    match direction {
        Direction::Long => extreme.max(ltp),
        Direction::Short => {
            if extreme <= 0.0 {
                ltp
            } else {
                extreme.min(ltp)
            }
        }
    }
}

/*----- */
// Trigger price
/*----- */
/// Trailing-stop trigger derived from the extreme. Zero when trailing is
/// disabled or no extreme has been established yet.
pub fn trigger_price(direction: Direction, extreme: f64, trail_pct: f64) -> f64 {
    if trail_pct <= 0.0 || extreme <= 0.0 {
        return 0.0;
    }
    match direction {
        Direction::Long => extreme * (1.0 - trail_pct / 100.0),
        Direction::Short => extreme * (1.0 + trail_pct / 100.0),
    }
}

/*----- */
// Tick update
/*----- */
/// Fold one tick into an OPEN position: ltp, unrealised pnl, extreme and
/// trailing trigger. The trigger only ever moves risk-reducing, so it is
/// ratcheted against its previous value rather than recomputed blindly.
pub fn apply_tick(position: &mut Position, ltp: f64) {
    position.ltp = ltp;
    position.unrealised_pnl = position.pnl_at(ltp);
    position.updated_at = chrono::Utc::now();

    position.extreme_price = ratchet_extreme(position.direction, position.extreme_price, ltp);

    let fresh = trigger_price(position.direction, position.extreme_price, position.trail_pct);
    if fresh > 0.0 {
        position.tsl_trigger = match position.direction {
            Direction::Long => position.tsl_trigger.max(fresh),
            Direction::Short => {
                if position.tsl_trigger <= 0.0 {
                    fresh
                } else {
                    position.tsl_trigger.min(fresh)
                }
            }
        };
    }
}

/*----- */
// Exit evaluation
/*----- */
/// Same-tick precedence is fixed: target, then stop-loss, then trailing
/// stop. First match wins. Levels at zero are disabled.
pub fn evaluate_exit(position: &Position, ltp: f64) -> Option<ExitReason> {
    match position.direction {
        Direction::Long => {
            if position.target_price > 0.0 && ltp >= position.target_price {
                return Some(ExitReason::Target);
            }
            if position.stop_price > 0.0 && ltp <= position.stop_price {
                return Some(ExitReason::StopLoss);
            }
            if position.tsl_trigger > 0.0 && ltp <= position.tsl_trigger {
                return Some(ExitReason::TrailingStop);
            }
        }
        Direction::Short => {
            if position.target_price > 0.0 && ltp <= position.target_price {
                return Some(ExitReason::Target);
            }
            if position.stop_price > 0.0 && ltp >= position.stop_price {
                return Some(ExitReason::StopLoss);
            }
            if position.tsl_trigger > 0.0 && ltp >= position.tsl_trigger {
                return Some(ExitReason::TrailingStop);
            }
        }
    }
    None
}

/*----- */
// Test
/*----- */
