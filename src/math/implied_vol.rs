//! Implied-volatility root finding.
//!
//! Newton-Raphson from a Brenner-Subrahmanyam seed, falling back to
//! bisection when vega degenerates or Newton stalls. Non-convergence and
//! below-intrinsic targets return NaN; callers check and skip.

use std::f64::consts::PI;

use super::black_scholes::{BlackScholes, MAX_VOL, MIN_VOL};
use crate::model::contract::OptionType;

/// Absolute price tolerance for convergence.
const PRICE_TOL: f64 = 1e-7;
/// Vega below this aborts Newton.
const VEGA_FLOOR: f64 = 1e-10;
/// Newton gets this many steps before bisection takes over.
const NEWTON_ITERS: usize = 10;
/// Total iteration budget across both phases.
const MAX_ITERS: usize = 100;

/// Solve for the volatility that reproduces `target_price`.
///
/// Returns NaN when the target is below discounted intrinsic, outside the
/// bisection bracket, or the budget runs out.
pub fn implied_vol(
    bs: &BlackScholes,
    target_price: f64,
    spot: f64,
    strike: f64,
    time: f64,
    opt_type: OptionType,
) -> f64 {
    if spot <= 0.0 || strike <= 0.0 || time <= 0.0 || !target_price.is_finite() {
        return f64::NAN;
    }
    if target_price < bs.discounted_intrinsic(spot, strike, time, opt_type) {
        return f64::NAN;
    }

    // Brenner-Subrahmanyam ATM approximation as the seed.
    let mut vol = ((2.0 * PI).sqrt() * target_price / (spot * time.sqrt())).clamp(0.1, 1.0);
    let mut best_err = f64::INFINITY;
    let mut iters = 0usize;

    for _ in 0..NEWTON_ITERS {
        iters += 1;
        let price = bs.price(spot, strike, time, vol, opt_type);
        let err = (price - target_price).abs();
        if err < PRICE_TOL {
            return vol;
        }
        let vega = bs.vega_raw(spot, strike, time, vol);
        if vega.abs() < VEGA_FLOOR {
            break;
        }
        if err >= best_err {
            // Stalled; let bisection finish the job.
            break;
        }
        best_err = err;
        vol = (vol - (price - target_price) / vega).clamp(MIN_VOL, MAX_VOL);
    }

    bisect(bs, target_price, spot, strike, time, opt_type, MAX_ITERS - iters)
}

/// Bisection over the full vol clamp range. Refuses targets outside the
/// bracket prices.
fn bisect(
    bs: &BlackScholes,
    target_price: f64,
    spot: f64,
    strike: f64,
    time: f64,
    opt_type: OptionType,
    budget: usize,
) -> f64 {
    let mut lo = MIN_VOL;
    let mut hi = MAX_VOL;
    let price_lo = bs.price(spot, strike, time, lo, opt_type);
    let price_hi = bs.price(spot, strike, time, hi, opt_type);
    if target_price < price_lo || target_price > price_hi {
        return f64::NAN;
    }

    for _ in 0..budget {
        let mid = 0.5 * (lo + hi);
        let price = bs.price(spot, strike, time, mid, opt_type);
        if (price - target_price).abs() < PRICE_TOL {
            return mid;
        }
        if price < target_price {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    f64::NAN
}
