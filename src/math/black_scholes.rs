//! Black-Scholes pricing and greeks.
//!
//! All inputs are floats; the decimal-to-float conversion happens at the
//! call site. Time to expiry is clamped to a small positive floor and
//! volatility into `[1e-3, 5]` so near-expiry and junk-vol inputs stay
//! finite. Theta is reported per calendar day, vega per 1 vol-point, rho
//! per 1 rate-point.

use std::f64::consts::PI;

use statrs::distribution::{ContinuousCDF, Normal};

use crate::model::contract::OptionType;
use crate::model::greeks::Greeks;

/// Floor applied to time to expiry.
pub const MIN_TIME: f64 = 1e-6;
/// Volatility clamp range.
pub const MIN_VOL: f64 = 1e-3;
pub const MAX_VOL: f64 = 5.0;

const DAYS_PER_YEAR: f64 = 365.25;

/// Standard normal CDF; exact 0/1 outside `|x| <= 6`.
pub fn norm_cdf(x: f64) -> f64 {
    if x > 6.0 {
        return 1.0;
    }
    if x < -6.0 {
        return 0.0;
    }
    let normal = Normal::new(0.0, 1.0).unwrap();
    normal.cdf(x)
}

/// Standard normal density.
pub fn norm_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

/// Price and greeks from a single pass over `d1`/`d2`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricedOption {
    pub price: f64,
    pub greeks: Greeks,
}

/// Black-Scholes calculator bound to a rate and dividend-yield pair.
#[derive(Debug, Clone, Copy)]
pub struct BlackScholes {
    /// Risk-free interest rate (continuously compounded).
    pub rate: f64,
    /// Continuous dividend yield.
    pub dividend: f64,
}

impl Default for BlackScholes {
    fn default() -> Self {
        Self {
            rate: 0.05,
            dividend: 0.01,
        }
    }
}

impl BlackScholes {
    pub fn new(rate: f64, dividend: f64) -> Self {
        Self { rate, dividend }
    }

    fn clamp_inputs(time: f64, vol: f64) -> (f64, f64) {
        (time.max(MIN_TIME), vol.clamp(MIN_VOL, MAX_VOL))
    }

    fn d1(&self, spot: f64, strike: f64, time: f64, vol: f64) -> f64 {
        let numerator =
            (spot / strike).ln() + (self.rate - self.dividend + 0.5 * vol * vol) * time;
        numerator / (vol * time.sqrt())
    }

    /// Option price; zero when spot, strike, or vol is non-positive.
    pub fn price(&self, spot: f64, strike: f64, time: f64, vol: f64, opt_type: OptionType) -> f64 {
        if spot <= 0.0 || strike <= 0.0 || vol <= 0.0 {
            return 0.0;
        }
        let (time, vol) = Self::clamp_inputs(time, vol);
        let d1 = self.d1(spot, strike, time, vol);
        let d2 = d1 - vol * time.sqrt();
        let disc_q = (-self.dividend * time).exp();
        let disc_r = (-self.rate * time).exp();

        match opt_type {
            OptionType::Call => spot * disc_q * norm_cdf(d1) - strike * disc_r * norm_cdf(d2),
            OptionType::Put => strike * disc_r * norm_cdf(-d2) - spot * disc_q * norm_cdf(-d1),
        }
    }

    pub fn call_price(&self, spot: f64, strike: f64, time: f64, vol: f64) -> f64 {
        self.price(spot, strike, time, vol, OptionType::Call)
    }

    pub fn put_price(&self, spot: f64, strike: f64, time: f64, vol: f64) -> f64 {
        self.price(spot, strike, time, vol, OptionType::Put)
    }

    /// Price and all greeks sharing one `d1`/`d2` evaluation.
    pub fn price_and_greeks(
        &self,
        spot: f64,
        strike: f64,
        time: f64,
        vol: f64,
        opt_type: OptionType,
    ) -> PricedOption {
        if spot <= 0.0 || strike <= 0.0 || vol <= 0.0 {
            return PricedOption {
                price: 0.0,
                greeks: Greeks::ZERO,
            };
        }
        let (time, vol) = Self::clamp_inputs(time, vol);
        let sqrt_t = time.sqrt();
        let d1 = self.d1(spot, strike, time, vol);
        let d2 = d1 - vol * sqrt_t;
        let disc_q = (-self.dividend * time).exp();
        let disc_r = (-self.rate * time).exp();
        let nd1 = norm_cdf(d1);
        let nd2 = norm_cdf(d2);
        let pdf_d1 = norm_pdf(d1);

        let (price, delta) = match opt_type {
            OptionType::Call => (
                spot * disc_q * nd1 - strike * disc_r * nd2,
                disc_q * nd1,
            ),
            OptionType::Put => (
                strike * disc_r * (1.0 - nd2) - spot * disc_q * (1.0 - nd1),
                disc_q * (nd1 - 1.0),
            ),
        };

        let gamma = disc_q * pdf_d1 / (spot * vol * sqrt_t);
        let vega = spot * disc_q * pdf_d1 * sqrt_t / 100.0;

        let decay = -spot * disc_q * pdf_d1 * vol / (2.0 * sqrt_t);
        let (theta_year, rho) = match opt_type {
            OptionType::Call => (
                decay + self.dividend * spot * disc_q * nd1 - self.rate * strike * disc_r * nd2,
                time * strike * disc_r * nd2 / 100.0,
            ),
            OptionType::Put => (
                decay - self.dividend * spot * disc_q * (1.0 - nd1)
                    + self.rate * strike * disc_r * (1.0 - nd2),
                -time * strike * disc_r * (1.0 - nd2) / 100.0,
            ),
        };

        PricedOption {
            price,
            greeks: Greeks::new(delta, gamma, theta_year / DAYS_PER_YEAR, vega, rho),
        }
    }

    pub fn delta(&self, spot: f64, strike: f64, time: f64, vol: f64, opt_type: OptionType) -> f64 {
        self.price_and_greeks(spot, strike, time, vol, opt_type)
            .greeks
            .delta
    }

    pub fn gamma(&self, spot: f64, strike: f64, time: f64, vol: f64) -> f64 {
        self.price_and_greeks(spot, strike, time, vol, OptionType::Call)
            .greeks
            .gamma
    }

    pub fn theta(&self, spot: f64, strike: f64, time: f64, vol: f64, opt_type: OptionType) -> f64 {
        self.price_and_greeks(spot, strike, time, vol, opt_type)
            .greeks
            .theta
    }

    /// Vega per 1% change in volatility.
    pub fn vega(&self, spot: f64, strike: f64, time: f64, vol: f64) -> f64 {
        self.price_and_greeks(spot, strike, time, vol, OptionType::Call)
            .greeks
            .vega
    }

    pub fn rho(&self, spot: f64, strike: f64, time: f64, vol: f64, opt_type: OptionType) -> f64 {
        self.price_and_greeks(spot, strike, time, vol, opt_type)
            .greeks
            .rho
    }

    /// Raw dPrice/dVol, unscaled. Used by the implied-vol solver.
    pub(crate) fn vega_raw(&self, spot: f64, strike: f64, time: f64, vol: f64) -> f64 {
        let (time, vol) = Self::clamp_inputs(time, vol);
        let d1 = self.d1(spot, strike, time, vol);
        spot * (-self.dividend * time).exp() * norm_pdf(d1) * time.sqrt()
    }

    /// Put-call parity residual: `(C - P) - (S·e^{-qT} - K·e^{-rT})`.
    pub fn parity_gap(&self, spot: f64, strike: f64, time: f64, vol: f64) -> f64 {
        let (time_c, _) = Self::clamp_inputs(time, vol);
        let call = self.call_price(spot, strike, time, vol);
        let put = self.put_price(spot, strike, time, vol);
        let forward =
            spot * (-self.dividend * time_c).exp() - strike * (-self.rate * time_c).exp();
        (call - put) - forward
    }

    /// Intrinsic value under forward discounting; the lowest arbitrage-free
    /// price for a European option.
    pub fn discounted_intrinsic(
        &self,
        spot: f64,
        strike: f64,
        time: f64,
        opt_type: OptionType,
    ) -> f64 {
        let time = time.max(MIN_TIME);
        let fwd_spot = spot * (-self.dividend * time).exp();
        let fwd_strike = strike * (-self.rate * time).exp();
        match opt_type {
            OptionType::Call => (fwd_spot - fwd_strike).max(0.0),
            OptionType::Put => (fwd_strike - fwd_spot).max(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_atm_call_price() {
        let bs = BlackScholes::new(0.05, 0.0);
        let price = bs.call_price(100.0, 100.0, 1.0, 0.20);
        // Expected ~10.45 for the classic ATM fixture.
        assert!(price > 9.0 && price < 12.0);
    }

    #[test]
    fn test_reference_fixture() {
        // S=100, K=105, T=0.25, vol=0.2, r=0.05, q=0.01.
        let bs = BlackScholes::new(0.05, 0.01);
        let call = bs.price_and_greeks(100.0, 105.0, 0.25, 0.2, OptionType::Call);
        let put = bs.price_and_greeks(100.0, 105.0, 0.25, 0.2, OptionType::Put);

        assert!(call.price > 0.0);
        assert!(put.price > 0.0);
        assert!(call.greeks.delta > 0.0 && call.greeks.delta < 1.0);
        assert!(put.greeks.delta > -1.0 && put.greeks.delta < 0.0);
        assert!(call.greeks.gamma > 0.0);
        assert!(call.greeks.vega > 0.0);
        assert!(call.greeks.theta < 0.0);

        let parity = bs.parity_gap(100.0, 105.0, 0.25, 0.2);
        assert!(parity.abs() < 1e-6);
    }

    #[test]
    fn test_put_call_parity_sweep() {
        for &(rate, dividend) in &[(-0.1, 0.0), (0.0, 0.0), (0.05, 0.01), (0.3, 0.3)] {
            let bs = BlackScholes::new(rate, dividend);
            for &spot in &[1.0, 37.5, 100.0, 2500.0, 1e4] {
                for &strike in &[1.0, 80.0, 100.0, 120.0, 1e4] {
                    for &time in &[1e-4, 0.1, 1.0, 5.0] {
                        for &vol in &[0.01, 0.2, 0.8, 2.0] {
                            let gap = bs.parity_gap(spot, strike, time, vol);
                            assert!(
                                gap.abs() < 1e-6,
                                "parity {gap} at S={spot} K={strike} T={time} v={vol} r={rate} q={dividend}"
                            );
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_greek_signs() {
        let bs = BlackScholes::new(0.05, 0.01);
        for &strike in &[80.0, 100.0, 125.0] {
            for &time in &[0.05, 0.5, 2.0] {
                let call = bs.delta(100.0, strike, time, 0.25, OptionType::Call);
                let put = bs.delta(100.0, strike, time, 0.25, OptionType::Put);
                assert!((0.0..=1.0).contains(&call));
                assert!((-1.0..=0.0).contains(&put));
                assert!(bs.gamma(100.0, strike, time, 0.25) >= 0.0);
                assert!(bs.vega(100.0, strike, time, 0.25) >= 0.0);
                assert!(bs.theta(100.0, strike, time, 0.25, OptionType::Call) <= 0.0);
            }
        }
    }

    #[test]
    fn test_single_pass_matches_individual() {
        let bs = BlackScholes::new(0.03, 0.02);
        for &opt_type in &[OptionType::Call, OptionType::Put] {
            for &strike in &[90.0, 100.0, 110.0] {
                let batch = bs.price_and_greeks(100.0, strike, 0.4, 0.3, opt_type);
                assert_relative_eq!(
                    batch.greeks.delta,
                    bs.delta(100.0, strike, 0.4, 0.3, opt_type),
                    epsilon = 1e-9
                );
                assert_relative_eq!(
                    batch.greeks.gamma,
                    bs.gamma(100.0, strike, 0.4, 0.3),
                    epsilon = 1e-9
                );
                assert_relative_eq!(
                    batch.greeks.theta,
                    bs.theta(100.0, strike, 0.4, 0.3, opt_type),
                    epsilon = 1e-9
                );
                assert_relative_eq!(
                    batch.greeks.vega,
                    bs.vega(100.0, strike, 0.4, 0.3),
                    epsilon = 1e-9
                );
                assert_relative_eq!(
                    batch.greeks.rho,
                    bs.rho(100.0, strike, 0.4, 0.3, opt_type),
                    epsilon = 1e-9
                );
                assert_relative_eq!(
                    batch.price,
                    bs.price(100.0, strike, 0.4, 0.3, opt_type),
                    epsilon = 1e-9
                );
            }
        }
    }

    #[test]
    fn test_degenerate_inputs_price_zero() {
        let bs = BlackScholes::default();
        assert_eq!(bs.call_price(0.0, 100.0, 1.0, 0.2), 0.0);
        assert_eq!(bs.call_price(100.0, 0.0, 1.0, 0.2), 0.0);
        assert_eq!(bs.call_price(100.0, 100.0, 1.0, 0.0), 0.0);
        assert_eq!(bs.put_price(-5.0, 100.0, 1.0, 0.2), 0.0);
    }

    #[test]
    fn test_cdf_tails() {
        assert_eq!(norm_cdf(6.5), 1.0);
        assert_eq!(norm_cdf(-6.5), 0.0);
        assert_relative_eq!(norm_cdf(0.0), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_discounted_intrinsic() {
        let bs = BlackScholes::new(0.05, 0.0);
        let call = bs.discounted_intrinsic(120.0, 100.0, 1.0, OptionType::Call);
        assert!(call > 19.0 && call < 25.1);
        let otm = bs.discounted_intrinsic(80.0, 100.0, 1.0, OptionType::Call);
        assert_eq!(otm, 0.0);
    }
}
