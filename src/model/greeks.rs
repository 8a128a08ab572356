//! Option greeks as a value type.

use std::ops::{Add, AddAssign, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

/// First-order (and gamma) sensitivities of an option position.
///
/// Theta is per calendar day, vega per 1 vol-point, rho per 1 rate-point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Greeks {
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub vega: f64,
    pub rho: f64,
}

impl Greeks {
    pub const ZERO: Greeks = Greeks {
        delta: 0.0,
        gamma: 0.0,
        theta: 0.0,
        vega: 0.0,
        rho: 0.0,
    };

    pub fn new(delta: f64, gamma: f64, theta: f64, vega: f64, rho: f64) -> Self {
        Self {
            delta,
            gamma,
            theta,
            vega,
            rho,
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl Add for Greeks {
    type Output = Greeks;

    fn add(self, rhs: Greeks) -> Greeks {
        Greeks {
            delta: self.delta + rhs.delta,
            gamma: self.gamma + rhs.gamma,
            theta: self.theta + rhs.theta,
            vega: self.vega + rhs.vega,
            rho: self.rho + rhs.rho,
        }
    }
}

impl AddAssign for Greeks {
    fn add_assign(&mut self, rhs: Greeks) {
        *self = *self + rhs;
    }
}

impl Sub for Greeks {
    type Output = Greeks;

    fn sub(self, rhs: Greeks) -> Greeks {
        Greeks {
            delta: self.delta - rhs.delta,
            gamma: self.gamma - rhs.gamma,
            theta: self.theta - rhs.theta,
            vega: self.vega - rhs.vega,
            rho: self.rho - rhs.rho,
        }
    }
}

impl Mul<f64> for Greeks {
    type Output = Greeks;

    fn mul(self, scale: f64) -> Greeks {
        Greeks {
            delta: self.delta * scale,
            gamma: self.gamma * scale,
            theta: self.theta * scale,
            vega: self.vega * scale,
            rho: self.rho * scale,
        }
    }
}

impl Neg for Greeks {
    type Output = Greeks;

    fn neg(self) -> Greeks {
        self * -1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_arithmetic() {
        let a = Greeks::new(0.5, 0.01, -0.05, 0.2, 0.1);
        let b = Greeks::new(-0.3, 0.02, -0.01, 0.1, 0.05);

        let sum = a + b;
        assert_eq!(sum.delta, 0.2);
        assert_eq!(sum.gamma, 0.03);

        let diff = a - b;
        assert_eq!(diff.delta, 0.8);

        let scaled = a * 100.0;
        assert_eq!(scaled.delta, 50.0);
        assert_eq!(scaled.vega, 20.0);
    }

    #[test]
    fn test_zero_identity() {
        let a = Greeks::new(0.5, 0.01, -0.05, 0.2, 0.1);
        assert_eq!(a + Greeks::ZERO, a);
        assert!(Greeks::default().is_zero());
    }
}
