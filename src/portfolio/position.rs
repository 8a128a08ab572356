//! A single open position.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::model::greeks::Greeks;
use crate::model::symbol::Symbol;

/// Signed position with running weighted-average entry price.
///
/// A position only exists while its quantity is non-zero; the portfolio
/// drops it the moment the quantity returns to zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: Symbol,
    /// Positive long, negative short.
    pub qty: i64,
    /// Weighted-average execution price of the open lot.
    pub avg_px: Decimal,
    /// Latest mark (last trade or quote mid).
    pub mark_px: Decimal,
    /// Per-unit greeks; aggregated as `qty * greeks` at snapshot time.
    pub greeks: Greeks,
}

impl Position {
    pub fn new(symbol: Symbol, qty: i64, px: Decimal) -> Self {
        Self {
            symbol,
            qty,
            avg_px: px,
            mark_px: px,
            greeks: Greeks::ZERO,
        }
    }

    /// Mark-to-market profit of the open lot.
    pub fn unrealized_pnl(&self) -> Decimal {
        (self.mark_px - self.avg_px) * Decimal::from(self.qty)
    }

    /// `|qty| * mark`.
    pub fn notional(&self) -> Decimal {
        self.mark_px * Decimal::from(self.qty.abs())
    }

    pub fn is_long(&self) -> bool {
        self.qty > 0
    }

    pub fn is_short(&self) -> bool {
        self.qty < 0
    }
}
