//! Pre-trade risk checks.
//!
//! The kernel runs every candidate order through a [`RiskCheck`] before it
//! reaches the fill model. The default filter enforces notional and delta
//! caps; delta-aware strategies can substitute their own implementation.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::model::book::BookState;
use crate::model::order::{Order, Side};
use crate::portfolio::PortfolioState;

/// Risk limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Maximum `|qty| * price` for a single order.
    pub max_order_notional: Decimal,
    /// Maximum projected `|qty'| * price` per position.
    pub max_position_notional: Decimal,
    /// Maximum projected absolute portfolio delta.
    pub max_portfolio_delta: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_order_notional: dec!(250_000),
            max_position_notional: dec!(1_000_000),
            max_portfolio_delta: 50_000.0,
        }
    }
}

/// Pre-trade acceptance predicate.
///
/// `Ok(())` accepts; `Err(reason)` rejects with a human-readable reason.
/// Rejections are a normal outcome, not an error condition.
pub trait RiskCheck {
    fn check(
        &self,
        order: &Order,
        book: &BookState,
        portfolio: &PortfolioState,
    ) -> Result<(), String>;
}

/// Default filter: order notional, projected position notional, and a
/// delta cap with a +/-1-per-unit order-delta estimate.
#[derive(Debug, Clone, Default)]
pub struct NotionalRiskFilter {
    config: RiskConfig,
}

impl NotionalRiskFilter {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    /// Reference price for notional checks: the limit price when present,
    /// else the opposite touch, else the portfolio mark.
    fn reference_price(
        &self,
        order: &Order,
        book: &BookState,
        portfolio: &PortfolioState,
    ) -> Option<Decimal> {
        if let Some(px) = order.limit_px {
            return Some(px);
        }
        let touch = match order.side {
            Side::Buy => book.best_ask,
            Side::Sell => book.best_bid,
        };
        touch
            .map(|l| l.price)
            .or_else(|| portfolio.position(order.symbol).map(|p| p.mark_px))
    }
}

impl RiskCheck for NotionalRiskFilter {
    fn check(
        &self,
        order: &Order,
        book: &BookState,
        portfolio: &PortfolioState,
    ) -> Result<(), String> {
        if let Some(px) = self.reference_price(order, book, portfolio) {
            let order_notional = px * Decimal::from(order.qty);
            if order_notional > self.config.max_order_notional {
                return Err(format!(
                    "order notional {order_notional} exceeds limit {}",
                    self.config.max_order_notional
                ));
            }

            let projected_qty = portfolio.qty(order.symbol) + order.signed_qty();
            let position_notional = px * Decimal::from(projected_qty.abs());
            if position_notional > self.config.max_position_notional {
                return Err(format!(
                    "projected position notional {position_notional} exceeds limit {}",
                    self.config.max_position_notional
                ));
            }
        }

        // Order delta estimate: +1 per unit bought, -1 per unit sold.
        let order_delta = order.signed_qty() as f64;
        let projected_delta = portfolio.net_greeks.delta + order_delta;
        if projected_delta.abs() > self.config.max_portfolio_delta {
            return Err(format!(
                "projected portfolio delta {projected_delta:.1} exceeds cap {:.1}",
                self.config.max_portfolio_delta
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::book::BookLevel;
    use crate::model::symbol::Symbol;
    use crate::portfolio::Portfolio;

    fn sym(s: &str) -> Symbol {
        Symbol::new(s).unwrap()
    }

    fn empty_state() -> PortfolioState {
        Portfolio::new(dec!(100_000)).snapshot(0)
    }

    fn quoted_book(bid: Decimal, ask: Decimal) -> BookState {
        BookState {
            best_bid: Some(BookLevel::new(bid, 1000)),
            best_ask: Some(BookLevel::new(ask, 1000)),
            last_update_ns: 0,
        }
    }

    #[test]
    fn test_order_notional_rejection() {
        let filter = NotionalRiskFilter::new(RiskConfig {
            max_order_notional: dec!(1_000),
            ..Default::default()
        });
        // Buy 100 @ 20 = 2000 notional.
        let order = Order::limit(
            "T_SPY_1".into(),
            sym("SPY"),
            Side::Buy,
            100,
            dec!(20),
            crate::model::order::TimeInForce::Gtc,
            0,
        );
        let err = filter
            .check(&order, &BookState::default(), &empty_state())
            .unwrap_err();
        assert!(err.contains("exceeds"), "reason: {err}");
    }

    #[test]
    fn test_within_limits_accepted() {
        let filter = NotionalRiskFilter::default();
        let order = Order::market("T_SPY_1".into(), sym("SPY"), Side::Buy, 100, 0);
        let book = quoted_book(dec!(99.50), dec!(100.50));
        assert_eq!(filter.check(&order, &book, &empty_state()), Ok(()));
    }

    #[test]
    fn test_position_notional_uses_projection() {
        let filter = NotionalRiskFilter::new(RiskConfig {
            max_order_notional: dec!(1_000_000),
            max_position_notional: dec!(15_000),
            max_portfolio_delta: 1e9,
        });
        let book = quoted_book(dec!(99.00), dec!(100.00));

        let mut pf = Portfolio::new(dec!(100_000));
        pf.apply_fill(&crate::model::order::Fill {
            order_id: "T_SPY_0".into(),
            exchange_id: 1,
            filled_qty: 100,
            fill_px: dec!(100.00),
            leaves_qty: 0,
            ts_ns: 0,
            commission: Decimal::ZERO,
        })
        .unwrap();
        let state = pf.snapshot(0);

        // Existing 100 + 100 more at ~100 = 20_000 projected.
        let order = Order::market("T_SPY_1".into(), sym("SPY"), Side::Buy, 100, 0);
        let err = filter.check(&order, &book, &state).unwrap_err();
        assert!(err.contains("position notional"));

        // Selling reduces the projection and passes.
        let sell = Order::market("T_SPY_2".into(), sym("SPY"), Side::Sell, 50, 0);
        assert_eq!(filter.check(&sell, &book, &state), Ok(()));
    }

    #[test]
    fn test_delta_cap() {
        let filter = NotionalRiskFilter::new(RiskConfig {
            max_order_notional: dec!(1_000_000_000),
            max_position_notional: dec!(1_000_000_000),
            max_portfolio_delta: 150.0,
        });
        let book = quoted_book(dec!(99.00), dec!(100.00));

        let small = Order::market("T_SPY_1".into(), sym("SPY"), Side::Buy, 100, 0);
        assert_eq!(filter.check(&small, &book, &empty_state()), Ok(()));

        let big = Order::market("T_SPY_2".into(), sym("SPY"), Side::Buy, 200, 0);
        let err = filter.check(&big, &book, &empty_state()).unwrap_err();
        assert!(err.contains("delta"));
        assert!(err.contains("exceeds"));
    }

    #[test]
    fn test_market_order_without_any_price_skips_notional() {
        // No book, no position: only the delta cap applies.
        let filter = NotionalRiskFilter::new(RiskConfig {
            max_order_notional: dec!(1),
            max_position_notional: dec!(1),
            max_portfolio_delta: 1e9,
        });
        let order = Order::market("T_SPY_1".into(), sym("SPY"), Side::Buy, 100, 0);
        assert_eq!(
            filter.check(&order, &BookState::default(), &empty_state()),
            Ok(())
        );
    }
}
