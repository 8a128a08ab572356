//! Portfolio accounting.
//!
//! Owns cash, the open position set, and realised P&L. Fills mutate the
//! portfolio through weighted-average cost accounting; marks come from
//! ticks and quote mids; snapshots are point-in-time copies with the
//! unrealised/realised split and net greeks.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::event::{MarketTick, QuoteUpdate};
use crate::model::greeks::Greeks;
use crate::model::order::Fill;
use crate::model::symbol::Symbol;

use super::position::Position;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PortfolioError {
    /// The fill's order id does not follow the `<PREFIX>_<SYMBOL>_<SEQ>`
    /// grammar, so no instrument can be charged.
    #[error("order id '{0}' carries no accounting symbol")]
    UnroutableOrderId(String),
}

/// Point-in-time copy of the portfolio handed to strategies and results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioState {
    pub ts_ns: u64,
    pub cash: Decimal,
    pub positions: Vec<Position>,
    pub unrealized_pnl: Decimal,
    pub realized_pnl: Decimal,
    pub net_greeks: Greeks,
}

impl PortfolioState {
    pub fn position(&self, symbol: Symbol) -> Option<&Position> {
        self.positions.iter().find(|p| p.symbol == symbol)
    }

    /// Signed quantity held in `symbol`; zero when flat.
    pub fn qty(&self, symbol: Symbol) -> i64 {
        self.position(symbol).map_or(0, |p| p.qty)
    }

    /// Cash plus mark value of every open position.
    pub fn equity(&self) -> Decimal {
        let marked: Decimal = self
            .positions
            .iter()
            .map(|p| p.mark_px * Decimal::from(p.qty))
            .sum();
        self.cash + marked
    }
}

/// The live, mutable portfolio owned by the simulation kernel.
#[derive(Debug, Clone)]
pub struct Portfolio {
    cash: Decimal,
    positions: HashMap<Symbol, Position>,
    realized_pnl: Decimal,
    last_ts_ns: u64,
}

impl Portfolio {
    pub fn new(initial_cash: Decimal) -> Self {
        Self {
            cash: initial_cash,
            positions: HashMap::with_capacity(64),
            realized_pnl: Decimal::ZERO,
            last_ts_ns: 0,
        }
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    pub fn realized_pnl(&self) -> Decimal {
        self.realized_pnl
    }

    pub fn last_ts_ns(&self) -> u64 {
        self.last_ts_ns
    }

    pub fn position(&self, symbol: Symbol) -> Option<&Position> {
        self.positions.get(&symbol)
    }

    pub fn open_positions(&self) -> usize {
        self.positions.len()
    }

    /// Apply a fill.
    ///
    /// Opens, increases, partially closes, or flips the position named by
    /// the fill's order id. Closing lots realise `(px - avg) * closed_qty`;
    /// cash moves by `-(qty * px) - commission`. Positions whose quantity
    /// returns to zero are dropped.
    pub fn apply_fill(&mut self, fill: &Fill) -> Result<(), PortfolioError> {
        let symbol = fill
            .accounting_symbol()
            .ok_or_else(|| PortfolioError::UnroutableOrderId(fill.order_id.clone()))?;

        let delta_qty = fill.filled_qty;
        let px = fill.fill_px;

        match self.positions.get_mut(&symbol) {
            None => {
                if delta_qty != 0 {
                    self.positions
                        .insert(symbol, Position::new(symbol, delta_qty, px));
                }
            }
            Some(pos) => {
                let q0 = pos.qty;
                let q1 = q0 + delta_qty;
                let same_direction = q0 == 0 || q0.signum() == delta_qty.signum();

                if same_direction {
                    // Open or increase: fold into the weighted average.
                    let total_cost = pos.avg_px * Decimal::from(q0) + px * Decimal::from(delta_qty);
                    pos.avg_px = total_cost / Decimal::from(q1);
                    pos.qty = q1;
                } else if delta_qty.abs() <= q0.abs() {
                    // Partial or full close at the standing average.
                    let closed = -delta_qty; // signed like the closed lots
                    self.realized_pnl += (px - pos.avg_px) * Decimal::from(closed);
                    pos.qty = q1;
                } else {
                    // Flip: close everything, reopen the remainder at px.
                    self.realized_pnl += (px - pos.avg_px) * Decimal::from(q0);
                    pos.qty = q1;
                    pos.avg_px = px;
                }

                pos.mark_px = px;
                if pos.qty == 0 {
                    self.positions.remove(&symbol);
                }
            }
        }

        self.cash -= px * Decimal::from(delta_qty) + fill.commission;
        self.last_ts_ns = self.last_ts_ns.max(fill.ts_ns);
        Ok(())
    }

    /// Mark the tick's symbol at the tick price.
    pub fn update_market_data(&mut self, tick: &MarketTick) {
        if let Some(pos) = self.positions.get_mut(&tick.symbol) {
            pos.mark_px = tick.price;
        }
        self.last_ts_ns = tick.ts_ns;
    }

    /// Mark the quote's symbol at the mid when both sides are present.
    pub fn update_quote(&mut self, quote: &QuoteUpdate) {
        if let Some(mid) = quote.mid() {
            if let Some(pos) = self.positions.get_mut(&quote.symbol) {
                pos.mark_px = mid;
            }
        }
        self.last_ts_ns = quote.ts_ns;
    }

    /// Replace the per-unit greeks attached to a position.
    pub fn update_position_greeks(&mut self, symbol: Symbol, greeks: Greeks) {
        if let Some(pos) = self.positions.get_mut(&symbol) {
            pos.greeks = greeks;
        }
    }

    /// Point-in-time copy with the derived aggregates.
    pub fn snapshot(&self, ts_ns: u64) -> PortfolioState {
        let mut positions: Vec<Position> = self.positions.values().copied().collect();
        positions.sort_by_key(|p| p.symbol);

        let unrealized: Decimal = positions.iter().map(|p| p.unrealized_pnl()).sum();
        let net_greeks = positions
            .iter()
            .fold(Greeks::ZERO, |acc, p| acc + p.greeks * p.qty as f64);

        PortfolioState {
            ts_ns,
            cash: self.cash,
            positions,
            unrealized_pnl: unrealized,
            realized_pnl: self.realized_pnl,
            net_greeks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sym(s: &str) -> Symbol {
        Symbol::new(s).unwrap()
    }

    fn fill(order_id: &str, qty: i64, px: Decimal, commission: Decimal) -> Fill {
        Fill {
            order_id: order_id.to_string(),
            exchange_id: 1,
            filled_qty: qty,
            fill_px: px,
            leaves_qty: 0,
            ts_ns: 1_000,
            commission,
        }
    }

    #[test]
    fn test_open_and_increase_weighted_average() {
        let mut pf = Portfolio::new(dec!(100_000));
        pf.apply_fill(&fill("T_SPY_1", 100, dec!(100.00), dec!(0))).unwrap();
        pf.apply_fill(&fill("T_SPY_2", 100, dec!(102.00), dec!(0))).unwrap();

        let pos = pf.position(sym("SPY")).unwrap();
        assert_eq!(pos.qty, 200);
        assert_eq!(pos.avg_px, dec!(101.00));
        assert_eq!(pf.cash(), dec!(100_000) - dec!(20_200));
        assert_eq!(pf.realized_pnl(), dec!(0));
    }

    #[test]
    fn test_partial_close_realises_pnl() {
        let mut pf = Portfolio::new(dec!(100_000));
        pf.apply_fill(&fill("T_SPY_1", 100, dec!(100.00), dec!(0))).unwrap();
        pf.apply_fill(&fill("T_SPY_2", -40, dec!(105.00), dec!(0))).unwrap();

        let pos = pf.position(sym("SPY")).unwrap();
        assert_eq!(pos.qty, 60);
        // Average price is untouched by closes.
        assert_eq!(pos.avg_px, dec!(100.00));
        assert_eq!(pf.realized_pnl(), dec!(200.00)); // 40 * (105 - 100)
    }

    #[test]
    fn test_full_close_removes_position() {
        let mut pf = Portfolio::new(dec!(100_000));
        pf.apply_fill(&fill("T_SPY_1", 100, dec!(100.00), dec!(0))).unwrap();
        pf.apply_fill(&fill("T_SPY_2", -100, dec!(99.00), dec!(0))).unwrap();

        assert!(pf.position(sym("SPY")).is_none());
        assert_eq!(pf.realized_pnl(), dec!(-100.00));
        assert_eq!(pf.open_positions(), 0);
    }

    #[test]
    fn test_flip_closes_then_reopens() {
        let mut pf = Portfolio::new(dec!(100_000));
        pf.apply_fill(&fill("T_SPY_1", 100, dec!(100.00), dec!(0))).unwrap();
        pf.apply_fill(&fill("T_SPY_2", -150, dec!(110.00), dec!(0))).unwrap();

        let pos = pf.position(sym("SPY")).unwrap();
        assert_eq!(pos.qty, -50);
        assert_eq!(pos.avg_px, dec!(110.00));
        assert_eq!(pf.realized_pnl(), dec!(1_000.00)); // 100 * (110 - 100)
    }

    #[test]
    fn test_short_close_realises_inverse() {
        let mut pf = Portfolio::new(dec!(100_000));
        pf.apply_fill(&fill("T_SPY_1", -100, dec!(100.00), dec!(0))).unwrap();
        pf.apply_fill(&fill("T_SPY_2", 100, dec!(95.00), dec!(0))).unwrap();

        assert!(pf.position(sym("SPY")).is_none());
        assert_eq!(pf.realized_pnl(), dec!(500.00)); // short covered 5 lower
    }

    #[test]
    fn test_cash_conservation_across_fill_sequence() {
        // cash + sum(qty*avg) + realized == initial - commissions, exactly.
        let mut pf = Portfolio::new(dec!(100_000));
        let fills = [
            ("T_SPY_1", 100i64, dec!(100.00)),
            ("T_QQQ_1", -50, dec!(400.00)),
            ("T_SPY_2", 60, dec!(101.50)),
            ("T_SPY_3", -130, dec!(103.25)),
            ("T_QQQ_2", 50, dec!(395.75)),
            ("T_SPY_4", -30, dec!(99.10)),
        ];
        let commission = dec!(0.65);
        let mut total_commission = Decimal::ZERO;
        for (id, qty, px) in fills {
            pf.apply_fill(&fill(id, qty, px, commission)).unwrap();
            total_commission += commission;
        }

        let snap = pf.snapshot(10_000);
        let open_cost: Decimal = snap
            .positions
            .iter()
            .map(|p| p.avg_px * Decimal::from(p.qty))
            .sum();
        assert_eq!(
            snap.cash + open_cost + snap.realized_pnl,
            dec!(100_000) - total_commission
        );
    }

    #[test]
    fn test_marks_and_unrealized() {
        let mut pf = Portfolio::new(dec!(100_000));
        pf.apply_fill(&fill("T_SPY_1", 100, dec!(100.00), dec!(0))).unwrap();

        pf.update_market_data(&MarketTick {
            ts_ns: 2_000,
            symbol: sym("SPY"),
            price: dec!(101.00),
            qty: 10,
            kind: crate::model::event::TickKind::Trade,
        });
        assert_eq!(pf.snapshot(2_000).unrealized_pnl, dec!(100.00));

        pf.update_quote(&QuoteUpdate {
            ts_ns: 3_000,
            symbol: sym("SPY"),
            bid_px: dec!(101.00),
            bid_sz: 10,
            ask_px: dec!(103.00),
            ask_sz: 10,
        });
        // Marked at the mid.
        assert_eq!(pf.snapshot(3_000).unrealized_pnl, dec!(200.00));
        assert_eq!(pf.last_ts_ns(), 3_000);
    }

    #[test]
    fn test_net_greeks_additivity() {
        let mut pf = Portfolio::new(dec!(100_000));
        pf.apply_fill(&fill("T_SPY_1", 200, dec!(100.00), dec!(0))).unwrap();
        pf.apply_fill(&fill("T_QQQ_1", -3, dec!(4.00), dec!(0))).unwrap();

        pf.update_position_greeks(sym("SPY"), Greeks::new(1.0, 0.0, 0.0, 0.0, 0.0));
        pf.update_position_greeks(sym("QQQ"), Greeks::new(0.45, 0.02, -0.03, 0.11, 0.05));

        let snap = pf.snapshot(1);
        let expected = snap
            .positions
            .iter()
            .fold(Greeks::ZERO, |acc, p| acc + p.greeks * p.qty as f64);
        assert_eq!(snap.net_greeks, expected);
        assert!((snap.net_greeks.delta - (200.0 - 3.0 * 0.45)).abs() < 1e-12);
    }

    #[test]
    fn test_unroutable_order_id() {
        let mut pf = Portfolio::new(dec!(100_000));
        let err = pf.apply_fill(&fill("badid", 10, dec!(1.00), dec!(0)));
        assert_eq!(
            err,
            Err(PortfolioError::UnroutableOrderId("badid".to_string()))
        );
        // Nothing was mutated.
        assert_eq!(pf.cash(), dec!(100_000));
        assert_eq!(pf.open_positions(), 0);
    }

    #[test]
    fn test_snapshot_is_sorted_and_stable() {
        let mut pf = Portfolio::new(dec!(100_000));
        pf.apply_fill(&fill("T_QQQ_1", 10, dec!(1.00), dec!(0))).unwrap();
        pf.apply_fill(&fill("T_AAPL_1", 10, dec!(1.00), dec!(0))).unwrap();
        pf.apply_fill(&fill("T_SPY_1", 10, dec!(1.00), dec!(0))).unwrap();

        let snap = pf.snapshot(1);
        let symbols: Vec<String> = snap.positions.iter().map(|p| p.symbol.to_string()).collect();
        assert_eq!(symbols, vec!["AAPL", "QQQ", "SPY"]);
    }
}
