//! Simulated order matching against top-of-book state.
//!
//! The model is a pure function of `(order, book)` — nothing rests between
//! calls. Market orders always fill in one step; limit orders fill only
//! when they cross, at the opposite touch, for a quantity bounded by a
//! spread-driven liquidity estimate.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::model::book::BookState;
use crate::model::order::{Fill, Order, OrderType, Side, TimeInForce};

/// Relative-spread clamp for the liquidity estimate.
const MIN_REL_SPREAD: f64 = 0.1;
const MAX_REL_SPREAD: f64 = 2.0;
/// Liquidity numerator: contracts available at the tightest spread.
const LIQUIDITY_SCALE: f64 = 1000.0;
/// Price scale kept on computed fill prices.
const PRICE_DP: u32 = 4;

/// Fill simulation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillConfig {
    /// Flat commission charged per fill event.
    pub commission_per_fill: Decimal,
}

impl Default for FillConfig {
    fn default() -> Self {
        Self {
            commission_per_fill: dec!(0.65),
        }
    }
}

/// Stateless fill simulator.
#[derive(Debug, Clone, Default)]
pub struct FillModel {
    config: FillConfig,
}

impl FillModel {
    pub fn new(config: FillConfig) -> Self {
        Self { config }
    }

    /// Simulate `order` against `book`, appending any fills to `out`.
    ///
    /// The output buffer is caller-owned so the hot path can reuse one
    /// allocation between events. Empty and crossed books produce no
    /// fills; neither is an error.
    pub fn simulate_into(
        &self,
        order: &Order,
        book: &BookState,
        exchange_id: u64,
        ts_ns: u64,
        out: &mut Vec<Fill>,
    ) {
        if book.is_crossed() {
            return;
        }
        match order.order_type {
            OrderType::Market => self.market_fill(order, book, exchange_id, ts_ns, out),
            OrderType::Limit => self.limit_fill(order, book, exchange_id, ts_ns, out),
        }
    }

    /// Convenience wrapper allocating a fresh output vector.
    pub fn simulate(
        &self,
        order: &Order,
        book: &BookState,
        exchange_id: u64,
        ts_ns: u64,
    ) -> Vec<Fill> {
        let mut out = Vec::new();
        self.simulate_into(order, book, exchange_id, ts_ns, &mut out);
        out
    }

    fn market_fill(
        &self,
        order: &Order,
        book: &BookState,
        exchange_id: u64,
        ts_ns: u64,
        out: &mut Vec<Fill>,
    ) {
        // Touch price, or the opposite side cushioned 1% against us.
        let raw_px = match order.side {
            Side::Buy => book
                .best_ask
                .map(|l| l.price)
                .or_else(|| book.best_bid.map(|l| l.price * dec!(1.01))),
            Side::Sell => book
                .best_bid
                .map(|l| l.price)
                .or_else(|| book.best_ask.map(|l| l.price * dec!(0.99))),
        };
        let Some(raw_px) = raw_px else {
            return; // fully empty book
        };

        let px = apply_slippage(raw_px, order.qty, order.side);
        out.push(Fill {
            order_id: order.order_id.clone(),
            exchange_id,
            filled_qty: order.signed_qty(),
            fill_px: px,
            leaves_qty: 0,
            ts_ns,
            commission: self.config.commission_per_fill,
        });
    }

    fn limit_fill(
        &self,
        order: &Order,
        book: &BookState,
        exchange_id: u64,
        ts_ns: u64,
        out: &mut Vec<Fill>,
    ) {
        let Some(limit_px) = order.limit_px else {
            return;
        };
        // Crossing test against the opposite touch.
        let touch = match order.side {
            Side::Buy => match book.best_ask {
                Some(ask) if limit_px >= ask.price => ask.price,
                _ => return,
            },
            Side::Sell => match book.best_bid {
                Some(bid) if limit_px <= bid.price => bid.price,
                _ => return,
            },
        };

        let available = available_liquidity(book);
        let fill_qty = order.qty.min(available);
        if order.tif == TimeInForce::Fok && fill_qty < order.qty {
            return;
        }

        out.push(Fill {
            order_id: order.order_id.clone(),
            exchange_id,
            filled_qty: order.side.sign() * fill_qty,
            fill_px: touch,
            leaves_qty: order.qty - fill_qty,
            ts_ns,
            commission: self.config.commission_per_fill,
        });
    }
}

/// Contracts available to a crossing limit: wide relative spreads choke
/// liquidity down to `LIQUIDITY_SCALE / MAX_REL_SPREAD`, tight ones cap it
/// at `LIQUIDITY_SCALE / MIN_REL_SPREAD`.
fn available_liquidity(book: &BookState) -> i64 {
    let rel_spread = match (book.best_bid, book.spread()) {
        (Some(bid), Some(spread)) if bid.price > Decimal::ZERO => {
            let bid_f = bid.price.to_f64().unwrap_or(f64::MAX);
            let spread_f = spread.to_f64().unwrap_or(0.0);
            (spread_f / bid_f).clamp(MIN_REL_SPREAD, MAX_REL_SPREAD)
        }
        // One-sided books get the most pessimistic clamp.
        _ => MAX_REL_SPREAD,
    };
    ((LIQUIDITY_SCALE / rel_spread) as i64).max(1)
}

/// Size-dependent slippage: `1 + |qty|/10_000 * 1e-4`, multiplied into buy
/// prices and divided out of sell prices.
fn apply_slippage(px: Decimal, qty: i64, side: Side) -> Decimal {
    let factor = 1.0 + qty.abs() as f64 / 10_000.0 * 1e-4;
    let factor = Decimal::from_f64_retain(factor).unwrap_or(Decimal::ONE);
    let adjusted = match side {
        Side::Buy => px * factor,
        Side::Sell => px / factor,
    };
    adjusted.round_dp(PRICE_DP)
}
