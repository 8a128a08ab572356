//! Orders, acknowledgements, and fills.
//!
//! These are value objects copied at component boundaries. Order ids follow
//! the `<PREFIX>_<SYMBOL>_<SEQ>` grammar: the `_`-separated component at
//! index 1 names the instrument for portfolio accounting. OCC option
//! tickers contain no underscore, so option ids parse unambiguously.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::symbol::Symbol;

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// +1 for buys, -1 for sells.
    pub fn sign(&self) -> i64 {
        match self {
            Side::Buy => 1,
            Side::Sell => -1,
        }
    }
}

/// Order pricing type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
}

/// Time-in-force instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good till cancelled.
    Gtc,
    /// Immediate or cancel (partials allowed).
    Ioc,
    /// Fill or kill (all or nothing).
    Fok,
}

/// Lifecycle state of an order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum OrderStatus {
    Pending,
    Accepted,
    Rejected,
    Filled,
    PartiallyFilled,
    Canceled,
}

impl OrderStatus {
    /// Terminal states accept no further transitions or fills.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Rejected | OrderStatus::Filled | OrderStatus::Canceled
        )
    }
}

/// A candidate order produced by a strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Unique per run; see the order-id grammar in the module docs.
    pub order_id: String,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    /// Contracts or shares; always positive, sign comes from `side`.
    pub qty: i64,
    /// Required for limit orders, ignored for market orders.
    pub limit_px: Option<Decimal>,
    pub tif: TimeInForce,
    pub ts_ns: u64,
}

impl Order {
    pub fn market(order_id: String, symbol: Symbol, side: Side, qty: i64, ts_ns: u64) -> Self {
        Self {
            order_id,
            symbol,
            side,
            order_type: OrderType::Market,
            qty,
            limit_px: None,
            tif: TimeInForce::Ioc,
            ts_ns,
        }
    }

    pub fn limit(
        order_id: String,
        symbol: Symbol,
        side: Side,
        qty: i64,
        limit_px: Decimal,
        tif: TimeInForce,
        ts_ns: u64,
    ) -> Self {
        Self {
            order_id,
            symbol,
            side,
            order_type: OrderType::Limit,
            qty,
            limit_px: Some(limit_px),
            tif,
            ts_ns,
        }
    }

    /// Signed quantity: positive for buys, negative for sells.
    pub fn signed_qty(&self) -> i64 {
        self.side.sign() * self.qty
    }

    /// Why this order is malformed, if it is.
    pub fn malformed_reason(&self) -> Option<&'static str> {
        if self.order_id.is_empty() {
            return Some("empty order id");
        }
        if self.qty <= 0 {
            return Some("non-positive quantity");
        }
        if self.order_type == OrderType::Limit {
            match self.limit_px {
                None => return Some("limit order without a limit price"),
                Some(px) if px <= Decimal::ZERO => return Some("non-positive limit price"),
                _ => {}
            }
        }
        None
    }
}

/// Extract the accounting symbol from an order id.
///
/// Ids follow `<PREFIX>_<SYMBOL>_<SEQ>`; the component at index 1 is the
/// instrument.
pub fn accounting_symbol(order_id: &str) -> Option<Symbol> {
    let component = order_id.split('_').nth(1)?;
    Symbol::new(component).ok()
}

/// Exchange acknowledgement of an order transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: String,
    pub exchange_id: u64,
    pub status: OrderStatus,
    pub ts_ns: u64,
    pub reason: Option<String>,
}

impl OrderAck {
    pub fn accepted(order_id: String, exchange_id: u64, ts_ns: u64) -> Self {
        Self {
            order_id,
            exchange_id,
            status: OrderStatus::Accepted,
            ts_ns,
            reason: None,
        }
    }

    pub fn rejected(order_id: String, ts_ns: u64, reason: String) -> Self {
        Self {
            order_id,
            exchange_id: 0,
            status: OrderStatus::Rejected,
            ts_ns,
            reason: Some(reason),
        }
    }
}

/// An execution against an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: String,
    pub exchange_id: u64,
    /// Signed by side: positive for buys, negative for sells.
    pub filled_qty: i64,
    pub fill_px: Decimal,
    /// Residual unfilled quantity, never negative.
    pub leaves_qty: i64,
    pub ts_ns: u64,
    pub commission: Decimal,
}

impl Fill {
    /// The instrument this fill settles against, per the order-id grammar.
    pub fn accounting_symbol(&self) -> Option<Symbol> {
        accounting_symbol(&self.order_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sym(s: &str) -> Symbol {
        Symbol::new(s).unwrap()
    }

    #[test]
    fn test_side_sign() {
        assert_eq!(Side::Buy.sign(), 1);
        assert_eq!(Side::Sell.sign(), -1);
    }

    #[test]
    fn test_terminal_states() {
        assert!(OrderStatus::Rejected.is_terminal());
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Canceled.is_terminal());
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::Accepted.is_terminal());
        assert!(!OrderStatus::PartiallyFilled.is_terminal());
    }

    #[test]
    fn test_accounting_symbol_grammar() {
        assert_eq!(accounting_symbol("CC_SPY_1"), Some(sym("SPY")));
        assert_eq!(
            accounting_symbol("CC_SPY260116C00480000_12"),
            Some(sym("SPY260116C00480000"))
        );
        assert_eq!(accounting_symbol("nodelimiter"), None);
        assert_eq!(accounting_symbol("X__3"), None);
    }

    #[test]
    fn test_malformed_orders() {
        let ok = Order::market("T_SPY_1".into(), sym("SPY"), Side::Buy, 100, 0);
        assert_eq!(ok.malformed_reason(), None);

        let zero_qty = Order::market("T_SPY_2".into(), sym("SPY"), Side::Buy, 0, 0);
        assert_eq!(zero_qty.malformed_reason(), Some("non-positive quantity"));

        let mut bad_limit = Order::limit(
            "T_SPY_3".into(),
            sym("SPY"),
            Side::Sell,
            10,
            dec!(-1),
            TimeInForce::Gtc,
            0,
        );
        assert_eq!(
            bad_limit.malformed_reason(),
            Some("non-positive limit price")
        );
        bad_limit.limit_px = None;
        assert_eq!(
            bad_limit.malformed_reason(),
            Some("limit order without a limit price")
        );
    }

    #[test]
    fn test_signed_qty() {
        let buy = Order::market("T_SPY_1".into(), sym("SPY"), Side::Buy, 100, 0);
        let sell = Order::market("T_SPY_2".into(), sym("SPY"), Side::Sell, 100, 0);
        assert_eq!(buy.signed_qty(), 100);
        assert_eq!(sell.signed_qty(), -100);
    }
}
