//! Engine events.
//!
//! Everything the simulation kernel dispatches is an [`Event`]: external
//! market data and quotes, plus fills and acknowledgements (whether
//! injected or synthesized during dispatch). Events are value objects
//! copied at boundaries.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::book::BookLevel;
use super::order::{Fill, OrderAck};
use super::symbol::Symbol;

/// What a market tick observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TickKind {
    Trade,
    Bid,
    Ask,
    Quote,
}

/// A single market observation. Immutable once produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketTick {
    pub ts_ns: u64,
    pub symbol: Symbol,
    pub price: Decimal,
    pub qty: i64,
    pub kind: TickKind,
}

/// Top-of-book update. A size of zero marks that side empty.
///
/// `bid_px <= ask_px` is expected when both sides are present; a crossed
/// quote is still accepted by the kernel, but the fill model refuses to
/// cross it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuoteUpdate {
    pub ts_ns: u64,
    pub symbol: Symbol,
    pub bid_px: Decimal,
    pub bid_sz: i64,
    pub ask_px: Decimal,
    pub ask_sz: i64,
}

impl QuoteUpdate {
    pub fn bid(&self) -> Option<BookLevel> {
        (self.bid_sz > 0).then(|| BookLevel::new(self.bid_px, self.bid_sz))
    }

    pub fn ask(&self) -> Option<BookLevel> {
        (self.ask_sz > 0).then(|| BookLevel::new(self.ask_px, self.ask_sz))
    }

    pub fn mid(&self) -> Option<Decimal> {
        match (self.bid(), self.ask()) {
            (Some(b), Some(a)) => Some((b.price + a.price) / Decimal::TWO),
            _ => None,
        }
    }
}

/// Event discriminant, also the deterministic tie-break key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKind {
    MarketData,
    Quote,
    Fill,
    OrderAck,
}

impl EventKind {
    /// Dispatch priority within a timestamp bucket: market data and
    /// quotes first, then fills, then acknowledgements.
    pub fn priority(&self) -> u8 {
        match self {
            EventKind::MarketData | EventKind::Quote => 0,
            EventKind::Fill => 1,
            EventKind::OrderAck => 2,
        }
    }
}

/// The discriminated event union dispatched by the kernel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    MarketData(MarketTick),
    Quote(QuoteUpdate),
    Fill(Fill),
    OrderAck(OrderAck),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::MarketData(_) => EventKind::MarketData,
            Event::Quote(_) => EventKind::Quote,
            Event::Fill(_) => EventKind::Fill,
            Event::OrderAck(_) => EventKind::OrderAck,
        }
    }

    pub fn ts_ns(&self) -> u64 {
        match self {
            Event::MarketData(t) => t.ts_ns,
            Event::Quote(q) => q.ts_ns,
            Event::Fill(f) => f.ts_ns,
            Event::OrderAck(a) => a.ts_ns,
        }
    }

    /// Instrument the event refers to, when it names one directly.
    pub fn symbol(&self) -> Option<Symbol> {
        match self {
            Event::MarketData(t) => Some(t.symbol),
            Event::Quote(q) => Some(q.symbol),
            Event::Fill(f) => f.accounting_symbol(),
            Event::OrderAck(_) => None,
        }
    }

    pub fn as_market_data(&self) -> Option<&MarketTick> {
        match self {
            Event::MarketData(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_quote(&self) -> Option<&QuoteUpdate> {
        match self {
            Event::Quote(q) => Some(q),
            _ => None,
        }
    }

    pub fn as_fill(&self) -> Option<&Fill> {
        match self {
            Event::Fill(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_order_ack(&self) -> Option<&OrderAck> {
        match self {
            Event::OrderAck(a) => Some(a),
            _ => None,
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

    fn tick(ts: u64) -> MarketTick {
        MarketTick {
            ts_ns: ts,
            symbol: sym("SPY"),
            price: dec!(100.00),
            qty: 10,
            kind: TickKind::Trade,
        }
    }

    #[test]
    fn test_kind_priority() {
        assert_eq!(EventKind::MarketData.priority(), 0);
        assert_eq!(EventKind::Quote.priority(), 0);
        assert_eq!(EventKind::Fill.priority(), 1);
        assert_eq!(EventKind::OrderAck.priority(), 2);
    }

    #[test]
    fn test_accessors() {
        let ev = Event::MarketData(tick(42));
        assert_eq!(ev.kind(), EventKind::MarketData);
        assert_eq!(ev.ts_ns(), 42);
        assert_eq!(ev.symbol(), Some(sym("SPY")));
        assert!(ev.as_market_data().is_some());
        assert!(ev.as_quote().is_none());
        assert!(ev.as_fill().is_none());
        assert!(ev.as_order_ack().is_none());
    }

    #[test]
    fn test_quote_side_presence() {
        let q = QuoteUpdate {
            ts_ns: 1,
            symbol: sym("SPY"),
            bid_px: dec!(99.50),
            bid_sz: 100,
            ask_px: dec!(100.50),
            ask_sz: 0,
        };
        assert!(q.bid().is_some());
        assert!(q.ask().is_none());
        assert_eq!(q.mid(), None);
    }
}
