//! Order-book levels, snapshots, and per-symbol top-of-book state.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::event::{MarketTick, QuoteUpdate, TickKind};
use super::symbol::Symbol;

/// One price level; `size == 0` marks the level empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Decimal,
    pub size: i64,
}

impl BookLevel {
    pub fn new(price: Decimal, size: i64) -> Self {
        Self { price, size }
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

/// Point-in-time depth snapshot. Bids descend, asks ascend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub symbol: Symbol,
    pub ts_ns: u64,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

impl OrderBookSnapshot {
    /// Build a snapshot, normalizing level order and dropping empty levels.
    pub fn new(symbol: Symbol, ts_ns: u64, mut bids: Vec<BookLevel>, mut asks: Vec<BookLevel>) -> Self {
        bids.retain(|l| !l.is_empty());
        asks.retain(|l| !l.is_empty());
        bids.sort_by(|a, b| b.price.cmp(&a.price));
        asks.sort_by(|a, b| a.price.cmp(&b.price));
        Self {
            symbol,
            ts_ns,
            bids,
            asks,
        }
    }

    pub fn best_bid(&self) -> Option<BookLevel> {
        self.bids.first().copied()
    }

    pub fn best_ask(&self) -> Option<BookLevel> {
        self.asks.first().copied()
    }
}

/// Live top-of-book state the engine keeps per symbol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BookState {
    pub best_bid: Option<BookLevel>,
    pub best_ask: Option<BookLevel>,
    pub last_update_ns: u64,
}

impl BookState {
    /// Fold a tick in as a synthetic single-level book on the tick's side.
    ///
    /// Trades only move the clock; a `Quote`-kind tick collapses to one
    /// level on both sides.
    pub fn apply_tick(&mut self, tick: &MarketTick) {
        let level = BookLevel::new(tick.price, tick.qty);
        match tick.kind {
            TickKind::Trade => {}
            TickKind::Bid => self.best_bid = Some(level),
            TickKind::Ask => self.best_ask = Some(level),
            TickKind::Quote => {
                self.best_bid = Some(level);
                self.best_ask = Some(level);
            }
        }
        self.last_update_ns = tick.ts_ns;
    }

    /// Overwrite both sides from a quote update.
    pub fn apply_quote(&mut self, quote: &QuoteUpdate) {
        self.best_bid = quote.bid();
        self.best_ask = quote.ask();
        self.last_update_ns = quote.ts_ns;
    }

    /// Overwrite both sides from a depth snapshot's top levels.
    pub fn apply_snapshot(&mut self, snapshot: &OrderBookSnapshot) {
        self.best_bid = snapshot.best_bid();
        self.best_ask = snapshot.best_ask();
        self.last_update_ns = snapshot.ts_ns;
    }

    pub fn mid(&self) -> Option<Decimal> {
        match (self.best_bid, self.best_ask) {
            (Some(b), Some(a)) => Some((b.price + a.price) / Decimal::TWO),
            _ => None,
        }
    }

    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid, self.best_ask) {
            (Some(b), Some(a)) => Some(a.price - b.price),
            _ => None,
        }
    }

    /// A book is crossed when bid exceeds ask; the fill model refuses
    /// such books.
    pub fn is_crossed(&self) -> bool {
        matches!(
            (self.best_bid, self.best_ask),
            (Some(b), Some(a)) if b.price > a.price
        )
    }
}
