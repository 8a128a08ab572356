//! Core data model: symbols, events, orders, books, greeks, contracts.
//!
//! Everything here is a value object copied at component boundaries; the
//! simulation kernel owns the only mutable state built from these types.

pub mod book;
pub mod contract;
pub mod event;
pub mod greeks;
pub mod order;
pub mod symbol;

pub use book::{BookLevel, BookState, OrderBookSnapshot};
pub use contract::{format_occ, parse_occ, ContractError, OptionContract, OptionType};
pub use event::{Event, EventKind, MarketTick, QuoteUpdate, TickKind};
pub use greeks::Greeks;
pub use order::{
    accounting_symbol, Fill, Order, OrderAck, OrderStatus, OrderType, Side, TimeInForce,
};
pub use symbol::{Symbol, SymbolError, MAX_SYMBOL_LEN};
