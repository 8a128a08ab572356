//! Strategy interface.
//!
//! The kernel owns one strategy for the duration of a run and calls it
//! synchronously: `on_event` for every queued event (returning candidate
//! orders), `on_fill`/`on_order_ack` for executions and acknowledgements,
//! including the ones synthesized while the strategy's own orders are
//! processed. Strategy calls must not block; anything asynchronous has to
//! be cached synchronously at these call sites.

pub mod covered_call;

use serde_json::{Map, Value};

use crate::model::event::Event;
use crate::model::order::{Fill, Order, OrderAck};
use crate::portfolio::PortfolioState;

pub use covered_call::{CoveredCallConfig, CoveredCallStrategy};

/// A trading strategy driven by the simulation kernel.
pub trait Strategy {
    /// Called once per queued event with a fresh portfolio snapshot.
    /// Returned orders are risk-checked and simulated in order.
    fn on_event(&mut self, event: &Event, portfolio: &PortfolioState) -> Vec<Order>;

    /// Called for every fill applied to the portfolio.
    fn on_fill(&mut self, _fill: &Fill, _portfolio: &PortfolioState) {}

    /// Called for every acknowledgement, including synthesized rejections.
    fn on_order_ack(&mut self, _ack: &OrderAck) {}

    /// Opaque state bag folded into the run result.
    fn state(&self) -> Map<String, Value> {
        Map::new()
    }
}

/// Strategy that never trades. Useful for replay-only runs and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStrategy;

impl Strategy for NullStrategy {
    fn on_event(&mut self, _event: &Event, _portfolio: &PortfolioState) -> Vec<Order> {
        Vec::new()
    }
}
