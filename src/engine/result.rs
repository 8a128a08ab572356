//! Run results and performance reporting.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::order::OrderStatus;
use crate::model::symbol::Symbol;
use crate::portfolio::PortfolioState;

use super::latency::LatencyStats;

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Drained the whole queue.
    Ok,
    /// Stopped at a bucket boundary by the cancellation token.
    Cancelled,
    /// Stopped by a fatal error (strict mode).
    Aborted,
}

/// A problem recorded during the run.
///
/// The first fatal error ends a strict run; everything else is logged and
/// kept here for the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunError {
    pub ts_ns: u64,
    pub fatal: bool,
    pub message: String,
}

/// Throughput and latency summary for a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub backtest_duration: Duration,
    pub events_per_second: f64,
    pub market_data_latency: LatencyStats,
    pub quote_latency: LatencyStats,
    pub fill_latency: LatencyStats,
    pub order_ack_latency: LatencyStats,
    /// Risk check + fill simulation + portfolio application per order.
    pub order_latency: LatencyStats,
    pub fill_counts: BTreeMap<Symbol, u64>,
    pub ack_counts: BTreeMap<OrderStatus, u64>,
}

/// Everything a finished (or cancelled, or aborted) run reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Timestamp of the first processed event; zero for an empty run.
    pub start_ts: u64,
    /// Timestamp of the last processed event; zero for an empty run.
    pub end_ts: u64,
    pub events_processed: u64,
    pub final_portfolio: PortfolioState,
    pub performance: PerformanceSnapshot,
    pub strategy_state: serde_json::Map<String, serde_json::Value>,
    pub duration: Duration,
    pub status: RunStatus,
    pub errors: Vec<RunError>,
}

impl BacktestResult {
    /// Human-readable summary.
    pub fn summary(&self) -> String {
        let total_fills: u64 = self.performance.fill_counts.values().sum();
        format!(
            "Backtest {:?}\n\
             ----------------------------------------\n\
             Events: {} ({:.0} events/s, {:.2?})\n\
             Fills: {}\n\
             Cash: {:.2}\n\
             Realised P&L: {:.2}\n\
             Unrealised P&L: {:.2}\n\
             Open positions: {}\n\
             Order latency p50/p99: {}us / {}us\n\
             Errors: {}",
            self.status,
            self.events_processed,
            self.performance.events_per_second,
            self.duration,
            total_fills,
            self.final_portfolio.cash,
            self.final_portfolio.realized_pnl,
            self.final_portfolio.unrealized_pnl,
            self.final_portfolio.positions.len(),
            self.performance.order_latency.p50,
            self.performance.order_latency.p99,
            self.errors.len(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portfolio::Portfolio;
    use rust_decimal_macros::dec;

    #[test]
    fn test_summary_renders() {
        let result = BacktestResult {
            start_ts: 0,
            end_ts: 0,
            events_processed: 0,
            final_portfolio: Portfolio::new(dec!(100_000)).snapshot(0),
            performance: PerformanceSnapshot {
                backtest_duration: Duration::from_millis(5),
                events_per_second: 0.0,
                market_data_latency: LatencyStats::default(),
                quote_latency: LatencyStats::default(),
                fill_latency: LatencyStats::default(),
                order_ack_latency: LatencyStats::default(),
                order_latency: LatencyStats::default(),
                fill_counts: BTreeMap::new(),
                ack_counts: BTreeMap::new(),
            },
            strategy_state: serde_json::Map::new(),
            duration: Duration::from_millis(5),
            status: RunStatus::Ok,
            errors: vec![],
        };
        let text = result.summary();
        assert!(text.contains("Events: 0"));
        assert!(text.contains("Errors: 0"));
    }
}
