//! The simulation kernel.
//!
//! Runs the event loop:
//! 1. Drain the queue bucket by bucket in timestamp order
//! 2. Per event: update books and portfolio marks
//! 3. Snapshot the portfolio and invoke the strategy
//! 4. Route candidate orders through risk, acknowledgement, and the fill
//!    model; feed synthesized fills and acks straight back to the
//!    portfolio and the strategy at the current timestamp
//! 5. Bin per-event latency into per-kind histograms
//! 6. Periodically checkpoint the portfolio snapshot
//!
//! The kernel is single-threaded and single-use: `run()` consumes it.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::execution::fill_model::{FillConfig, FillModel};
use crate::execution::risk::RiskCheck;
use crate::model::book::BookState;
use crate::model::event::{Event, EventKind};
use crate::model::order::{Fill, Order, OrderAck, OrderStatus};
use crate::model::symbol::Symbol;
use crate::portfolio::{Portfolio, PortfolioState};
use crate::strategy::Strategy;

use super::latency::LatencyHistogram;
use super::queue::EventQueue;
use super::result::{BacktestResult, PerformanceSnapshot, RunError, RunStatus};

/// Events between progress log lines.
const PROGRESS_INTERVAL: u64 = 100_000;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Kernel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// Starting cash balance.
    pub initial_cash: Decimal,

    /// Events between checkpoint writes.
    pub checkpoint_interval: u64,

    /// Write portfolio snapshots to `checkpoint_path` during the run.
    pub enable_checkpointing: bool,

    /// Target file for checkpoint snapshots; required when enabled.
    pub checkpoint_path: Option<PathBuf>,

    /// Emit periodic progress logs.
    pub enable_progress_reporting: bool,

    /// Abort on the first bookkeeping violation instead of dropping the
    /// offending event.
    pub strict: bool,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_cash: dec!(100_000),
            checkpoint_interval: 10_000,
            enable_checkpointing: false,
            checkpoint_path: None,
            enable_progress_reporting: false,
            strict: false,
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.initial_cash < Decimal::ZERO {
            return Err(EngineError::InvalidConfig(format!(
                "initial cash {} is negative",
                self.initial_cash
            )));
        }
        if self.checkpoint_interval == 0 {
            return Err(EngineError::InvalidConfig(
                "checkpoint interval must be positive".to_string(),
            ));
        }
        if self.enable_checkpointing && self.checkpoint_path.is_none() {
            return Err(EngineError::InvalidConfig(
                "checkpointing enabled without a checkpoint path".to_string(),
            ));
        }
        Ok(())
    }
}

/// Cooperative cancellation flag, polled at bucket boundaries.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-kind latency histograms plus the order-handling histogram.
#[derive(Debug, Default, Clone, Copy)]
struct LatencyBook {
    market_data: LatencyHistogram,
    quote: LatencyHistogram,
    fill: LatencyHistogram,
    order_ack: LatencyHistogram,
    order: LatencyHistogram,
}

impl LatencyBook {
    fn for_kind(&mut self, kind: EventKind) -> &mut LatencyHistogram {
        match kind {
            EventKind::MarketData => &mut self.market_data,
            EventKind::Quote => &mut self.quote,
            EventKind::Fill => &mut self.fill,
            EventKind::OrderAck => &mut self.order_ack,
        }
    }
}

/// The deterministic event-driven backtesting engine.
pub struct BacktestEngine {
    config: BacktestConfig,
    queue: EventQueue,
    portfolio: Portfolio,
    books: HashMap<Symbol, BookState>,
    /// Last observed status per order id; guards the per-order state
    /// machine.
    order_states: HashMap<String, OrderStatus>,
    strategy: Box<dyn Strategy>,
    risk: Box<dyn RiskCheck>,
    fill_model: FillModel,
    latency: LatencyBook,
    fill_counts: HashMap<Symbol, u64>,
    ack_counts: HashMap<OrderStatus, u64>,
    errors: Vec<RunError>,
    cancel: CancelToken,
    next_exchange_id: u64,
    events_processed: u64,
    start_ts: Option<u64>,
    end_ts: u64,
    /// Reused between orders so the hot path stays allocation-free.
    fill_buf: Vec<Fill>,
}

impl BacktestEngine {
    pub fn new(
        config: BacktestConfig,
        strategy: Box<dyn Strategy>,
        risk: Box<dyn RiskCheck>,
        fill_config: FillConfig,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let portfolio = Portfolio::new(config.initial_cash);
        Ok(Self {
            config,
            queue: EventQueue::new(),
            portfolio,
            books: HashMap::with_capacity(64),
            order_states: HashMap::new(),
            strategy,
            risk,
            fill_model: FillModel::new(fill_config),
            latency: LatencyBook::default(),
            fill_counts: HashMap::new(),
            ack_counts: HashMap::new(),
            errors: Vec::new(),
            cancel: CancelToken::new(),
            next_exchange_id: 1,
            events_processed: 0,
            start_ts: None,
            end_ts: 0,
            fill_buf: Vec::with_capacity(4),
        })
    }

    /// Token for cooperative cancellation; clone and flip from anywhere.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Enqueue an event. Only valid before `run()`.
    pub fn push_event(&mut self, event: Event) {
        self.queue.push(event);
    }

    /// Drain the queue and produce the run result. Consumes the engine.
    pub fn run(mut self) -> BacktestResult {
        let wall_start = Instant::now();
        let queue = std::mem::take(&mut self.queue);
        let total_events = queue.len();
        info!(events = total_events, "starting backtest run");

        let mut status = RunStatus::Ok;

        'buckets: for (ts, bucket) in queue.into_buckets() {
            if self.cancel.is_cancelled() {
                status = RunStatus::Cancelled;
                break 'buckets;
            }
            for event in &bucket {
                let marker = Instant::now();
                let fatal = self.process_queued_event(event, ts);
                let ticks = (marker.elapsed().as_nanos() / 100) as u64;
                self.latency.for_kind(event.kind()).record_ticks(ticks);

                self.events_processed += 1;
                self.start_ts.get_or_insert(ts);
                self.end_ts = ts;

                if self.config.enable_checkpointing
                    && self.events_processed % self.config.checkpoint_interval == 0
                {
                    self.write_checkpoint(ts);
                }
                if self.config.enable_progress_reporting
                    && self.events_processed % PROGRESS_INTERVAL == 0
                {
                    info!(
                        processed = self.events_processed,
                        total = total_events,
                        "backtest progress"
                    );
                }

                if fatal {
                    status = RunStatus::Aborted;
                    break 'buckets;
                }
            }
        }

        self.finish(wall_start, status)
    }

    /// Dispatch one queued event. Returns true when a fatal error must
    /// abort the run.
    fn process_queued_event(&mut self, event: &Event, ts: u64) -> bool {
        if let Err(fatal) = self.apply_event_effects(event, ts) {
            if fatal {
                return true;
            }
            // Non-strict: the event was logged and dropped; the strategy
            // still observes it.
        }

        let snapshot = self.portfolio.snapshot(ts);
        let orders = self.strategy.on_event(event, &snapshot);
        for order in orders {
            if self.handle_order(order, ts) {
                return true;
            }
        }
        false
    }

    /// Book/portfolio/strategy side effects of an event. `Err(true)` is a
    /// fatal bookkeeping violation under strict mode.
    fn apply_event_effects(&mut self, event: &Event, ts: u64) -> Result<(), bool> {
        match event {
            Event::MarketData(tick) => {
                self.books.entry(tick.symbol).or_default().apply_tick(tick);
                self.portfolio.update_market_data(tick);
                Ok(())
            }
            Event::Quote(quote) => {
                self.books
                    .entry(quote.symbol)
                    .or_default()
                    .apply_quote(quote);
                self.portfolio.update_quote(quote);
                Ok(())
            }
            Event::Fill(fill) => self.apply_fill_event(fill, ts),
            Event::OrderAck(ack) => {
                // Externally injected acks advance the order state machine
                // (a queued Canceled ack makes the id terminal).
                self.order_states.insert(ack.order_id.clone(), ack.status);
                self.track_ack(ack);
                self.strategy.on_order_ack(ack);
                Ok(())
            }
        }
    }

    fn apply_fill_event(&mut self, fill: &Fill, ts: u64) -> Result<(), bool> {
        if let Some(state) = self.order_states.get(&fill.order_id) {
            if state.is_terminal() {
                return Err(self.bookkeeping_violation(
                    ts,
                    format!("fill for terminal order '{}'", fill.order_id),
                ));
            }
        }
        if fill.leaves_qty < 0 {
            return Err(self.bookkeeping_violation(
                ts,
                format!(
                    "fill for order '{}' reports negative leaves {}",
                    fill.order_id, fill.leaves_qty
                ),
            ));
        }

        if let Err(err) = self.portfolio.apply_fill(fill) {
            return Err(self.bookkeeping_violation(ts, err.to_string()));
        }

        let next = if fill.leaves_qty == 0 {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        self.order_states.insert(fill.order_id.clone(), next);

        if let Some(symbol) = fill.accounting_symbol() {
            *self.fill_counts.entry(symbol).or_default() += 1;
        }

        let snapshot = self.portfolio.snapshot(ts);
        self.strategy.on_fill(fill, &snapshot);
        Ok(())
    }

    /// Risk-check, acknowledge, and simulate one candidate order.
    /// Returns true when a resulting bookkeeping violation must abort.
    fn handle_order(&mut self, order: Order, ts: u64) -> bool {
        let marker = Instant::now();
        let mut fatal = false;

        // Ids must carry an accounting symbol or the portfolio cannot
        // route the resulting fills.
        let malformed = order.malformed_reason().or_else(|| {
            crate::model::order::accounting_symbol(&order.order_id)
                .is_none()
                .then_some("order id carries no accounting symbol")
        });

        if let Some(reason) = malformed {
            debug!(order_id = %order.order_id, reason, "malformed order");
            let ack = OrderAck::rejected(order.order_id.clone(), ts, "malformed order".to_string());
            self.dispatch_ack(ack);
        } else if self.order_states.contains_key(&order.order_id) {
            let ack = OrderAck::rejected(
                order.order_id.clone(),
                ts,
                "duplicate order id".to_string(),
            );
            self.dispatch_ack(ack);
        } else {
            let book = self.books.get(&order.symbol).copied().unwrap_or_default();
            let snapshot = self.portfolio.snapshot(ts);
            match self.risk.check(&order, &book, &snapshot) {
                Err(reason) => {
                    debug!(order_id = %order.order_id, %reason, "risk rejection");
                    self.order_states
                        .insert(order.order_id.clone(), OrderStatus::Rejected);
                    let ack = OrderAck::rejected(order.order_id.clone(), ts, reason);
                    self.dispatch_ack(ack);
                }
                Ok(()) => {
                    let exchange_id = self.next_exchange_id;
                    self.next_exchange_id += 1;
                    self.order_states
                        .insert(order.order_id.clone(), OrderStatus::Accepted);
                    let ack = OrderAck::accepted(order.order_id.clone(), exchange_id, ts);
                    self.dispatch_ack(ack);

                    let mut fills = std::mem::take(&mut self.fill_buf);
                    fills.clear();
                    self.fill_model
                        .simulate_into(&order, &book, exchange_id, ts, &mut fills);
                    for fill in &fills {
                        // One-step recursion: synthesized fills go through
                        // the same dispatch path as queued ones.
                        if self.apply_fill_event(fill, ts) == Err(true) {
                            fatal = true;
                            break;
                        }
                    }
                    self.fill_buf = fills;
                }
            }
        }

        let ticks = (marker.elapsed().as_nanos() / 100) as u64;
        self.latency.order.record_ticks(ticks);
        fatal
    }

    fn dispatch_ack(&mut self, ack: OrderAck) {
        self.track_ack(&ack);
        self.strategy.on_order_ack(&ack);
    }

    fn track_ack(&mut self, ack: &OrderAck) {
        *self.ack_counts.entry(ack.status).or_default() += 1;
    }

    /// Record a bookkeeping violation; returns true when it must abort.
    fn bookkeeping_violation(&mut self, ts_ns: u64, message: String) -> bool {
        warn!(ts_ns, %message, "bookkeeping violation");
        let fatal = self.config.strict;
        self.errors.push(RunError {
            ts_ns,
            fatal,
            message,
        });
        fatal
    }

    fn write_checkpoint(&mut self, ts: u64) {
        let Some(path) = self.config.checkpoint_path.clone() else {
            return;
        };
        let snapshot = self.portfolio.snapshot(ts);
        let outcome = File::create(&path).and_then(|file| {
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, &snapshot)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
            writer.flush()
        });
        if let Err(err) = outcome {
            // Checkpoint failures never stop the run.
            warn!(path = %path.display(), %err, "checkpoint write failed");
            self.errors.push(RunError {
                ts_ns: ts,
                fatal: false,
                message: format!("checkpoint write failed: {err}"),
            });
        }
    }

    fn finish(self, wall_start: Instant, status: RunStatus) -> BacktestResult {
        let duration = wall_start.elapsed();
        let events_per_second = if duration.as_secs_f64() > 0.0 {
            self.events_processed as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        let performance = PerformanceSnapshot {
            backtest_duration: duration,
            events_per_second,
            market_data_latency: self.latency.market_data.stats(),
            quote_latency: self.latency.quote.stats(),
            fill_latency: self.latency.fill.stats(),
            order_ack_latency: self.latency.order_ack.stats(),
            order_latency: self.latency.order.stats(),
            fill_counts: self.fill_counts.into_iter().collect(),
            ack_counts: self.ack_counts.into_iter().collect(),
        };

        let end_ts = self.end_ts;
        let final_portfolio = self.portfolio.snapshot(end_ts);
        info!(
            events = self.events_processed,
            ?status,
            "backtest run finished"
        );

        BacktestResult {
            start_ts: self.start_ts.unwrap_or(0),
            end_ts,
            events_processed: self.events_processed,
            final_portfolio,
            performance,
            strategy_state: self.strategy.state(),
            duration,
            status,
            errors: self.errors,
        }
    }
}
