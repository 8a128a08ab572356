//! Reference covered-call strategy.
//!
//! For each configured underlying: accumulate one lot of stock, then write
//! calls against it, picking the observed contract whose Black-Scholes
//! delta sits inside the configured band with expiry nearest the target.
//! Short calls are bought back when they decay to the profit-take
//! threshold or drift too close to expiry; the next call is written by the
//! regular entry logic on a later event.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::math::black_scholes::BlackScholes;
use crate::math::surface::VolSurface;
use crate::model::contract::{parse_occ, OptionContract, OptionType};
use crate::model::event::{Event, TickKind};
use crate::model::order::{Fill, Order, OrderAck, OrderStatus, Side};
use crate::model::symbol::Symbol;
use crate::portfolio::PortfolioState;

use super::Strategy;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoveredCallConfigError {
    #[error("delta band [{0}, {1}] is invalid: need 0 <= min < max <= 1")]
    BadDeltaBand(f64, f64),

    #[error("target days to expiry must be positive")]
    BadTargetDte,

    #[error("roll DTE {0} must be strictly below target DTE {1}")]
    BadRollDte(u32, u32),

    #[error("roll P&L percent {0} must lie in [0, 100]")]
    BadRollPnl(f64),

    #[error("lot size must be positive")]
    BadLotSize,

    #[error("max positions must be positive")]
    BadMaxPositions,

    #[error("no underlyings configured")]
    NoSymbols,
}

/// Covered-call parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoveredCallConfig {
    /// Acceptable short-call delta band.
    pub min_delta: f64,
    pub max_delta: f64,
    /// Preferred days to expiry for new calls.
    pub target_days_to_expiry: u32,
    /// Buy the short call back at or below this DTE.
    pub roll_at_dte: u32,
    /// Buy the short call back once it has captured this share of the
    /// premium, in percent.
    pub roll_at_pnl_percent: f64,
    /// Shares per written call.
    pub lot_size: i64,
    /// Maximum number of underlyings held at once.
    pub max_positions: usize,
    /// Underlyings traded.
    pub symbols: BTreeSet<Symbol>,
}

impl Default for CoveredCallConfig {
    fn default() -> Self {
        Self {
            min_delta: 0.20,
            max_delta: 0.35,
            target_days_to_expiry: 30,
            roll_at_dte: 7,
            roll_at_pnl_percent: 50.0,
            lot_size: 100,
            max_positions: 5,
            symbols: BTreeSet::new(),
        }
    }
}

impl CoveredCallConfig {
    pub fn validate(&self) -> Result<(), CoveredCallConfigError> {
        if !(0.0..=1.0).contains(&self.min_delta)
            || !(0.0..=1.0).contains(&self.max_delta)
            || self.min_delta >= self.max_delta
        {
            return Err(CoveredCallConfigError::BadDeltaBand(
                self.min_delta,
                self.max_delta,
            ));
        }
        if self.target_days_to_expiry == 0 {
            return Err(CoveredCallConfigError::BadTargetDte);
        }
        if self.roll_at_dte >= self.target_days_to_expiry {
            return Err(CoveredCallConfigError::BadRollDte(
                self.roll_at_dte,
                self.target_days_to_expiry,
            ));
        }
        if !(0.0..=100.0).contains(&self.roll_at_pnl_percent) {
            return Err(CoveredCallConfigError::BadRollPnl(self.roll_at_pnl_percent));
        }
        if self.lot_size <= 0 {
            return Err(CoveredCallConfigError::BadLotSize);
        }
        if self.max_positions == 0 {
            return Err(CoveredCallConfigError::BadMaxPositions);
        }
        if self.symbols.is_empty() {
            return Err(CoveredCallConfigError::NoSymbols);
        }
        Ok(())
    }
}

/// A cached option observation.
#[derive(Debug, Clone, Copy)]
struct ObservedOption {
    contract: OptionContract,
    mid: Decimal,
}

/// An open short call against one underlying.
#[derive(Debug, Clone, Copy)]
struct ShortCall {
    ticker: Symbol,
    contract: OptionContract,
    qty: i64,
    entry_px: Decimal,
}

/// What an in-flight order is trying to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Intent {
    BuyUnderlying(Symbol),
    SellCall(Symbol),
    BuyBackCall(Symbol),
}

/// Covered-call implementation of [`Strategy`].
pub struct CoveredCallStrategy {
    config: CoveredCallConfig,
    bs: BlackScholes,
    surface: VolSurface,
    /// Latest underlying marks.
    spots: HashMap<Symbol, Decimal>,
    /// Observed option quotes per underlying, keyed by ticker. Ordered so
    /// contract selection ties break the same way on every run.
    chains: HashMap<Symbol, BTreeMap<Symbol, ObservedOption>>,
    /// Open short call per underlying.
    short_calls: HashMap<Symbol, ShortCall>,
    /// In-flight orders by id.
    pending: HashMap<String, Intent>,
    next_seq: u64,
    orders_submitted: u64,
    fills_received: u64,
    rejections: u64,
}

impl CoveredCallStrategy {
    pub fn new(config: CoveredCallConfig) -> Result<Self, CoveredCallConfigError> {
        Self::with_surface(config, VolSurface::flat(0.20))
    }

    /// Use an externally built vol surface for delta estimation.
    pub fn with_surface(
        config: CoveredCallConfig,
        surface: VolSurface,
    ) -> Result<Self, CoveredCallConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            bs: BlackScholes::default(),
            surface,
            spots: HashMap::new(),
            chains: HashMap::new(),
            short_calls: HashMap::new(),
            pending: HashMap::new(),
            next_seq: 1,
            orders_submitted: 0,
            fills_received: 0,
            rejections: 0,
        })
    }

    fn next_order_id(&mut self, symbol: Symbol) -> String {
        let id = format!("CC_{}_{}", symbol, self.next_seq);
        self.next_seq += 1;
        id
    }

    /// Fold market observations into the spot and chain caches.
    fn observe(&mut self, event: &Event) {
        match event {
            Event::MarketData(tick) => {
                if self.config.symbols.contains(&tick.symbol) {
                    if tick.kind == TickKind::Trade {
                        self.spots.insert(tick.symbol, tick.price);
                    }
                } else if let Ok(contract) = parse_occ(tick.symbol.as_str()) {
                    if tick.kind == TickKind::Trade
                        && self.config.symbols.contains(&contract.underlying)
                    {
                        self.chains
                            .entry(contract.underlying)
                            .or_default()
                            .insert(
                                tick.symbol,
                                ObservedOption {
                                    contract,
                                    mid: tick.price,
                                },
                            );
                    }
                }
            }
            Event::Quote(quote) => {
                if self.config.symbols.contains(&quote.symbol) {
                    if let Some(mid) = quote.mid() {
                        self.spots.insert(quote.symbol, mid);
                    }
                } else if let Ok(contract) = parse_occ(quote.symbol.as_str()) {
                    if self.config.symbols.contains(&contract.underlying) {
                        if let Some(mid) = quote.mid() {
                            self.chains
                                .entry(contract.underlying)
                                .or_default()
                                .insert(quote.symbol, ObservedOption { contract, mid });
                        }
                    }
                }
            }
            Event::Fill(_) | Event::OrderAck(_) => {}
        }
    }

    fn has_pending_for(&self, underlying: Symbol) -> bool {
        self.pending.values().any(|intent| match intent {
            Intent::BuyUnderlying(s) | Intent::SellCall(s) | Intent::BuyBackCall(s) => {
                *s == underlying
            }
        })
    }

    /// Underlyings currently held or being entered, for the position cap.
    fn entered_positions(&self, portfolio: &PortfolioState) -> usize {
        self.config
            .symbols
            .iter()
            .filter(|s| {
                portfolio.qty(**s) != 0
                    || self
                        .pending
                        .values()
                        .any(|i| matches!(i, Intent::BuyUnderlying(u) if u == *s))
            })
            .count()
    }

    /// Pick the observed call whose delta sits in the band, preferring the
    /// expiry nearest the target DTE.
    fn select_call(&self, underlying: Symbol, spot: Decimal, now_ns: u64) -> Option<Symbol> {
        let chain = self.chains.get(&underlying)?;
        let spot_f = spot.to_f64()?;
        let target = self.config.target_days_to_expiry as i64;

        let mut best: Option<(i64, Symbol)> = None;
        for (ticker, observed) in chain {
            let contract = &observed.contract;
            if contract.option_type != OptionType::Call {
                continue;
            }
            let time = contract.year_fraction(now_ns);
            if time <= 0.0 {
                continue;
            }
            let strike_f = match contract.strike.to_f64() {
                Some(k) if k > 0.0 => k,
                _ => continue,
            };
            let vol = self.surface.volatility(time, strike_f);
            if !vol.is_finite() {
                continue;
            }
            let delta = self
                .bs
                .price_and_greeks(spot_f, strike_f, time, vol, OptionType::Call)
                .greeks
                .delta;
            if delta < self.config.min_delta || delta > self.config.max_delta {
                continue;
            }
            let distance = (contract.dte(now_ns) - target).abs();
            match best {
                Some((best_distance, _)) if best_distance <= distance => {}
                _ => best = Some((distance, *ticker)),
            }
        }
        best.map(|(_, ticker)| ticker)
    }

    /// Roll trigger for an open short call: too close to expiry, or enough
    /// of the premium captured.
    fn should_buy_back(&self, short: &ShortCall, underlying: Symbol, now_ns: u64) -> bool {
        if short.contract.dte(now_ns) <= self.config.roll_at_dte as i64 {
            return true;
        }
        let mid = self
            .chains
            .get(&underlying)
            .and_then(|chain| chain.get(&short.ticker))
            .map(|o| o.mid);
        if let (Some(mid), Some(entry)) = (mid, short.entry_px.to_f64()) {
            if entry > 0.0 {
                let mid = mid.to_f64().unwrap_or(entry);
                let captured_pct = (entry - mid) / entry * 100.0;
                return captured_pct >= self.config.roll_at_pnl_percent;
            }
        }
        false
    }

    fn evaluate(&mut self, now_ns: u64, portfolio: &PortfolioState) -> Vec<Order> {
        let mut orders = Vec::new();
        let underlyings: Vec<Symbol> = self.config.symbols.iter().copied().collect();

        for underlying in underlyings {
            let Some(spot) = self.spots.get(&underlying).copied() else {
                continue;
            };
            if self.has_pending_for(underlying) {
                continue;
            }
            let held = portfolio.qty(underlying);

            if held < self.config.lot_size {
                if self.entered_positions(portfolio) >= self.config.max_positions && held == 0 {
                    continue;
                }
                let qty = self.config.lot_size - held;
                let id = self.next_order_id(underlying);
                debug!(%underlying, qty, "entering underlying lot");
                self.pending
                    .insert(id.clone(), Intent::BuyUnderlying(underlying));
                self.orders_submitted += 1;
                orders.push(Order::market(id, underlying, Side::Buy, qty, now_ns));
                continue;
            }

            if let Some(short) = self.short_calls.get(&underlying).copied() {
                if self.should_buy_back(&short, underlying, now_ns) {
                    let id = self.next_order_id(short.ticker);
                    debug!(ticker = %short.ticker, "buying back short call");
                    self.pending
                        .insert(id.clone(), Intent::BuyBackCall(underlying));
                    self.orders_submitted += 1;
                    orders.push(Order::market(id, short.ticker, Side::Buy, short.qty, now_ns));
                }
                continue;
            }

            if let Some(ticker) = self.select_call(underlying, spot, now_ns) {
                let lots = held / self.config.lot_size;
                if lots <= 0 {
                    continue;
                }
                let id = self.next_order_id(ticker);
                debug!(%ticker, lots, "writing covered call");
                self.pending.insert(id.clone(), Intent::SellCall(underlying));
                self.orders_submitted += 1;
                orders.push(Order::market(id, ticker, Side::Sell, lots, now_ns));
            }
        }

        orders
    }
}

impl Strategy for CoveredCallStrategy {
    fn on_event(&mut self, event: &Event, portfolio: &PortfolioState) -> Vec<Order> {
        self.observe(event);
        match event {
            Event::MarketData(_) | Event::Quote(_) => self.evaluate(event.ts_ns(), portfolio),
            // Execution feedback arrives through on_fill/on_order_ack.
            Event::Fill(_) | Event::OrderAck(_) => Vec::new(),
        }
    }

    fn on_fill(&mut self, fill: &Fill, _portfolio: &PortfolioState) {
        self.fills_received += 1;
        let Some(intent) = self.pending.remove(&fill.order_id) else {
            return;
        };
        match intent {
            Intent::BuyUnderlying(_) => {}
            Intent::SellCall(underlying) => {
                let Some(symbol) = fill.accounting_symbol() else {
                    return;
                };
                if let Ok(contract) = parse_occ(symbol.as_str()) {
                    self.short_calls.insert(
                        underlying,
                        ShortCall {
                            ticker: symbol,
                            contract,
                            qty: fill.filled_qty.abs(),
                            entry_px: fill.fill_px,
                        },
                    );
                }
            }
            Intent::BuyBackCall(underlying) => {
                let remaining = self
                    .short_calls
                    .get(&underlying)
                    .map(|s| s.qty - fill.filled_qty.abs())
                    .unwrap_or(0);
                if remaining <= 0 {
                    self.short_calls.remove(&underlying);
                } else if let Some(short) = self.short_calls.get_mut(&underlying) {
                    short.qty = remaining;
                }
            }
        }
    }

    fn on_order_ack(&mut self, ack: &OrderAck) {
        if ack.status == OrderStatus::Rejected {
            self.rejections += 1;
            self.pending.remove(&ack.order_id);
        }
    }

    fn state(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(
            "orders_submitted".to_string(),
            Value::from(self.orders_submitted),
        );
        map.insert(
            "fills_received".to_string(),
            Value::from(self.fills_received),
        );
        map.insert("rejections".to_string(), Value::from(self.rejections));
        map.insert(
            "open_short_calls".to_string(),
            Value::from(self.short_calls.len()),
        );
        map.insert(
            "tracked_underlyings".to_string(),
            Value::from(self.spots.len()),
        );
        map
    }
}
