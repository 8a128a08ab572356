pub mod engine;
pub mod execution;
pub mod math;
pub mod model;
pub mod portfolio;
pub mod strategy;
pub mod ticklog;

// Re-export commonly used types
pub use engine::{BacktestConfig, BacktestEngine, BacktestResult, CancelToken, RunStatus};
pub use execution::{FillConfig, FillModel, NotionalRiskFilter, RiskCheck, RiskConfig};
pub use math::{implied_vol, BlackScholes, VolSurface, VolSurfaceBuilder};
pub use model::{
    Event, EventKind, Fill, Greeks, MarketTick, OptionContract, OptionType, Order, OrderAck,
    OrderStatus, OrderType, QuoteUpdate, Side, Symbol, TickKind, TimeInForce,
};
pub use portfolio::{Portfolio, PortfolioState, Position};
pub use strategy::{CoveredCallConfig, CoveredCallStrategy, NullStrategy, Strategy};
pub use ticklog::{TickLogReader, TickLogWriter};
