//! The simulation kernel: event queue, dispatch loop, latency metrics,
//! and run results.

pub mod kernel;
pub mod latency;
pub mod queue;
pub mod result;

pub use kernel::{BacktestConfig, BacktestEngine, CancelToken, EngineError};
pub use latency::{LatencyHistogram, LatencyStats, BUCKET_BOUNDS_US};
pub use queue::EventQueue;
pub use result::{BacktestResult, PerformanceSnapshot, RunError, RunStatus};
