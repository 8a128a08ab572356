//! Order execution simulation: the fill model and pre-trade risk checks.

pub mod fill_model;
pub mod risk;

pub use fill_model::{FillConfig, FillModel};
pub use risk::{NotionalRiskFilter, RiskCheck, RiskConfig};
