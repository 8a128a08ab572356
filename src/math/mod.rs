//! Options mathematics: pricing, greeks, implied vol, vol surface.
//!
//! Everything here is pure and reentrant; the decimal/float boundary sits
//! at the call sites in the portfolio and strategy layers.

pub mod black_scholes;
pub mod implied_vol;
pub mod surface;

pub use black_scholes::{norm_cdf, norm_pdf, BlackScholes, PricedOption};
pub use implied_vol::implied_vol;
pub use surface::{SurfaceError, VolSurface, VolSurfaceBuilder};
