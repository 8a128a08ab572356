//! Volatility surface with bilinear interpolation in total variance.
//!
//! The grid holds vols on strictly increasing expiry and strike axes.
//! Lookups convert the four corner vols to total variance `v = sigma^2 * tau`
//! (each with its own grid expiry), interpolate bilinearly in variance, and
//! return `sqrt(v / T)` — linear-in-variance interpolation preserves the
//! absence of calendar arbitrage better than interpolating vol directly.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fallback vol when a builder has no usable points at all.
const DEFAULT_VOL: f64 = 0.20;
/// Axis values closer than this collapse to one grid line.
const AXIS_EPS: f64 = 1e-12;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SurfaceError {
    #[error("surface axes must be non-empty")]
    EmptyAxis,

    #[error("surface axis values must be strictly increasing")]
    AxisNotIncreasing,

    #[error("vol matrix is {rows}x{cols}, expected {want_rows}x{want_cols}")]
    ShapeMismatch {
        rows: usize,
        cols: usize,
        want_rows: usize,
        want_cols: usize,
    },

    #[error("vol matrix contains a non-positive or non-finite value")]
    BadVol,
}

/// Immutable rectangular volatility grid.
///
/// Shareable across threads once built; lookups are pure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolSurface {
    /// Expiries in years, strictly increasing.
    expiries: Vec<f64>,
    /// Strikes, strictly increasing.
    strikes: Vec<f64>,
    /// `vols[i][j]` is the vol at `(expiries[i], strikes[j])`.
    vols: Vec<Vec<f64>>,
}

impl VolSurface {
    pub fn new(
        expiries: Vec<f64>,
        strikes: Vec<f64>,
        vols: Vec<Vec<f64>>,
    ) -> Result<Self, SurfaceError> {
        if expiries.is_empty() || strikes.is_empty() {
            return Err(SurfaceError::EmptyAxis);
        }
        if !strictly_increasing(&expiries) || !strictly_increasing(&strikes) {
            return Err(SurfaceError::AxisNotIncreasing);
        }
        if vols.len() != expiries.len() || vols.iter().any(|row| row.len() != strikes.len()) {
            return Err(SurfaceError::ShapeMismatch {
                rows: vols.len(),
                cols: vols.first().map_or(0, |r| r.len()),
                want_rows: expiries.len(),
                want_cols: strikes.len(),
            });
        }
        if vols
            .iter()
            .flatten()
            .any(|v| !v.is_finite() || *v <= 0.0)
        {
            return Err(SurfaceError::BadVol);
        }
        Ok(Self {
            expiries,
            strikes,
            vols,
        })
    }

    /// Flat surface at one vol.
    pub fn flat(vol: f64) -> Self {
        Self {
            expiries: vec![1.0],
            strikes: vec![1.0],
            vols: vec![vec![if vol.is_finite() && vol > 0.0 {
                vol
            } else {
                DEFAULT_VOL
            }]],
        }
    }

    pub fn expiries(&self) -> &[f64] {
        &self.expiries
    }

    pub fn strikes(&self) -> &[f64] {
        &self.strikes
    }

    /// Interpolated vol at `(time, strike)`; NaN for non-positive time.
    pub fn volatility(&self, time: f64, strike: f64) -> f64 {
        if time <= 0.0 || !time.is_finite() || !strike.is_finite() {
            return f64::NAN;
        }
        let (i, wt) = axis_index(&self.expiries, time);
        let (j, wk) = axis_index(&self.strikes, strike);

        // Exact at grid points.
        if wt == 0.0 && wk == 0.0 {
            return self.vols[i][j];
        }

        let i1 = (i + 1).min(self.expiries.len() - 1);
        let j1 = (j + 1).min(self.strikes.len() - 1);

        let var = |row: usize, col: usize| -> f64 {
            let v = self.vols[row][col];
            v * v * self.expiries[row]
        };

        let interpolated = (1.0 - wt) * (1.0 - wk) * var(i, j)
            + wt * (1.0 - wk) * var(i1, j)
            + (1.0 - wt) * wk * var(i, j1)
            + wt * wk * var(i1, j1);

        (interpolated / time).sqrt()
    }
}

fn strictly_increasing(axis: &[f64]) -> bool {
    axis.iter().all(|x| x.is_finite())
        && axis.windows(2).all(|w| w[0] < w[1])
}

/// Clamped bilinear index: the lower grid index and the weight toward the
/// next one.
fn axis_index(axis: &[f64], x: f64) -> (usize, f64) {
    let last = axis.len() - 1;
    if x <= axis[0] || last == 0 {
        return (0, 0.0);
    }
    if x >= axis[last] {
        return (last, 0.0);
    }
    let i = match axis.binary_search_by(|a| a.partial_cmp(&x).expect("finite axis")) {
        Ok(i) => return (i, 0.0),
        Err(i) => i - 1,
    };
    let w = (x - axis[i]) / (axis[i + 1] - axis[i]);
    (i, w)
}

/// Assembles a surface from scattered `(expiry, strike, vol)` observations.
///
/// Unset grid cells are filled from the nearest populated cell by an
/// expanding square search; an empty builder yields a flat 0.20 surface.
#[derive(Debug, Clone, Default)]
pub struct VolSurfaceBuilder {
    points: Vec<(f64, f64, f64)>,
}

impl VolSurfaceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one observation; non-finite or non-positive values are dropped.
    pub fn add_point(&mut self, expiry: f64, strike: f64, vol: f64) -> &mut Self {
        if expiry.is_finite()
            && expiry > 0.0
            && strike.is_finite()
            && strike > 0.0
            && vol.is_finite()
            && vol > 0.0
        {
            self.points.push((expiry, strike, vol));
        }
        self
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn build(self) -> VolSurface {
        if self.points.is_empty() {
            return VolSurface::flat(DEFAULT_VOL);
        }

        let expiries = unique_axis(self.points.iter().map(|p| p.0));
        let strikes = unique_axis(self.points.iter().map(|p| p.1));

        let rows = expiries.len();
        let cols = strikes.len();
        let mut cells: Vec<Vec<Option<f64>>> = vec![vec![None; cols]; rows];
        for (expiry, strike, vol) in &self.points {
            let i = nearest_index(&expiries, *expiry);
            let j = nearest_index(&strikes, *strike);
            cells[i][j] = Some(*vol);
        }

        let vols = fill_nearest(&cells);
        VolSurface {
            expiries,
            strikes,
            vols,
        }
    }
}

fn unique_axis(values: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut axis: Vec<f64> = values.collect();
    axis.sort_by(|a, b| a.partial_cmp(b).expect("finite axis value"));
    axis.dedup_by(|a, b| (*a - *b).abs() <= AXIS_EPS);
    axis
}

fn nearest_index(axis: &[f64], x: f64) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, a) in axis.iter().enumerate() {
        let d = (a - x).abs();
        if d < best_dist {
            best = i;
            best_dist = d;
        }
    }
    best
}

/// Replace unset cells with the nearest set cell, searching outward in
/// Chebyshev rings.
fn fill_nearest(cells: &[Vec<Option<f64>>]) -> Vec<Vec<f64>> {
    let rows = cells.len();
    let cols = cells[0].len();
    let max_radius = rows.max(cols);

    let mut out = vec![vec![DEFAULT_VOL; cols]; rows];
    for (i, row) in cells.iter().enumerate() {
        for (j, cell) in row.iter().enumerate() {
            out[i][j] = match cell {
                Some(v) => *v,
                None => ring_search(cells, i, j, max_radius).unwrap_or(DEFAULT_VOL),
            };
        }
    }
    out
}

fn ring_search(cells: &[Vec<Option<f64>>], i: usize, j: usize, max_radius: usize) -> Option<f64> {
    let rows = cells.len() as i64;
    let cols = cells[0].len() as i64;
    for radius in 1..=max_radius as i64 {
        for di in -radius..=radius {
            for dj in -radius..=radius {
                if di.abs() != radius && dj.abs() != radius {
                    continue; // interior of the ring was already searched
                }
                let (r, c) = (i as i64 + di, j as i64 + dj);
                if r < 0 || c < 0 || r >= rows || c >= cols {
                    continue;
                }
                if let Some(v) = cells[r as usize][c as usize] {
                    return Some(v);
                }
            }
        }
    }
    None
}
