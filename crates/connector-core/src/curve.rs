use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A monotonic, piecewise-linear mapping from source amount to destination amount.
///
/// Points are `(source_amount, destination_amount)` pairs with strictly
/// increasing x and non-decreasing y. Below the first point the curve yields
/// zero; beyond the last point it is clamped to the last y (the hop cannot
/// deliver more than its liquidity).
///
/// On the wire a curve is a JSON array of pairs: `[[0, 0], [100, 200]]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<(f64, f64)>", into = "Vec<(f64, f64)>")]
pub struct LiquidityCurve {
    points: Vec<(f64, f64)>,
}

impl LiquidityCurve {
    /// Create a curve from sampled points, validating monotonicity.
    pub fn new(points: Vec<(f64, f64)>) -> Result<Self, CoreError> {
        let curve = Self { points };
        curve.validate()?;
        Ok(curve)
    }

    /// A straight line through the origin with slope `rate`, defined up to `max_input`.
    pub fn linear(rate: f64, max_input: f64) -> Self {
        Self {
            points: vec![(0.0, 0.0), (max_input, max_input * rate)],
        }
    }

    /// A one-to-one curve, used when source and next-hop ledger coincide.
    pub fn identity(max_input: f64) -> Self {
        Self::linear(1.0, max_input)
    }

    /// The sampled points.
    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    /// Largest source amount the curve is defined for.
    pub fn max_input(&self) -> f64 {
        self.points.last().map_or(0.0, |p| p.0)
    }

    /// Largest destination amount the curve can produce.
    pub fn max_output(&self) -> f64 {
        self.points.last().map_or(0.0, |p| p.1)
    }

    /// Check that points are non-empty, finite, non-negative and monotonic.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.points.is_empty() {
            return Err(CoreError::InvalidCurve("curve has no points".into()));
        }
        for &(x, y) in &self.points {
            if !x.is_finite() || !y.is_finite() || x < 0.0 || y < 0.0 {
                return Err(CoreError::InvalidCurve(format!(
                    "point out of range: ({}, {})",
                    x, y
                )));
            }
        }
        for pair in self.points.windows(2) {
            let ((x0, y0), (x1, y1)) = (pair[0], pair[1]);
            if x1 <= x0 {
                return Err(CoreError::InvalidCurve(format!(
                    "x must be strictly increasing: {} then {}",
                    x0, x1
                )));
            }
            if y1 < y0 {
                return Err(CoreError::InvalidCurve(format!(
                    "y must be non-decreasing: {} then {}",
                    y0, y1
                )));
            }
        }
        Ok(())
    }

    /// Destination amount produced by the source amount `x`.
    pub fn amount_at(&self, x: f64) -> f64 {
        let Some(&(first_x, _)) = self.points.first() else {
            return 0.0;
        };
        if x < first_x {
            return 0.0;
        }
        for pair in self.points.windows(2) {
            let ((x0, y0), (x1, y1)) = (pair[0], pair[1]);
            if x <= x1 {
                return y0 + (x - x0) * (y1 - y0) / (x1 - x0);
            }
        }
        self.max_output()
    }

    /// Smallest source amount that produces at least `y`.
    ///
    /// Returns `None` when `y` is beyond what the curve can deliver.
    pub fn amount_reverse(&self, y: f64) -> Option<f64> {
        let &(first_x, first_y) = self.points.first()?;
        if y > self.max_output() {
            return None;
        }
        if y <= first_y {
            return Some(first_x);
        }
        for pair in self.points.windows(2) {
            let ((x0, y0), (x1, y1)) = (pair[0], pair[1]);
            if y <= y1 {
                if y1 == y0 {
                    return Some(x0);
                }
                return Some(x0 + (y - y0) * (x1 - x0) / (y1 - y0));
            }
        }
        None
    }

    /// Compose two hops: apply `self`, then `next`.
    ///
    /// The result is sampled at every breakpoint of `self` and at every
    /// breakpoint of `next` pulled back into this curve's source domain.
    pub fn join(&self, next: &LiquidityCurve) -> LiquidityCurve {
        let mut xs: Vec<f64> = self.points.iter().map(|p| p.0).collect();
        xs.extend(
            next.points
                .iter()
                .filter_map(|&(nx, _)| self.amount_reverse(nx)),
        );
        xs.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        xs.dedup();

        let points = xs
            .into_iter()
            .map(|x| (x, next.amount_at(self.amount_at(x))))
            .collect();
        LiquidityCurve { points }
    }
}

impl TryFrom<Vec<(f64, f64)>> for LiquidityCurve {
    type Error = CoreError;

    fn try_from(points: Vec<(f64, f64)>) -> Result<Self, Self::Error> {
        Self::new(points)
    }
}

impl From<LiquidityCurve> for Vec<(f64, f64)> {
    fn from(curve: LiquidityCurve) -> Self {
        curve.points
    }
}
