//! Axis binning.

use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A fixed or variable-width partition of one axis.
///
/// `n` bins are described by `n + 1` strictly increasing edges. Two extra
/// slots exist outside the edges: underflow `(-inf, edges[0])` at index 0
/// and overflow `[edges[n], +inf)` at index `n + 1`. In-range bins use
/// indices `1..=n`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawBinning", into = "RawBinning"))]
pub struct Binning {
    edges: Vec<f64>,
}

/// Unchecked wire form of [`Binning`].
#[cfg(feature = "serde")]
#[derive(Serialize, Deserialize)]
struct RawBinning {
    edges: Vec<f64>,
}

#[cfg(feature = "serde")]
impl TryFrom<RawBinning> for Binning {
    type Error = Error;

    fn try_from(raw: RawBinning) -> Result<Self> {
        Self::variable(raw.edges)
    }
}

#[cfg(feature = "serde")]
impl From<Binning> for RawBinning {
    fn from(binning: Binning) -> Self {
        Self {
            edges: binning.edges,
        }
    }
}

impl Binning {
    /// Creates `count` equal-width bins over `[low, high)`.
    ///
    /// # Errors
    /// Returns an error if `count` is zero, a bound is not finite, or the
    /// range is too narrow to give strictly increasing edges.
    #[allow(clippy::cast_precision_loss)]
    pub fn uniform(count: usize, low: f64, high: f64) -> Result<Self> {
        if count == 0 {
            return Err(Error::InvalidBinning("bin count must be at least 1".into()));
        }
        if !low.is_finite() || !high.is_finite() || low >= high {
            return Err(Error::InvalidBinning(format!(
                "range [{low}, {high}) is empty or not finite"
            )));
        }
        let width = (high - low) / count as f64;
        let mut edges: Vec<f64> = (0..count).map(|i| low + width * i as f64).collect();
        edges.push(high);
        Self::variable(edges)
    }

    /// Creates a variable-width binning from explicit edges.
    ///
    /// # Errors
    /// Returns an error if fewer than two edges are given or the edges are
    /// not finite and strictly increasing.
    pub fn variable(edges: Vec<f64>) -> Result<Self> {
        if edges.len() < 2 {
            return Err(Error::InvalidBinning(format!(
                "need at least 2 edges, got {}",
                edges.len()
            )));
        }
        if edges.iter().any(|e| !e.is_finite()) {
            return Err(Error::InvalidBinning("edges must be finite".into()));
        }
        if let Some(pos) = edges.windows(2).position(|w| w[0] >= w[1]) {
            return Err(Error::InvalidBinning(format!(
                "edges not strictly increasing at index {}: {} >= {}",
                pos + 1,
                edges[pos],
                edges[pos + 1]
            )));
        }
        Ok(Self { edges })
    }

    /// Number of in-range bins.
    #[must_use]
    #[inline]
    pub fn n_bins(&self) -> usize {
        self.edges.len() - 1
    }

    /// Number of storage slots including underflow and overflow.
    #[must_use]
    #[inline]
    pub fn n_slots(&self) -> usize {
        self.edges.len() + 1
    }

    /// Bin edges (length `n_bins + 1`).
    #[must_use]
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Lower edge of the first bin.
    #[must_use]
    pub fn low(&self) -> f64 {
        self.edges[0]
    }

    /// Upper edge of the last bin.
    #[must_use]
    pub fn high(&self) -> f64 {
        self.edges[self.edges.len() - 1]
    }

    /// Returns the slot index for `x`: 0 for underflow, `n_bins + 1` for
    /// overflow. NaN lands in underflow.
    #[must_use]
    pub fn find_bin(&self, x: f64) -> usize {
        if x.is_nan() || x < self.low() {
            return 0;
        }
        if x >= self.high() {
            return self.n_bins() + 1;
        }
        // First edge strictly greater than x; edges[0] <= x so idx >= 1.
        self.edges.partition_point(|&e| e <= x)
    }

    /// Returns the `[low, high)` bounds of in-range bin `bin` (1-based).
    #[must_use]
    pub fn bin_bounds(&self, bin: usize) -> Option<(f64, f64)> {
        if bin == 0 || bin > self.n_bins() {
            return None;
        }
        Some((self.edges[bin - 1], self.edges[bin]))
    }
}
