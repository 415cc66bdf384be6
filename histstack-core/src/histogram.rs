//! Runtime weighted histograms.
//!
//! A [`Histogram`] stores a content and a variance (sum of squared weights)
//! per storage slot. Slots include the underflow and overflow positions of
//! every axis, so a 1D histogram with `n` bins holds `n + 2` slots and a 2D
//! histogram holds `(nx + 2) * (ny + 2)` slots laid out row by row:
//! `slot = ybin * (nx + 2) + xbin`.

use crate::{Binning, Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Axis layout of a histogram.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Axes {
    /// One-dimensional.
    One(Binning),
    /// Two-dimensional.
    Two { x: Binning, y: Binning },
}

impl Axes {
    /// Number of storage slots, flow slots included.
    #[must_use]
    pub fn n_slots(&self) -> usize {
        match self {
            Axes::One(x) => x.n_slots(),
            Axes::Two { x, y } => x.n_slots() * y.n_slots(),
        }
    }

    /// The x axis.
    #[must_use]
    pub fn x(&self) -> &Binning {
        match self {
            Axes::One(x) | Axes::Two { x, .. } => x,
        }
    }

    /// The y axis, for 2D histograms.
    #[must_use]
    pub fn y(&self) -> Option<&Binning> {
        match self {
            Axes::One(_) => None,
            Axes::Two { y, .. } => Some(y),
        }
    }
}

/// Which flow slots to fold into the edge bins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FlowFolding {
    /// Fold underflow into the first bin.
    pub underflow: bool,
    /// Fold overflow into the last bin.
    pub overflow: bool,
}

impl FlowFolding {
    /// Folds both flow slots.
    #[must_use]
    pub fn both() -> Self {
        Self {
            underflow: true,
            overflow: true,
        }
    }

    /// Returns true if nothing is folded.
    #[must_use]
    pub fn is_none(&self) -> bool {
        !self.underflow && !self.overflow
    }
}

/// A weighted histogram with per-slot content and variance.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawHistogram", into = "RawHistogram"))]
pub struct Histogram {
    axes: Axes,
    content: Vec<f64>,
    variance: Vec<f64>,
}

/// Unchecked wire form of [`Histogram`].
#[cfg(feature = "serde")]
#[derive(Serialize, Deserialize)]
struct RawHistogram {
    axes: Axes,
    content: Vec<f64>,
    variance: Vec<f64>,
}

#[cfg(feature = "serde")]
impl TryFrom<RawHistogram> for Histogram {
    type Error = Error;

    fn try_from(raw: RawHistogram) -> Result<Self> {
        Self::from_parts(raw.axes, raw.content, raw.variance)
    }
}

#[cfg(feature = "serde")]
impl From<Histogram> for RawHistogram {
    fn from(hist: Histogram) -> Self {
        Self {
            axes: hist.axes,
            content: hist.content,
            variance: hist.variance,
        }
    }
}

impl Histogram {
    /// Creates an empty 1D histogram.
    #[must_use]
    pub fn new(binning: Binning) -> Self {
        Self::with_axes(Axes::One(binning))
    }

    /// Creates an empty 2D histogram.
    #[must_use]
    pub fn new_2d(x: Binning, y: Binning) -> Self {
        Self::with_axes(Axes::Two { x, y })
    }

    /// Creates an empty histogram over the given axes.
    #[must_use]
    pub fn with_axes(axes: Axes) -> Self {
        let slots = axes.n_slots();
        Self {
            axes,
            content: vec![0.0; slots],
            variance: vec![0.0; slots],
        }
    }

    /// Builds a histogram from raw slot arrays.
    ///
    /// # Errors
    /// Returns an error if either array length differs from the slot count.
    pub fn from_parts(axes: Axes, content: Vec<f64>, variance: Vec<f64>) -> Result<Self> {
        let slots = axes.n_slots();
        if content.len() != slots || variance.len() != slots {
            return Err(Error::BinningMismatch(format!(
                "expected {slots} slots, got content {} / variance {}",
                content.len(),
                variance.len()
            )));
        }
        Ok(Self {
            axes,
            content,
            variance,
        })
    }

    /// Builds a 1D histogram from in-range bin values, leaving flow slots empty.
    ///
    /// # Errors
    /// Returns an error if the value counts differ from the bin count.
    pub fn from_bins(binning: Binning, content: &[f64], variance: &[f64]) -> Result<Self> {
        let n = binning.n_bins();
        if content.len() != n || variance.len() != n {
            return Err(Error::BinningMismatch(format!(
                "expected {n} bins, got content {} / variance {}",
                content.len(),
                variance.len()
            )));
        }
        let mut hist = Self::new(binning);
        hist.content[1..=n].copy_from_slice(content);
        hist.variance[1..=n].copy_from_slice(variance);
        Ok(hist)
    }

    /// Returns an empty histogram with the same axes.
    #[must_use]
    pub fn empty_like(&self) -> Self {
        Self::with_axes(self.axes.clone())
    }

    /// Axis layout.
    #[must_use]
    pub fn axes(&self) -> &Axes {
        &self.axes
    }

    /// The x axis binning.
    #[must_use]
    pub fn x_binning(&self) -> &Binning {
        self.axes.x()
    }

    /// Returns true for 2D histograms.
    #[must_use]
    pub fn is_2d(&self) -> bool {
        matches!(self.axes, Axes::Two { .. })
    }

    /// Number of storage slots.
    #[must_use]
    #[inline]
    pub fn n_slots(&self) -> usize {
        self.content.len()
    }

    /// All slot contents.
    #[must_use]
    pub fn content(&self) -> &[f64] {
        &self.content
    }

    /// All slot variances.
    #[must_use]
    pub fn variance(&self) -> &[f64] {
        &self.variance
    }

    /// Content of one slot (0.0 if out of range).
    #[must_use]
    #[inline]
    pub fn bin_content(&self, slot: usize) -> f64 {
        self.content.get(slot).copied().unwrap_or(0.0)
    }

    /// Variance of one slot (0.0 if out of range).
    #[must_use]
    #[inline]
    pub fn bin_variance(&self, slot: usize) -> f64 {
        self.variance.get(slot).copied().unwrap_or(0.0)
    }

    /// Statistical error (square root of the variance) of one slot.
    #[must_use]
    #[inline]
    pub fn bin_error(&self, slot: usize) -> f64 {
        self.bin_variance(slot).sqrt()
    }

    /// Overwrites one slot. Out-of-range slots are ignored.
    #[inline]
    pub fn set_bin(&mut self, slot: usize, content: f64, variance: f64) {
        if slot < self.content.len() {
            self.content[slot] = content;
            self.variance[slot] = variance;
        }
    }

    /// Adds one weighted entry on the x axis.
    ///
    /// For 2D histograms the entry lands in y underflow; use [`Self::fill_2d`].
    pub fn fill(&mut self, x: f64, weight: f64) {
        let slot = self.axes.x().find_bin(x);
        self.accumulate(slot, weight);
    }

    /// Adds one weighted entry at `(x, y)`.
    pub fn fill_2d(&mut self, x: f64, y: f64, weight: f64) {
        let slot = match &self.axes {
            Axes::One(binning) => binning.find_bin(x),
            Axes::Two { x: bx, y: by } => by.find_bin(y) * bx.n_slots() + bx.find_bin(x),
        };
        self.accumulate(slot, weight);
    }

    #[inline]
    fn accumulate(&mut self, slot: usize, weight: f64) {
        self.content[slot] += weight;
        self.variance[slot] += weight * weight;
    }

    /// Returns true if both histograms share the same axes.
    #[must_use]
    pub fn same_binning(&self, other: &Self) -> bool {
        self.axes == other.axes
    }

    /// Adds another histogram slot by slot, contents and variances alike.
    ///
    /// Variances add because contributions are assumed independent.
    ///
    /// # Errors
    /// Returns an error if the axes differ.
    pub fn add(&mut self, other: &Self) -> Result<()> {
        if !self.same_binning(other) {
            return Err(Error::BinningMismatch(format!(
                "cannot add histograms with {} and {} slots or different edges",
                self.n_slots(),
                other.n_slots()
            )));
        }
        for (c, o) in self.content.iter_mut().zip(&other.content) {
            *c += o;
        }
        for (v, o) in self.variance.iter_mut().zip(&other.variance) {
            *v += o;
        }
        Ok(())
    }

    /// Storage slots of the in-range bins, flow slots excluded.
    #[must_use]
    pub fn in_range_slots(&self) -> Vec<usize> {
        match &self.axes {
            Axes::One(x) => (1..=x.n_bins()).collect(),
            Axes::Two { x, y } => {
                let stride = x.n_slots();
                (1..=y.n_bins())
                    .flat_map(|iy| (1..=x.n_bins()).map(move |ix| iy * stride + ix))
                    .collect()
            }
        }
    }

    /// Sum of in-range bin contents.
    #[must_use]
    pub fn integral(&self) -> f64 {
        self.in_range_slots()
            .into_iter()
            .map(|slot| self.content[slot])
            .sum()
    }

    /// Largest in-range bin content.
    #[must_use]
    pub fn maximum(&self) -> f64 {
        self.in_range_slots()
            .into_iter()
            .map(|slot| self.content[slot])
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Moves flow content into the edge bins and zeroes the flow slots.
    ///
    /// Underflow (slot 0) goes into bin 1, overflow (slot `n + 1`) into bin
    /// `n`, content and variance alike. Applying the same folding twice is a
    /// no-op. 2D histograms are left untouched.
    pub fn fold_flows(&mut self, folding: FlowFolding) {
        let n = match &self.axes {
            Axes::One(x) => x.n_bins(),
            Axes::Two { .. } => return,
        };
        if folding.underflow {
            self.content[1] += self.content[0];
            self.variance[1] += self.variance[0];
            self.content[0] = 0.0;
            self.variance[0] = 0.0;
        }
        if folding.overflow {
            self.content[n] += self.content[n + 1];
            self.variance[n] += self.variance[n + 1];
            self.content[n + 1] = 0.0;
            self.variance[n + 1] = 0.0;
        }
    }
}
