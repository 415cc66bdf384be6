//! Contract with the external histogram fill engine.
//!
//! Fills are booked lazily and realized together in one batched call, the
//! single fork/join barrier of a run. Nothing reads bin contents before
//! [`FillEngine::run`] returns.

use crate::{Axes, DatasetRef, Histogram, Result};

/// One histogram fill to perform over a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct FillRequest {
    /// Dataset to read.
    pub dataset: DatasetRef,
    /// Row filter expression; empty accepts every row.
    pub selection: String,
    /// Per-row weight expression.
    pub weight: String,
    /// Variable expressions, one per axis.
    pub variables: Vec<String>,
    /// Axes of the resulting histogram.
    pub axes: Axes,
}

/// Handle returned when booking; indexes into the results of
/// [`FillEngine::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FillHandle(pub usize);

/// A lazily evaluated, batch-realized histogram filler.
pub trait FillEngine {
    /// Books a fill without evaluating it.
    ///
    /// # Errors
    /// Returns an error if the request can be rejected up front (for
    /// example an expression that does not compile).
    fn book(&mut self, request: FillRequest) -> Result<FillHandle>;

    /// Realizes every booked fill in one batched pass.
    ///
    /// The result has one entry per booked handle, in handle order. A
    /// failed fill yields an `Err` in its slot without affecting the others.
    fn run(&mut self) -> Vec<Result<Histogram>>;
}
