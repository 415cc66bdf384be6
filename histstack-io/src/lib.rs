//! histstack-io: Datasets, batched filling and output for histstack.
//!
//! This crate provides the concrete side of the pipeline contracts:
//! memory-mapped columnar datasets, a selection/weight expression compiler,
//! a parallel [`ColumnarFillEngine`], HDF5 or JSON persistence of merged
//! histograms and the JSON render manifest.
//!

mod dataset;
mod engine;
mod error;
pub mod expr;
pub mod json;
pub mod manifest;
#[cfg(feature = "hdf5")]
pub mod hdf5;

pub use dataset::{write_dataset, Columns, Dataset, MappedFile, Table};
pub use engine::ColumnarFillEngine;
pub use error::{Error, Result};
pub use expr::{BoundExpression, Expression};
#[cfg(feature = "hdf5")]
pub use hdf5::{read_merged_hdf5, Hdf5Sink, MERGED_FILE};
pub use json::{read_merged_json, JsonSink, MERGED_JSON_FILE};
pub use manifest::{HistogramRecord, Manifest, MANIFEST_FILE};
