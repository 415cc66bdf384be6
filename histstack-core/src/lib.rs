//! histstack-core: Core types for histogram aggregation and composition.
//!
//! This crate provides the building blocks shared by the pipeline:
//! binning, weighted histograms, processes and their draw roles, selection
//! regions, histogram specifications, derived panels, and the contracts with
//! the external fill engine and persistence layer.
//!

pub mod binning;
pub mod diagnostics;
pub mod error;
pub mod fill;
pub mod histogram;
pub mod panel;
pub mod process;
pub mod region;
pub mod registry;
pub mod sink;
pub mod spec;

pub use binning::Binning;
pub use diagnostics::{Diagnostics, Level, LogDiagnostics, Record, RecordingDiagnostics};
pub use error::{Error, Result};
pub use fill::{FillEngine, FillHandle, FillRequest};
pub use histogram::{Axes, FlowFolding, Histogram};
pub use panel::{Panel, PanelElement, PanelFunction, ReferenceLine, Source, STACK_SENTINEL};
pub use process::{DatasetRef, Process, ProcessTemplate, Role};
pub use region::{NameFilter, Region, NOMINAL_REGION};
pub use registry::ProcessRegistry;
pub use sink::{HistogramKey, HistogramSink, MemorySink};
pub use spec::{HistogramSpec, SpecAxes};
