//! histstack-algorithms: Aggregation, composition and derived panels.
//!
//! This crate turns raw fill results into drawable plots:
//! - **Aggregator** - merges fragments per (region, process) and folds flows
//! - **Compositor** - stack/overlay groups, stack total and uncertainty band
//! - **PanelEngine** - ratios, efficiencies, error bands and custom functions
//! - **Plotter** - books fills, runs them in one batch and drives the rest
//!
#![warn(missing_docs)]

mod aggregate;
mod blueprint;
mod bundle;
mod composite;
mod derive;
mod plotter;

pub use aggregate::{Aggregator, ExpectedProcesses, Fragment, MergedHistograms, ProcessHistograms};
pub use blueprint::AxisRange;
pub use bundle::{PanelOutput, PanelPlot, Plot2D, PlotBundle};
pub use composite::{Composition, Compositor, Layer};
pub use derive::{divide, error_band, Divide, ErrorBand, ErrorRule, FnPanel, PanelEngine};
pub use plotter::{Plotter, RunOutput};
