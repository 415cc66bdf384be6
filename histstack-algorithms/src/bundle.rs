//! Plot bundles handed to the renderer.

use histstack_core::{Histogram, ProcessTemplate, ReferenceLine, Role};

use crate::{AxisRange, Composition};

/// One evaluated panel element with its draw settings.
#[derive(Debug, Clone)]
pub struct PanelOutput {
    /// Function name.
    pub function: String,
    /// Input identifiers as declared.
    pub inputs: Vec<String>,
    /// Draw role.
    pub role: Role,
    /// Resolved color token.
    pub color: i32,
    /// Draw error bars.
    pub error_bars: bool,
    /// Result, or `None` if the element failed.
    pub histogram: Option<Histogram>,
}

/// A derived sub-panel ready to draw.
#[derive(Debug, Clone)]
pub struct PanelPlot {
    /// y axis label.
    pub y_label: String,
    /// y axis minimum.
    pub y_min: f64,
    /// y axis maximum.
    pub y_max: f64,
    /// Outputs in declared element order.
    pub outputs: Vec<PanelOutput>,
    /// Horizontal reference lines.
    pub reference_lines: Vec<ReferenceLine>,
}

/// Everything needed to draw one 1D histogram in one region.
#[derive(Debug, Clone)]
pub struct PlotBundle {
    /// Specification name.
    pub histogram: String,
    /// Region name.
    pub region: String,
    /// x axis label.
    pub x_label: String,
    /// y axis label.
    pub y_label: String,
    /// Log-scale x axis.
    pub log_x: bool,
    /// Log-scale y axis.
    pub log_y: bool,
    /// Frame axis ranges.
    pub range: AxisRange,
    /// Stack and overlay groups.
    pub composition: Composition,
    /// Derived sub-panel, if declared.
    pub panel: Option<PanelPlot>,
}

impl PlotBundle {
    /// File stem of the rendered plot, `{histogram}_{region}`.
    #[must_use]
    pub fn stem(&self) -> String {
        format!("{}_{}", self.histogram, self.region)
    }
}

/// One 2D histogram of one process in one region.
#[derive(Debug, Clone)]
pub struct Plot2D {
    /// Specification name.
    pub histogram: String,
    /// Region name.
    pub region: String,
    /// Process template.
    pub template: ProcessTemplate,
    /// x axis label.
    pub x_label: String,
    /// y axis label.
    pub y_label: String,
    /// z axis label.
    pub z_label: String,
    /// Log-scale flags for x, y and z.
    pub log_scales: [bool; 3],
    /// Frame range along x as `(low, high)`.
    pub x_range: (f64, f64),
    /// Frame range along y as `(low, high)`.
    pub y_range: (f64, f64),
    /// Canonical histogram.
    pub data: Histogram,
}

impl Plot2D {
    /// File stem of the rendered plot, `{histogram}_{region}_{process}`.
    #[must_use]
    pub fn stem(&self) -> String {
        format!("{}_{}_{}", self.histogram, self.region, self.template.name)
    }
}
