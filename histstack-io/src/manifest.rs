//! JSON render manifest (`plots.json`).
//!
//! The manifest is the hand-off to an external renderer: every plot bundle
//! of a run with its axis ranges, ordered layers, stack total, uncertainty
//! band and panel outputs.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use histstack_algorithms::{Layer, PanelPlot, Plot2D, PlotBundle, RunOutput};
use histstack_core::{Axes, Binning, Histogram};
use serde::{Deserialize, Serialize};

use crate::Result;

/// File name of the manifest inside the output directory.
pub const MANIFEST_FILE: &str = "plots.json";

const FORMAT_VERSION: &str = "1.0";

/// Serializable histogram: edges plus full slot storage, flow slots included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramRecord {
    pub x_edges: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_edges: Option<Vec<f64>>,
    pub content: Vec<f64>,
    pub variance: Vec<f64>,
}

impl From<&Histogram> for HistogramRecord {
    fn from(hist: &Histogram) -> Self {
        Self {
            x_edges: hist.axes().x().edges().to_vec(),
            y_edges: hist.axes().y().map(|y| y.edges().to_vec()),
            content: hist.content().to_vec(),
            variance: hist.variance().to_vec(),
        }
    }
}

impl HistogramRecord {
    /// Rebuilds the histogram.
    ///
    /// # Errors
    /// Returns an error if the edges are invalid or the slot counts do not
    /// match them.
    pub fn to_histogram(&self) -> Result<Histogram> {
        let x = Binning::variable(self.x_edges.clone())?;
        let axes = match &self.y_edges {
            Some(y) => Axes::Two {
                x,
                y: Binning::variable(y.clone())?,
            },
            None => Axes::One(x),
        };
        Ok(Histogram::from_parts(
            axes,
            self.content.clone(),
            self.variance.clone(),
        )?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerEntry {
    pub process: String,
    pub label: String,
    pub role: String,
    pub color: i32,
    pub error_bars: bool,
    pub histogram: HistogramRecord,
}

impl From<&Layer> for LayerEntry {
    fn from(layer: &Layer) -> Self {
        Self {
            process: layer.template.name.clone(),
            label: layer.template.label.clone(),
            role: layer.template.role.to_string(),
            color: layer.template.color,
            error_bars: layer.template.error_bars,
            histogram: HistogramRecord::from(&layer.histogram),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelElementEntry {
    pub function: String,
    pub inputs: Vec<String>,
    pub role: String,
    pub color: i32,
    pub error_bars: bool,
    /// `None` when the element could not be evaluated.
    pub histogram: Option<HistogramRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceLineEntry {
    pub height: f64,
    pub color: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelEntry {
    pub y_label: String,
    pub y_min: f64,
    pub y_max: f64,
    pub elements: Vec<PanelElementEntry>,
    pub reference_lines: Vec<ReferenceLineEntry>,
}

impl From<&PanelPlot> for PanelEntry {
    fn from(panel: &PanelPlot) -> Self {
        Self {
            y_label: panel.y_label.clone(),
            y_min: panel.y_min,
            y_max: panel.y_max,
            elements: panel
                .outputs
                .iter()
                .map(|output| PanelElementEntry {
                    function: output.function.clone(),
                    inputs: output.inputs.clone(),
                    role: output.role.to_string(),
                    color: output.color,
                    error_bars: output.error_bars,
                    histogram: output.histogram.as_ref().map(HistogramRecord::from),
                })
                .collect(),
            reference_lines: panel
                .reference_lines
                .iter()
                .map(|line| ReferenceLineEntry {
                    height: line.height,
                    color: line.color,
                })
                .collect(),
        }
    }
}

/// One 1D plot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotEntry {
    pub name: String,
    pub histogram: String,
    pub region: String,
    pub x_label: String,
    pub y_label: String,
    pub log_x: bool,
    pub log_y: bool,
    pub x_range: [f64; 2],
    pub y_min: Option<f64>,
    pub y_max: Option<f64>,
    pub stack: Vec<LayerEntry>,
    pub overlay: Vec<LayerEntry>,
    pub stack_total: Option<HistogramRecord>,
    pub stack_uncertainty: Option<HistogramRecord>,
    pub panel: Option<PanelEntry>,
}

impl From<&PlotBundle> for PlotEntry {
    fn from(plot: &PlotBundle) -> Self {
        let composition = &plot.composition;
        Self {
            name: plot.stem(),
            histogram: plot.histogram.clone(),
            region: plot.region.clone(),
            x_label: plot.x_label.clone(),
            y_label: plot.y_label.clone(),
            log_x: plot.log_x,
            log_y: plot.log_y,
            x_range: [plot.range.x_min, plot.range.x_max],
            y_min: plot.range.y_min,
            y_max: plot.range.y_max,
            stack: composition.stack.iter().map(LayerEntry::from).collect(),
            overlay: composition.overlay.iter().map(LayerEntry::from).collect(),
            stack_total: composition.stack_total.as_ref().map(HistogramRecord::from),
            stack_uncertainty: composition
                .stack_uncertainty
                .as_ref()
                .map(HistogramRecord::from),
            panel: plot.panel.as_ref().map(PanelEntry::from),
        }
    }
}

/// One 2D plot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plot2DEntry {
    pub name: String,
    pub histogram: String,
    pub region: String,
    pub process: String,
    pub label: String,
    pub x_label: String,
    pub y_label: String,
    pub z_label: String,
    pub log_scales: [bool; 3],
    pub x_range: [f64; 2],
    pub y_range: [f64; 2],
    pub data: HistogramRecord,
}

impl From<&Plot2D> for Plot2DEntry {
    fn from(plot: &Plot2D) -> Self {
        Self {
            name: plot.stem(),
            histogram: plot.histogram.clone(),
            region: plot.region.clone(),
            process: plot.template.name.clone(),
            label: plot.template.label.clone(),
            x_label: plot.x_label.clone(),
            y_label: plot.y_label.clone(),
            z_label: plot.z_label.clone(),
            log_scales: plot.log_scales,
            x_range: [plot.x_range.0, plot.x_range.1],
            y_range: [plot.y_range.0, plot.y_range.1],
            data: HistogramRecord::from(&plot.data),
        }
    }
}

/// All plots of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: String,
    pub plots: Vec<PlotEntry>,
    pub plots_2d: Vec<Plot2DEntry>,
}

impl Manifest {
    /// Collects the plots of a run.
    #[must_use]
    pub fn from_run(output: &RunOutput) -> Self {
        Self {
            format_version: FORMAT_VERSION.to_string(),
            plots: output.plots.iter().map(PlotEntry::from).collect(),
            plots_2d: output.plots_2d.iter().map(Plot2DEntry::from).collect(),
        }
    }

    /// Writes pretty-printed JSON to `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    /// Reads a manifest back.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
