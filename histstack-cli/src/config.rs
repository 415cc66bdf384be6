//! JSON plot configuration.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use histstack_algorithms::{Divide, ErrorBand, Plotter};
use histstack_core::{
    Binning, Diagnostics, FlowFolding, HistogramSpec, NameFilter, Panel, PanelElement,
    PanelFunction, Process, ProcessTemplate, Region, Role, Source,
};
use serde::Deserialize;

use crate::{CliError, Result};

/// Top-level configuration file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlotConfig {
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default = "default_weight")]
    pub weight: String,
    #[serde(default)]
    pub threads: usize,
    #[serde(default)]
    pub regions: Vec<Region>,
    pub processes: Vec<ProcessConfig>,
    pub histograms: Vec<HistogramConfig>,
}

fn default_weight() -> String {
    "1".to_string()
}

fn default_color() -> i32 {
    1
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessConfig {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default = "default_color")]
    pub color: i32,
    #[serde(default = "default_true")]
    pub error_bars: bool,
    pub path: PathBuf,
    pub tree: String,
    #[serde(default)]
    pub weight: Option<String>,
}

fn default_role() -> String {
    "stacked".to_string()
}

/// Uniform (`count`, `low`, `high`) or variable (`edges`) binning.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BinningConfig {
    Uniform { count: usize, low: f64, high: f64 },
    Variable { edges: Vec<f64> },
}

impl BinningConfig {
    fn to_binning(&self) -> Result<Binning> {
        Ok(match self {
            BinningConfig::Uniform { count, low, high } => Binning::uniform(*count, *low, *high)?,
            BinningConfig::Variable { edges } => Binning::variable(edges.clone())?,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(clippy::struct_excessive_bools)]
pub struct HistogramConfig {
    pub name: String,
    pub variable: String,
    pub binning: BinningConfig,
    #[serde(default)]
    pub variable_y: Option<String>,
    #[serde(default)]
    pub binning_y: Option<BinningConfig>,
    #[serde(default)]
    pub x_label: Option<String>,
    #[serde(default)]
    pub y_label: Option<String>,
    #[serde(default)]
    pub z_label: Option<String>,
    #[serde(default)]
    pub y_min: Option<f64>,
    #[serde(default)]
    pub log_x: bool,
    #[serde(default)]
    pub log_y: bool,
    #[serde(default)]
    pub log_z: bool,
    #[serde(default)]
    pub underflow: bool,
    #[serde(default)]
    pub overflow: bool,
    #[serde(default = "default_true")]
    pub error_bars: bool,
    #[serde(default)]
    pub processes: NameFilter,
    #[serde(default)]
    pub panel: Option<PanelConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PanelConfig {
    #[serde(default)]
    pub y_label: String,
    pub y_min: f64,
    pub y_max: f64,
    pub elements: Vec<ElementConfig>,
    #[serde(default)]
    pub reference_lines: Vec<f64>,
    #[serde(default)]
    pub reference_colors: Vec<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ElementConfig {
    pub function: String,
    pub inputs: Vec<String>,
    #[serde(default)]
    pub error_option: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub color: Option<i32>,
    #[serde(default = "default_true")]
    pub error_bars: bool,
}

impl ElementConfig {
    fn to_element(&self) -> Result<PanelElement> {
        let function: Arc<dyn PanelFunction> = match self.function.as_str() {
            "divide" => Arc::new(Divide::with_option(&self.error_option)?),
            "error_band" => Arc::new(ErrorBand),
            other => {
                return Err(CliError::Config(format!("unknown panel function '{other}'")));
            }
        };
        let inputs = self.inputs.iter().map(|s| Source::parse(s)).collect();
        let mut element = PanelElement::new(inputs, function)?.with_error_bars(self.error_bars);
        if let Some(role) = &self.role {
            element = element.with_role(Role::from_str(role)?);
        }
        if let Some(color) = self.color {
            element = element.with_color(color);
        }
        Ok(element)
    }
}

impl PlotConfig {
    /// Reads a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Builds a plotter holding every region, process and histogram.
    pub fn build(&self, diagnostics: Arc<dyn Diagnostics>) -> Result<Plotter> {
        let mut plotter = Plotter::new(&self.weight, diagnostics.clone());
        for region in &self.regions {
            plotter.add_region(region.clone());
        }
        for process in &self.processes {
            plotter.add_process(process.to_process()?);
        }
        for histogram in &self.histograms {
            plotter.add_histogram(histogram.to_spec(diagnostics.as_ref())?);
        }
        Ok(plotter)
    }
}

impl ProcessConfig {
    fn to_process(&self) -> Result<Process> {
        let template = ProcessTemplate::new(&self.name)
            .with_label(self.label.as_deref().unwrap_or(&self.name))
            .with_role(Role::from_str(&self.role)?)
            .with_color(self.color)
            .with_error_bars(self.error_bars);
        let mut process = Process::new(template, &self.path, &self.tree)?;
        if let Some(weight) = &self.weight {
            process = process.with_weight(weight);
        }
        Ok(process)
    }
}

impl HistogramConfig {
    fn to_spec(&self, diagnostics: &dyn Diagnostics) -> Result<HistogramSpec> {
        let x_label = self.x_label.as_deref().unwrap_or(&self.variable);
        let mut spec = match (&self.variable_y, &self.binning_y) {
            (None, None) => {
                HistogramSpec::new(&self.name, &self.variable, self.binning.to_binning()?, x_label)
            }
            (Some(variable_y), Some(binning_y)) => HistogramSpec::new_2d(
                &self.name,
                (self.variable.as_str(), variable_y.as_str()),
                (self.binning.to_binning()?, binning_y.to_binning()?),
                x_label,
                self.y_label.as_deref().unwrap_or(variable_y),
            ),
            _ => {
                return Err(CliError::Config(format!(
                    "histogram '{}': variable_y and binning_y must be given together",
                    self.name
                )));
            }
        };
        if !spec.is_2d() {
            if let Some(label) = &self.y_label {
                spec = spec.with_y_label(label);
            }
        }
        if let Some(label) = &self.z_label {
            spec = spec.with_z_label(label);
        }
        if let Some(y_min) = self.y_min {
            spec = spec.with_y_min(y_min);
        }
        spec = spec
            .with_log_scales(self.log_x, self.log_y, self.log_z)
            .with_folding(FlowFolding {
                underflow: self.underflow,
                overflow: self.overflow,
            })
            .with_error_bars(self.error_bars)
            .with_processes(self.processes.clone());

        if let Some(panel) = &self.panel {
            let mut built = Panel::new(&panel.y_label, panel.y_min, panel.y_max);
            for element in &panel.elements {
                built = built.with_element(element.to_element()?);
            }
            if !panel.reference_lines.is_empty() || !panel.reference_colors.is_empty() {
                built = built.with_reference_lines(
                    &panel.reference_lines,
                    &panel.reference_colors,
                    diagnostics,
                );
            }
            spec = spec.with_panel(built);
        }
        Ok(spec)
    }
}
