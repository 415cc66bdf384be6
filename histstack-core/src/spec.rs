//! Declarative histogram specifications.

use crate::{Axes, Binning, FlowFolding, Histogram, NameFilter, Panel};

/// Variables and binnings of a histogram specification.
#[derive(Debug, Clone, PartialEq)]
pub enum SpecAxes {
    /// One variable expression.
    One { variable: String, binning: Binning },
    /// Two variable expressions.
    Two {
        variable_x: String,
        variable_y: String,
        binning_x: Binning,
        binning_y: Binning,
    },
}

impl SpecAxes {
    /// Variable expressions in axis order.
    #[must_use]
    pub fn variables(&self) -> Vec<&str> {
        match self {
            SpecAxes::One { variable, .. } => vec![variable.as_str()],
            SpecAxes::Two {
                variable_x,
                variable_y,
                ..
            } => vec![variable_x.as_str(), variable_y.as_str()],
        }
    }

    /// Histogram axes for this specification.
    #[must_use]
    pub fn to_axes(&self) -> Axes {
        match self {
            SpecAxes::One { binning, .. } => Axes::One(binning.clone()),
            SpecAxes::Two {
                binning_x,
                binning_y,
                ..
            } => Axes::Two {
                x: binning_x.clone(),
                y: binning_y.clone(),
            },
        }
    }
}

/// A named histogram to fill for every region and process.
///
/// Specifications are immutable once registered; fill and merge results are
/// kept in separate run structures.
#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct HistogramSpec {
    pub name: String,
    pub axes: SpecAxes,
    pub x_label: String,
    pub y_label: String,
    pub z_label: String,
    pub y_min: Option<f64>,
    pub log_x: bool,
    pub log_y: bool,
    pub log_z: bool,
    pub panel: Option<Panel>,
    pub processes: NameFilter,
    pub folding: FlowFolding,
    /// Draw the stack statistical uncertainty band.
    pub error_bars: bool,
}

impl HistogramSpec {
    /// Creates a 1D specification.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        variable: impl Into<String>,
        binning: Binning,
        x_label: impl Into<String>,
    ) -> Self {
        Self::with_axes(
            name.into(),
            SpecAxes::One {
                variable: variable.into(),
                binning,
            },
            x_label.into(),
            "Events".to_string(),
        )
    }

    /// Creates a 2D specification.
    #[must_use]
    pub fn new_2d(
        name: impl Into<String>,
        variables: (&str, &str),
        binnings: (Binning, Binning),
        x_label: impl Into<String>,
        y_label: impl Into<String>,
    ) -> Self {
        Self::with_axes(
            name.into(),
            SpecAxes::Two {
                variable_x: variables.0.to_string(),
                variable_y: variables.1.to_string(),
                binning_x: binnings.0,
                binning_y: binnings.1,
            },
            x_label.into(),
            y_label.into(),
        )
    }

    fn with_axes(name: String, axes: SpecAxes, x_label: String, y_label: String) -> Self {
        Self {
            name,
            axes,
            x_label,
            y_label,
            z_label: "Events".to_string(),
            y_min: None,
            log_x: false,
            log_y: false,
            log_z: false,
            panel: None,
            processes: NameFilter::all(),
            folding: FlowFolding::default(),
            error_bars: true,
        }
    }

    /// Sets the y axis label.
    #[must_use]
    pub fn with_y_label(mut self, label: impl Into<String>) -> Self {
        self.y_label = label.into();
        self
    }

    /// Sets the z axis label (2D only).
    #[must_use]
    pub fn with_z_label(mut self, label: impl Into<String>) -> Self {
        self.z_label = label.into();
        self
    }

    /// Sets the y axis minimum.
    #[must_use]
    pub fn with_y_min(mut self, y_min: f64) -> Self {
        self.y_min = Some(y_min);
        self
    }

    /// Sets log scales for the x, y and z axes.
    #[must_use]
    pub fn with_log_scales(mut self, log_x: bool, log_y: bool, log_z: bool) -> Self {
        self.log_x = log_x;
        self.log_y = log_y;
        self.log_z = log_z;
        self
    }

    /// Attaches a derived sub-panel.
    #[must_use]
    pub fn with_panel(mut self, panel: Panel) -> Self {
        self.panel = Some(panel);
        self
    }

    /// Sets the process filter.
    #[must_use]
    pub fn with_processes(mut self, filter: NameFilter) -> Self {
        self.processes = filter;
        self
    }

    /// Sets underflow/overflow folding.
    #[must_use]
    pub fn with_folding(mut self, folding: FlowFolding) -> Self {
        self.folding = folding;
        self
    }

    /// Sets whether the stack uncertainty band is drawn.
    #[must_use]
    pub fn with_error_bars(mut self, error_bars: bool) -> Self {
        self.error_bars = error_bars;
        self
    }

    /// Returns true for 2D specifications.
    #[must_use]
    pub fn is_2d(&self) -> bool {
        matches!(self.axes, SpecAxes::Two { .. })
    }

    /// The x axis binning.
    #[must_use]
    pub fn x_binning(&self) -> &Binning {
        match &self.axes {
            SpecAxes::One { binning, .. } => binning,
            SpecAxes::Two { binning_x, .. } => binning_x,
        }
    }

    /// An empty histogram with this specification's axes.
    #[must_use]
    pub fn empty_histogram(&self) -> Histogram {
        Histogram::with_axes(self.axes.to_axes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_defaults() {
        let spec = HistogramSpec::new(
            "lepton_pt",
            "lepton1_pt",
            Binning::uniform(15, 0.0, 1500.0).unwrap(),
            "p_T [GeV]",
        );
        assert_eq!(spec.y_label, "Events");
        assert!(!spec.is_2d());
        assert!(spec.folding.is_none());
        assert!(spec.error_bars);
        assert_eq!(spec.axes.variables(), vec!["lepton1_pt"]);
        assert_eq!(spec.empty_histogram().n_slots(), 17);
    }

    #[test]
    fn test_2d_spec_axes() {
        let spec = HistogramSpec::new_2d(
            "eta_phi",
            ("eta", "phi"),
            (
                Binning::uniform(10, -2.5, 2.5).unwrap(),
                Binning::uniform(8, -3.2, 3.2).unwrap(),
            ),
            "#eta",
            "#phi",
        );
        assert!(spec.is_2d());
        assert_eq!(spec.axes.variables(), vec!["eta", "phi"]);
        assert_eq!(spec.empty_histogram().n_slots(), 12 * 10);
    }
}
