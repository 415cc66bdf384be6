//! Axis ranges for the drawing frame of a plot.

use histstack_core::{Binning, HistogramSpec};

const HEADROOM: f64 = 1.4;

/// Axis ranges handed to the renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisRange {
    /// Lower x edge of the binning.
    pub x_min: f64,
    /// Upper x edge of the binning.
    pub x_max: f64,
    /// Explicit y minimum, if the specification sets one.
    pub y_min: Option<f64>,
    /// y maximum leaving room for the legend; `None` for an empty plot.
    pub y_max: Option<f64>,
}

impl AxisRange {
    /// Range of a 1D plot whose tallest drawn bin is `max_height`.
    ///
    /// Linear plots get `1.4 · max_height`; log-y plots get
    /// `(max_height − y_min)^1.4` with `y_min` defaulting to 0.
    #[must_use]
    pub fn for_spec(spec: &HistogramSpec, max_height: f64) -> Self {
        let y_max = (max_height > 0.0).then(|| {
            if spec.log_y {
                let floor = spec.y_min.unwrap_or(0.0);
                (max_height - floor).max(0.0).powf(HEADROOM)
            } else {
                max_height * HEADROOM
            }
        });
        Self {
            y_max,
            ..Self::of_binning(spec.x_binning(), spec.y_min)
        }
    }

    /// Range covering a binning, without a y maximum.
    #[must_use]
    pub fn of_binning(binning: &Binning, y_min: Option<f64>) -> Self {
        Self {
            x_min: binning.low(),
            x_max: binning.high(),
            y_min,
            y_max: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn spec() -> HistogramSpec {
        HistogramSpec::new(
            "m",
            "mass",
            Binning::uniform(10, 50.0, 150.0).unwrap(),
            "m [GeV]",
        )
    }

    #[test]
    fn test_linear_headroom() {
        let range = AxisRange::for_spec(&spec(), 100.0);
        assert_relative_eq!(range.x_min, 50.0);
        assert_relative_eq!(range.x_max, 150.0);
        assert_eq!(range.y_min, None);
        assert_relative_eq!(range.y_max.unwrap(), 140.0);
    }

    #[test]
    fn test_log_headroom() {
        let spec = spec().with_log_scales(false, true, false).with_y_min(1.0);
        let range = AxisRange::for_spec(&spec, 101.0);
        assert_eq!(range.y_min, Some(1.0));
        assert_relative_eq!(range.y_max.unwrap(), 100.0_f64.powf(1.4), epsilon = 1e-9);
    }

    #[test]
    fn test_empty_plot_has_no_maximum() {
        assert_eq!(AxisRange::for_spec(&spec(), 0.0).y_max, None);
    }
}
