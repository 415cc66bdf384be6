//! Derived sub-panel declarations (ratios, efficiencies, error bands).

use std::fmt;
use std::sync::Arc;

use crate::{Diagnostics, Error, Histogram, Result, Role};

/// Literal input identifier that resolves to the stack total.
pub const STACK_SENTINEL: &str = "stack";

/// One input of a panel element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Source {
    /// The stack total of the plot.
    Stack,
    /// A canonical process histogram, looked up by exact name.
    Process(String),
}

impl Source {
    /// Parses an identifier; the literal `stack` maps to [`Source::Stack`].
    #[must_use]
    pub fn parse(identifier: &str) -> Self {
        if identifier == STACK_SENTINEL {
            Source::Stack
        } else {
            Source::Process(identifier.to_string())
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Stack => f.write_str(STACK_SENTINEL),
            Source::Process(name) => f.write_str(name),
        }
    }
}

/// A pure function combining a fixed number of histograms into one.
///
/// The built-in divide and error-band functions implement this trait, and
/// so can any user-supplied combination.
pub trait PanelFunction: Send + Sync {
    /// Short name used in diagnostics.
    fn name(&self) -> &str;

    /// Number of input histograms.
    fn arity(&self) -> usize;

    /// Combines `inputs` (exactly `arity()` histograms) into one histogram.
    ///
    /// # Errors
    /// Returns an error if the inputs cannot be combined.
    fn apply(&self, inputs: &[Histogram]) -> Result<Histogram>;
}

/// One histogram drawn in a panel.
#[derive(Clone)]
pub struct PanelElement {
    inputs: Vec<Source>,
    function: Arc<dyn PanelFunction>,
    /// Draw role (stacked draws a filled band).
    pub role: Role,
    /// Color token; `None` uses the first input's process color.
    pub color: Option<i32>,
    /// Draw error bars.
    pub error_bars: bool,
}

impl PanelElement {
    /// Creates an element drawn as points with error bars.
    ///
    /// # Errors
    /// Returns [`Error::ArityMismatch`] if the number of inputs is not 1 or 2
    /// or differs from the function arity.
    pub fn new(inputs: Vec<Source>, function: Arc<dyn PanelFunction>) -> Result<Self> {
        if !(1..=2).contains(&inputs.len()) || inputs.len() != function.arity() {
            return Err(Error::ArityMismatch {
                function: function.name().to_string(),
                expected: function.arity(),
                actual: inputs.len(),
            });
        }
        Ok(Self {
            inputs,
            function,
            role: Role::PointOverlay,
            color: None,
            error_bars: true,
        })
    }

    /// Sets the draw role.
    #[must_use]
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// Sets an explicit color.
    #[must_use]
    pub fn with_color(mut self, color: i32) -> Self {
        self.color = Some(color);
        self
    }

    /// Sets whether error bars are drawn.
    #[must_use]
    pub fn with_error_bars(mut self, error_bars: bool) -> Self {
        self.error_bars = error_bars;
        self
    }

    /// Declared inputs in order.
    #[must_use]
    pub fn inputs(&self) -> &[Source] {
        &self.inputs
    }

    /// The combining function.
    #[must_use]
    pub fn function(&self) -> &dyn PanelFunction {
        self.function.as_ref()
    }
}

impl fmt::Debug for PanelElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanelElement")
            .field("inputs", &self.inputs)
            .field("function", &self.function.name())
            .field("role", &self.role)
            .field("color", &self.color)
            .field("error_bars", &self.error_bars)
            .finish()
    }
}

/// Horizontal reference line in a panel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceLine {
    pub height: f64,
    pub color: i32,
}

/// A sub-panel drawn beneath the main plot.
#[derive(Debug, Clone)]
pub struct Panel {
    pub y_label: String,
    pub y_min: f64,
    pub y_max: f64,
    elements: Vec<PanelElement>,
    reference_lines: Vec<ReferenceLine>,
}

impl Panel {
    /// Creates an empty panel with a y axis label and range.
    #[must_use]
    pub fn new(y_label: impl Into<String>, y_min: f64, y_max: f64) -> Self {
        Self {
            y_label: y_label.into(),
            y_min,
            y_max,
            elements: Vec::new(),
            reference_lines: Vec::new(),
        }
    }

    /// Appends an element.
    #[must_use]
    pub fn with_element(mut self, element: PanelElement) -> Self {
        self.elements.push(element);
        self
    }

    /// Sets reference lines from parallel height and color lists.
    ///
    /// Lists of different length produce a warning and the longer one is
    /// truncated.
    #[must_use]
    pub fn with_reference_lines(
        mut self,
        heights: &[f64],
        colors: &[i32],
        diagnostics: &dyn Diagnostics,
    ) -> Self {
        if heights.len() != colors.len() {
            diagnostics.warn(
                "panel",
                &format!(
                    "{} reference line heights but {} colors; keeping {}",
                    heights.len(),
                    colors.len(),
                    heights.len().min(colors.len())
                ),
            );
        }
        self.reference_lines = heights
            .iter()
            .zip(colors)
            .map(|(&height, &color)| ReferenceLine { height, color })
            .collect();
        self
    }

    /// Elements in declared order.
    #[must_use]
    pub fn elements(&self) -> &[PanelElement] {
        &self.elements
    }

    /// Reference lines.
    #[must_use]
    pub fn reference_lines(&self) -> &[ReferenceLine] {
        &self.reference_lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Binning, RecordingDiagnostics};
    use approx::assert_relative_eq;

    struct Identity;

    impl PanelFunction for Identity {
        fn name(&self) -> &str {
            "identity"
        }

        fn arity(&self) -> usize {
            1
        }

        fn apply(&self, inputs: &[Histogram]) -> Result<Histogram> {
            Ok(inputs[0].clone())
        }
    }

    #[test]
    fn test_source_parse() {
        assert_eq!(Source::parse("stack"), Source::Stack);
        assert_eq!(Source::parse("data"), Source::Process("data".into()));
        assert_eq!(Source::Stack.to_string(), "stack");
    }

    #[test]
    fn test_arity_checked() {
        let err = PanelElement::new(
            vec![Source::Stack, Source::parse("data")],
            Arc::new(Identity),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::ArityMismatch {
                expected: 1,
                actual: 2,
                ..
            }
        ));

        let element = PanelElement::new(vec![Source::Stack], Arc::new(Identity)).unwrap();
        let h = Histogram::new(Binning::uniform(2, 0.0, 1.0).unwrap());
        assert_eq!(element.function().apply(&[h.clone()]).unwrap(), h);
    }

    #[test]
    fn test_reference_line_mismatch_truncates() {
        let diag = RecordingDiagnostics::new();
        let panel =
            Panel::new("Ratio", 0.5, 1.5).with_reference_lines(&[1.0, 0.9, 1.1], &[1], &diag);

        assert_eq!(diag.warning_count(), 1);
        assert_eq!(panel.reference_lines().len(), 1);
        assert_relative_eq!(panel.reference_lines()[0].height, 1.0);
    }
}
