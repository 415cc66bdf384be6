//! Derived panel quantities: ratios, efficiencies and error bands.
//!
//! Every function works slot by slot over the full storage, flow slots
//! included, and returns a histogram with the binning of its first input.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use histstack_core::{
    Diagnostics, Error, Histogram, Panel, PanelElement, PanelFunction, Result, Source,
};

use crate::ProcessHistograms;

const COMPONENT: &str = "panel";

/// Error propagation rule for [`Divide`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorRule {
    /// Uncorrelated numerator and denominator (option `""`).
    #[default]
    Standard,
    /// Numerator is a subset of the denominator (option `"B"`).
    Binomial,
}

impl ErrorRule {
    /// Option string of the rule.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorRule::Standard => "",
            ErrorRule::Binomial => "B",
        }
    }
}

impl fmt::Display for ErrorRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorRule {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" => Ok(ErrorRule::Standard),
            "B" => Ok(ErrorRule::Binomial),
            other => Err(Error::InvalidErrorOption(other.to_string())),
        }
    }
}

/// Divides one histogram by another.
///
/// Contents are `a / b`, zero where `b` is zero. With [`ErrorRule::Standard`]
/// the variance is `(va·b² + vb·a²) / b⁴`. With [`ErrorRule::Binomial`] it is
/// `|((1 − 2w)·va + w²·vb) / b²|` where `w = a / b`, and zero where `a == b`.
///
/// # Errors
/// Returns [`Error::BinningMismatch`] if the binnings differ.
#[allow(clippy::float_cmp)]
pub fn divide(numerator: &Histogram, denominator: &Histogram, rule: ErrorRule) -> Result<Histogram> {
    if !numerator.same_binning(denominator) {
        return Err(Error::BinningMismatch(
            "numerator and denominator binnings differ".to_string(),
        ));
    }
    let mut out = numerator.empty_like();
    for slot in 0..numerator.n_slots() {
        let (a, va) = (numerator.bin_content(slot), numerator.bin_variance(slot));
        let (b, vb) = (denominator.bin_content(slot), denominator.bin_variance(slot));
        if b == 0.0 {
            continue;
        }
        let ratio = a / b;
        let variance = match rule {
            ErrorRule::Standard => (va * b * b + vb * a * a) / b.powi(4),
            ErrorRule::Binomial if a == b => 0.0,
            ErrorRule::Binomial => {
                ((1.0 - 2.0 * ratio) * va + ratio * ratio * vb).abs() / (b * b)
            }
        };
        out.set_bin(slot, ratio, variance);
    }
    Ok(out)
}

/// Unit band carrying the relative error of `hist`.
///
/// Content is 1 where `hist` is positive and 0 elsewhere; the error is
/// `sqrt(va) / a`.
#[must_use]
pub fn error_band(hist: &Histogram) -> Histogram {
    let mut out = hist.empty_like();
    for slot in 0..hist.n_slots() {
        let (a, va) = (hist.bin_content(slot), hist.bin_variance(slot));
        if a > 0.0 {
            out.set_bin(slot, 1.0, va / (a * a));
        }
    }
    out
}

/// Built-in two-input division.
#[derive(Debug, Clone, Copy, Default)]
pub struct Divide {
    rule: ErrorRule,
}

impl Divide {
    /// Creates a division with the given error rule.
    #[must_use]
    pub fn new(rule: ErrorRule) -> Self {
        Self { rule }
    }

    /// Creates a division from an option string (`""` or `"B"`).
    ///
    /// # Errors
    /// Returns [`Error::InvalidErrorOption`] for any other string.
    pub fn with_option(option: &str) -> Result<Self> {
        option.parse().map(Self::new)
    }

    /// Error rule in use.
    #[must_use]
    pub fn rule(&self) -> ErrorRule {
        self.rule
    }
}

impl PanelFunction for Divide {
    fn name(&self) -> &str {
        "divide"
    }

    fn arity(&self) -> usize {
        2
    }

    fn apply(&self, inputs: &[Histogram]) -> Result<Histogram> {
        match inputs {
            [a, b] => divide(a, b, self.rule),
            _ => Err(Error::ArityMismatch {
                function: self.name().to_string(),
                expected: 2,
                actual: inputs.len(),
            }),
        }
    }
}

/// Built-in one-input error band.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorBand;

impl PanelFunction for ErrorBand {
    fn name(&self) -> &str {
        "error_band"
    }

    fn arity(&self) -> usize {
        1
    }

    fn apply(&self, inputs: &[Histogram]) -> Result<Histogram> {
        match inputs {
            [a] => Ok(error_band(a)),
            _ => Err(Error::ArityMismatch {
                function: self.name().to_string(),
                expected: 1,
                actual: inputs.len(),
            }),
        }
    }
}

/// Adapts a closure into a [`PanelFunction`].
pub struct FnPanel<F> {
    name: String,
    arity: usize,
    func: F,
}

impl<F> FnPanel<F>
where
    F: Fn(&[Histogram]) -> Result<Histogram> + Send + Sync,
{
    /// Wraps `func`, which receives exactly `arity` histograms.
    pub fn new(name: impl Into<String>, arity: usize, func: F) -> Self {
        Self {
            name: name.into(),
            arity,
            func,
        }
    }

    /// Wraps `func` into a shareable panel function.
    pub fn shared(name: impl Into<String>, arity: usize, func: F) -> Arc<dyn PanelFunction>
    where
        F: 'static,
    {
        Arc::new(Self::new(name, arity, func))
    }
}

impl<F> PanelFunction for FnPanel<F>
where
    F: Fn(&[Histogram]) -> Result<Histogram> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn arity(&self) -> usize {
        self.arity
    }

    fn apply(&self, inputs: &[Histogram]) -> Result<Histogram> {
        (self.func)(inputs)
    }
}

/// Evaluates panel elements against the canonical histograms of a region.
///
/// Stateless: evaluating the same panel twice gives the same outputs.
pub struct PanelEngine {
    diagnostics: Arc<dyn Diagnostics>,
}

impl PanelEngine {
    /// Creates an engine reporting to `diagnostics`.
    #[must_use]
    pub fn new(diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self { diagnostics }
    }

    /// Evaluates every element in declared order.
    ///
    /// The output has one slot per element. An element whose inputs cannot
    /// be resolved or combined is reported and leaves `None` in its slot.
    #[must_use]
    pub fn evaluate(
        &self,
        panel: &Panel,
        histograms: &ProcessHistograms,
        stack_total: Option<&Histogram>,
    ) -> Vec<Option<Histogram>> {
        panel
            .elements()
            .iter()
            .enumerate()
            .map(|(index, element)| {
                match self.evaluate_element(element, histograms, stack_total) {
                    Ok(hist) => Some(hist),
                    Err(err) => {
                        self.diagnostics.error(
                            COMPONENT,
                            &format!(
                                "element {index} ({}) skipped: {err}",
                                element.function().name()
                            ),
                        );
                        None
                    }
                }
            })
            .collect()
    }

    /// Evaluates a single element.
    ///
    /// # Errors
    /// Returns [`Error::UnresolvedInput`] for an unknown process or a missing
    /// stack total, [`Error::BinningMismatch`] if two inputs disagree, or the
    /// function's own error.
    pub fn evaluate_element(
        &self,
        element: &PanelElement,
        histograms: &ProcessHistograms,
        stack_total: Option<&Histogram>,
    ) -> Result<Histogram> {
        let inputs = element
            .inputs()
            .iter()
            .map(|source| resolve(source, histograms, stack_total))
            .collect::<Result<Vec<_>>>()?;
        if let [a, b] = inputs.as_slice() {
            if !a.same_binning(b) {
                return Err(Error::BinningMismatch(format!(
                    "inputs '{}' and '{}' have different binnings",
                    element.inputs()[0],
                    element.inputs()[1]
                )));
            }
        }
        element.function().apply(&inputs)
    }
}

fn resolve(
    source: &Source,
    histograms: &ProcessHistograms,
    stack_total: Option<&Histogram>,
) -> Result<Histogram> {
    match source {
        Source::Stack => stack_total
            .cloned()
            .ok_or_else(|| Error::UnresolvedInput("stack (no stacked processes)".to_string())),
        Source::Process(name) => histograms
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnresolvedInput(name.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use histstack_core::{Binning, RecordingDiagnostics};

    fn hist(contents: &[f64], variances: &[f64]) -> Histogram {
        let binning = Binning::uniform(contents.len(), 0.0, 1.0).unwrap();
        Histogram::from_bins(binning, contents, variances).unwrap()
    }

    #[test]
    fn test_error_rule_parse() {
        assert_eq!("".parse::<ErrorRule>().unwrap(), ErrorRule::Standard);
        assert_eq!("B".parse::<ErrorRule>().unwrap(), ErrorRule::Binomial);
        assert!(matches!(
            Divide::with_option("X"),
            Err(Error::InvalidErrorOption(_))
        ));
    }

    #[test]
    fn test_divide_self_is_one() {
        let a = hist(&[4.0, 10.0, 0.0], &[4.0, 10.0, 0.0]);
        let ratio = divide(&a, &a, ErrorRule::Standard).unwrap();

        assert_relative_eq!(ratio.bin_content(1), 1.0);
        assert_relative_eq!(ratio.bin_content(2), 1.0);
        // sqrt(2) times the relative error of a
        assert_relative_eq!(ratio.bin_error(1), 2.0_f64.sqrt() * 0.5, epsilon = 1e-12);
        assert_relative_eq!(
            ratio.bin_error(2),
            2.0_f64.sqrt() * 10.0_f64.sqrt() / 10.0,
            epsilon = 1e-12
        );
        assert_relative_eq!(ratio.bin_content(3), 0.0);
        assert_relative_eq!(ratio.bin_variance(3), 0.0);
    }

    #[test]
    fn test_divide_zero_numerator_has_finite_error() {
        let a = hist(&[0.0], &[0.0]);
        let b = hist(&[4.0], &[4.0]);
        let ratio = divide(&a, &b, ErrorRule::Standard).unwrap();
        assert_relative_eq!(ratio.bin_content(1), 0.0);
        assert!(ratio.bin_variance(1).is_finite());
    }

    #[test]
    fn test_divide_binomial() {
        let pass = hist(&[3.0, 5.0], &[3.0, 5.0]);
        let total = hist(&[10.0, 5.0], &[10.0, 5.0]);
        let eff = divide(&pass, &total, ErrorRule::Binomial).unwrap();

        assert_relative_eq!(eff.bin_content(1), 0.3);
        // |(1 - 0.6) * 3 + 0.09 * 10| / 100 = 2.1 / 100
        assert_relative_eq!(eff.bin_variance(1), 0.021, epsilon = 1e-12);
        assert_relative_eq!(eff.bin_content(2), 1.0);
        assert_relative_eq!(eff.bin_variance(2), 0.0);
    }

    #[test]
    fn test_error_band() {
        let stack = hist(&[7.0, 0.0], &[7.0, 0.0]);
        let band = error_band(&stack);

        assert_relative_eq!(band.bin_content(1), 1.0);
        assert_relative_eq!(band.bin_error(1), 7.0_f64.sqrt() / 7.0, epsilon = 1e-12);
        assert_relative_eq!(band.bin_content(2), 0.0);
        assert_relative_eq!(band.bin_variance(2), 0.0);
    }

    #[test]
    fn test_engine_resolves_stack_and_processes() {
        let diag = Arc::new(RecordingDiagnostics::new());
        let engine = PanelEngine::new(diag.clone());
        let panel = Panel::new("Data / MC", 0.5, 1.5)
            .with_element(
                PanelElement::new(
                    vec![Source::parse("data"), Source::parse("stack")],
                    Arc::new(Divide::default()),
                )
                .unwrap(),
            )
            .with_element(PanelElement::new(vec![Source::Stack], Arc::new(ErrorBand)).unwrap())
            .with_element(
                PanelElement::new(vec![Source::parse("missing")], Arc::new(ErrorBand)).unwrap(),
            );

        let mut histograms = ProcessHistograms::new();
        histograms.insert("data".into(), hist(&[7.0], &[7.0]));
        let total = hist(&[7.0], &[7.0]);

        let outputs = engine.evaluate(&panel, &histograms, Some(&total));
        assert_eq!(outputs.len(), 3);
        assert_relative_eq!(outputs[0].as_ref().unwrap().bin_content(1), 1.0);
        assert_relative_eq!(outputs[1].as_ref().unwrap().bin_content(1), 1.0);
        assert!(outputs[2].is_none());
        assert_eq!(diag.error_count(), 1);

        let again = engine.evaluate(&panel, &histograms, Some(&total));
        assert_eq!(outputs, again);
    }

    #[test]
    fn test_engine_without_stack_total() {
        let diag = Arc::new(RecordingDiagnostics::new());
        let engine = PanelEngine::new(diag.clone());
        let panel = Panel::new("Band", 0.8, 1.2)
            .with_element(PanelElement::new(vec![Source::Stack], Arc::new(ErrorBand)).unwrap());

        let outputs = engine.evaluate(&panel, &ProcessHistograms::new(), None);
        assert_eq!(outputs, vec![None]);
        assert_eq!(diag.error_count(), 1);
    }

    #[test]
    fn test_engine_rejects_mismatched_inputs() {
        let engine = PanelEngine::new(Arc::new(RecordingDiagnostics::new()));
        let element = PanelElement::new(
            vec![Source::parse("a"), Source::parse("b")],
            Arc::new(Divide::default()),
        )
        .unwrap();
        let mut histograms = ProcessHistograms::new();
        histograms.insert("a".into(), hist(&[1.0], &[1.0]));
        histograms.insert("b".into(), hist(&[1.0, 2.0], &[1.0, 2.0]));

        let result = engine.evaluate_element(&element, &histograms, None);
        assert!(matches!(result, Err(Error::BinningMismatch(_))));
    }

    #[test]
    fn test_closure_panel_function() {
        let doubled = FnPanel::shared("double", 1, |inputs: &[Histogram]| -> Result<Histogram> {
            let mut out = inputs[0].clone();
            out.add(&inputs[0])?;
            Ok(out)
        });
        let element = PanelElement::new(vec![Source::parse("a")], doubled).unwrap();
        let engine = PanelEngine::new(Arc::new(RecordingDiagnostics::new()));
        let mut histograms = ProcessHistograms::new();
        histograms.insert("a".into(), hist(&[2.5], &[1.0]));

        let out = engine.evaluate_element(&element, &histograms, None).unwrap();
        assert_relative_eq!(out.bin_content(1), 5.0);
        assert_relative_eq!(out.bin_variance(1), 2.0);
    }
}
