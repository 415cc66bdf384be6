//! Stack/overlay partitioning and stack totals.

use std::sync::Arc;

use histstack_core::{Diagnostics, Histogram, ProcessTemplate};

use crate::ProcessHistograms;

const COMPONENT: &str = "compositor";

/// A canonical histogram together with the template that styles it.
#[derive(Debug, Clone)]
pub struct Layer {
    /// Draw template of the process.
    pub template: ProcessTemplate,
    /// Canonical histogram.
    pub histogram: Histogram,
}

/// The drawable groups of one plot.
#[derive(Debug, Clone, Default)]
pub struct Composition {
    /// Stacked layers, ascending by integral.
    pub stack: Vec<Layer>,
    /// Line and point overlays, ascending by integral.
    pub overlay: Vec<Layer>,
    /// Bin-wise sum of the stack; `None` when nothing is stacked.
    pub stack_total: Option<Histogram>,
    /// Copy of the stack total used for the uncertainty band.
    pub stack_uncertainty: Option<Histogram>,
}

impl Composition {
    /// Largest in-range content over the overlays and the stack total.
    ///
    /// Returns 0 when there is nothing to draw.
    #[must_use]
    pub fn max_height(&self) -> f64 {
        self.overlay
            .iter()
            .map(|layer| &layer.histogram)
            .chain(self.stack_total.as_ref())
            .map(Histogram::maximum)
            .fold(0.0, f64::max)
    }
}

/// Partitions per-process histograms into stack and overlay groups.
pub struct Compositor {
    diagnostics: Arc<dyn Diagnostics>,
    uncertainty: bool,
}

impl Compositor {
    /// Creates a compositor that also exposes the uncertainty band.
    #[must_use]
    pub fn new(diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self {
            diagnostics,
            uncertainty: true,
        }
    }

    /// Sets whether the stack uncertainty band is produced.
    #[must_use]
    pub fn with_uncertainty(mut self, uncertainty: bool) -> Self {
        self.uncertainty = uncertainty;
        self
    }

    /// Builds the composition of one region.
    ///
    /// Layers are taken in template order, then stably sorted by integral,
    /// so equal integrals keep registration order. Histograms without a
    /// template are reported and left out.
    #[must_use]
    pub fn composite(
        &self,
        histograms: &ProcessHistograms,
        templates: &[ProcessTemplate],
    ) -> Composition {
        for name in histograms.keys() {
            if !templates.iter().any(|t| &t.name == name) {
                self.diagnostics.error(
                    COMPONENT,
                    &format!("no template for process '{name}'; dropped"),
                );
            }
        }

        let (mut stack, mut overlay): (Vec<Layer>, Vec<Layer>) = templates
            .iter()
            .filter_map(|template| {
                histograms.get(&template.name).map(|histogram| Layer {
                    template: template.clone(),
                    histogram: histogram.clone(),
                })
            })
            .partition(|layer| layer.template.role.is_stacked());

        sort_by_integral(&mut stack);
        sort_by_integral(&mut overlay);

        let stack_total = self.stack_total(&stack);
        if stack_total.is_none() {
            self.diagnostics.debug(COMPONENT, "no stacked processes");
        }
        let stack_uncertainty = if self.uncertainty {
            stack_total.clone()
        } else {
            None
        };

        Composition {
            stack,
            overlay,
            stack_total,
            stack_uncertainty,
        }
    }

    fn stack_total(&self, stack: &[Layer]) -> Option<Histogram> {
        let (first, rest) = stack.split_first()?;
        let mut total = first.histogram.clone();
        for layer in rest {
            if let Err(err) = total.add(&layer.histogram) {
                self.diagnostics.error(
                    COMPONENT,
                    &format!(
                        "'{}' left out of the stack total: {err}",
                        layer.template.name
                    ),
                );
            }
        }
        Some(total)
    }
}

fn sort_by_integral(layers: &mut [Layer]) {
    layers.sort_by(|a, b| a.histogram.integral().total_cmp(&b.histogram.integral()));
}
