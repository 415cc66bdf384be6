//! Run orchestration: book fills, merge, persist, composite and derive.

use std::collections::BTreeMap;
use std::sync::Arc;

use histstack_core::{
    Diagnostics, FillEngine, FillHandle, FillRequest, Histogram, HistogramKey, HistogramSink,
    HistogramSpec, Panel, Process, ProcessRegistry, Region, Result, Source, SpecAxes,
};

use crate::{
    Aggregator, AxisRange, Compositor, ExpectedProcesses, Fragment, MergedHistograms,
    PanelEngine, PanelOutput, PanelPlot, Plot2D, PlotBundle, ProcessHistograms,
};

const COMPONENT: &str = "plotter";

/// Color used when a panel element has neither its own color nor a process
/// input to borrow one from.
const FALLBACK_COLOR: i32 = 1;

/// Results of one [`Plotter::run`].
#[derive(Debug, Clone, Default)]
pub struct RunOutput {
    /// Canonical histograms per specification name.
    pub merged: BTreeMap<String, MergedHistograms>,
    /// 1D plots, in specification then region order.
    pub plots: Vec<PlotBundle>,
    /// 2D plots, in specification, region, then process order.
    pub plots_2d: Vec<Plot2D>,
}

struct Booking {
    spec: usize,
    region: String,
    process: String,
    dataset: String,
    handle: FillHandle,
}

/// Collects regions, histogram specifications and processes, then runs the
/// whole pipeline against a fill engine.
pub struct Plotter {
    weight: String,
    regions: Vec<Region>,
    specs: Vec<HistogramSpec>,
    registry: ProcessRegistry,
    diagnostics: Arc<dyn Diagnostics>,
}

impl Plotter {
    /// Creates a plotter with a global per-row weight expression.
    #[must_use]
    pub fn new(weight: impl Into<String>, diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self {
            weight: weight.into(),
            regions: Vec::new(),
            specs: Vec::new(),
            registry: ProcessRegistry::new(diagnostics.clone()),
            diagnostics,
        }
    }

    /// Adds a region, replacing one with the same name.
    pub fn add_region(&mut self, region: Region) {
        if let Some(existing) = self.regions.iter_mut().find(|r| r.name == region.name) {
            self.diagnostics.warn(
                COMPONENT,
                &format!("region '{}' already exists; replacing it", region.name),
            );
            *existing = region;
        } else {
            self.regions.push(region);
        }
    }

    /// Adds a histogram specification, replacing one with the same name.
    ///
    /// A panel on a 2D specification is dropped with a warning.
    pub fn add_histogram(&mut self, mut spec: HistogramSpec) {
        if spec.is_2d() && spec.panel.is_some() {
            self.diagnostics.warn(
                COMPONENT,
                &format!("2D histogram '{}' cannot carry a panel; ignoring it", spec.name),
            );
            spec.panel = None;
        }
        if let Some(existing) = self.specs.iter_mut().find(|s| s.name == spec.name) {
            self.diagnostics.warn(
                COMPONENT,
                &format!("histogram '{}' already exists; replacing it", spec.name),
            );
            *existing = spec;
        } else {
            self.specs.push(spec);
        }
    }

    /// Registers a process dataset.
    pub fn add_process(&mut self, process: Process) {
        self.registry.register(process);
    }

    /// Declared regions, or the implicit nominal region if none were added.
    #[must_use]
    pub fn regions(&self) -> Vec<Region> {
        if self.regions.is_empty() {
            vec![Region::nominal()]
        } else {
            self.regions.clone()
        }
    }

    /// Histogram specifications in registration order.
    #[must_use]
    pub fn histograms(&self) -> &[HistogramSpec] {
        &self.specs
    }

    /// Process registry.
    #[must_use]
    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    /// Global weight expression.
    #[must_use]
    pub fn weight(&self) -> &str {
        &self.weight
    }

    /// Runs the pipeline.
    ///
    /// Every fill is booked first and realized in a single batched call.
    /// Fragments are then merged per specification, checked against the
    /// expected processes, folded, persisted through `sink`, composited and
    /// handed to the panel engine. Configuration problems are reported
    /// through the diagnostics observer and skip only the affected part.
    ///
    /// # Errors
    /// Returns an error if the sink fails to persist the merged histograms.
    pub fn run(
        &self,
        engine: &mut dyn FillEngine,
        sink: &mut dyn HistogramSink,
    ) -> Result<RunOutput> {
        let regions = self.regions();
        if self.specs.is_empty() {
            self.diagnostics.warn(COMPONENT, "no histograms declared");
        }

        let (bookings, expected) = self.book(engine, &regions);
        self.diagnostics.info(
            COMPONENT,
            &format!("running {} booked fills", bookings.len()),
        );
        let fragments = self.collect(engine, bookings);

        let aggregator = Aggregator::new(self.diagnostics.clone());
        let mut merged = BTreeMap::new();
        for ((spec, fragments), expected) in self.specs.iter().zip(fragments).zip(&expected) {
            let mut hists = aggregator.merge(&spec.name, fragments);
            aggregator.check_consistency(&spec.name, &hists, expected);
            if !spec.is_2d() {
                aggregator.fold_flows(&spec.name, &mut hists, spec.folding);
            }
            merged.insert(spec.name.clone(), hists);
        }

        self.persist(sink, &merged, &regions)?;

        let mut output = RunOutput::default();
        for spec in &self.specs {
            let Some(hists) = merged.get(&spec.name) else {
                continue;
            };
            for region in &regions {
                let Some(region_hists) = hists.get(&region.name) else {
                    continue;
                };
                if spec.is_2d() {
                    output
                        .plots_2d
                        .extend(self.plots_2d(spec, &region.name, region_hists));
                } else {
                    output
                        .plots
                        .push(self.plot(spec, &region.name, region_hists));
                }
            }
        }
        output.merged = merged;
        Ok(output)
    }

    fn book(
        &self,
        engine: &mut dyn FillEngine,
        regions: &[Region],
    ) -> (Vec<Booking>, Vec<ExpectedProcesses>) {
        let mut bookings = Vec::new();
        let mut expected = Vec::with_capacity(self.specs.len());

        for (index, spec) in self.specs.iter().enumerate() {
            let mut spec_expected = ExpectedProcesses::new();
            for region in regions {
                if !region.histograms.allows(&spec.name) {
                    self.diagnostics.debug(
                        COMPONENT,
                        &format!("'{}' not filled in region '{}'", spec.name, region.name),
                    );
                    continue;
                }
                let processes: Vec<&Process> = self
                    .registry
                    .processes()
                    .iter()
                    .filter(|p| region.processes.allows(p.name()) && spec.processes.allows(p.name()))
                    .collect();
                if processes.is_empty() {
                    self.diagnostics.warn(
                        COMPONENT,
                        &format!(
                            "no processes left for '{}' in region '{}'; skipping",
                            spec.name, region.name
                        ),
                    );
                    continue;
                }

                let variables: Vec<String> =
                    spec.axes.variables().into_iter().map(String::from).collect();
                for process in processes {
                    spec_expected
                        .entry(region.name.clone())
                        .or_default()
                        .insert(process.name().to_string());
                    let request = FillRequest {
                        dataset: process.dataset().clone(),
                        selection: region.selection.clone(),
                        weight: process.weight().unwrap_or(self.weight.as_str()).to_string(),
                        variables: variables.clone(),
                        axes: spec.axes.to_axes(),
                    };
                    match engine.book(request) {
                        Ok(handle) => bookings.push(Booking {
                            spec: index,
                            region: region.name.clone(),
                            process: process.name().to_string(),
                            dataset: process.dataset().to_string(),
                            handle,
                        }),
                        Err(err) => self.diagnostics.error(
                            COMPONENT,
                            &format!(
                                "cannot book '{}' for {} in region '{}': {err}",
                                spec.name,
                                process.dataset(),
                                region.name
                            ),
                        ),
                    }
                }
            }
            expected.push(spec_expected);
        }
        (bookings, expected)
    }

    fn collect(&self, engine: &mut dyn FillEngine, bookings: Vec<Booking>) -> Vec<Vec<Fragment>> {
        let mut results: Vec<Option<Result<_>>> = engine.run().into_iter().map(Some).collect();
        let mut fragments: Vec<Vec<Fragment>> = vec![Vec::new(); self.specs.len()];

        for booking in bookings {
            let spec = &self.specs[booking.spec];
            match results.get_mut(booking.handle.0).and_then(Option::take) {
                Some(Ok(histogram)) => fragments[booking.spec].push(Fragment::new(
                    booking.region,
                    booking.process,
                    histogram,
                )),
                Some(Err(err)) => self.diagnostics.error(
                    COMPONENT,
                    &format!(
                        "fill of '{}' from {} in region '{}' failed: {err}",
                        spec.name, booking.dataset, booking.region
                    ),
                ),
                None => self.diagnostics.error(
                    COMPONENT,
                    &format!(
                        "fill engine returned no result for '{}' from {}",
                        spec.name, booking.dataset
                    ),
                ),
            }
        }
        fragments
    }

    fn persist(
        &self,
        sink: &mut dyn HistogramSink,
        merged: &BTreeMap<String, MergedHistograms>,
        regions: &[Region],
    ) -> Result<()> {
        let mut entries = Vec::new();
        for spec in &self.specs {
            let Some(hists) = merged.get(&spec.name) else {
                continue;
            };
            for region in regions {
                let Some(region_hists) = hists.get(&region.name) else {
                    continue;
                };
                for template in self.registry.templates() {
                    if let Some(hist) = region_hists.get(&template.name) {
                        entries.push((
                            HistogramKey::new(&spec.name, &region.name, &template.name),
                            hist,
                        ));
                    }
                }
            }
        }
        sink.persist(&entries)?;
        self.diagnostics.info(
            COMPONENT,
            &format!("persisted {} merged histograms", entries.len()),
        );
        Ok(())
    }

    fn plot(
        &self,
        spec: &HistogramSpec,
        region: &str,
        histograms: &ProcessHistograms,
    ) -> PlotBundle {
        let composition = Compositor::new(self.diagnostics.clone())
            .with_uncertainty(spec.error_bars)
            .composite(histograms, self.registry.templates());
        let panel = spec.panel.as_ref().map(|panel| {
            self.panel(panel, histograms, composition.stack_total.as_ref())
        });
        PlotBundle {
            histogram: spec.name.clone(),
            region: region.to_string(),
            x_label: spec.x_label.clone(),
            y_label: spec.y_label.clone(),
            log_x: spec.log_x,
            log_y: spec.log_y,
            range: AxisRange::for_spec(spec, composition.max_height()),
            composition,
            panel,
        }
    }

    fn panel(
        &self,
        panel: &Panel,
        histograms: &ProcessHistograms,
        stack_total: Option<&Histogram>,
    ) -> PanelPlot {
        let results = PanelEngine::new(self.diagnostics.clone()).evaluate(
            panel,
            histograms,
            stack_total,
        );
        let outputs = panel
            .elements()
            .iter()
            .zip(results)
            .map(|(element, histogram)| PanelOutput {
                function: element.function().name().to_string(),
                inputs: element.inputs().iter().map(ToString::to_string).collect(),
                role: element.role,
                color: element
                    .color
                    .unwrap_or_else(|| self.input_color(&element.inputs()[0])),
                error_bars: element.error_bars,
                histogram,
            })
            .collect();
        PanelPlot {
            y_label: panel.y_label.clone(),
            y_min: panel.y_min,
            y_max: panel.y_max,
            outputs,
            reference_lines: panel.reference_lines().to_vec(),
        }
    }

    fn input_color(&self, source: &Source) -> i32 {
        match source {
            Source::Process(name) => self
                .registry
                .template(name)
                .map_or(FALLBACK_COLOR, |t| t.color),
            Source::Stack => FALLBACK_COLOR,
        }
    }

    fn plots_2d(
        &self,
        spec: &HistogramSpec,
        region: &str,
        histograms: &ProcessHistograms,
    ) -> Vec<Plot2D> {
        let x_binning = spec.x_binning();
        let y_range = match &spec.axes {
            SpecAxes::Two { binning_y, .. } => (binning_y.low(), binning_y.high()),
            SpecAxes::One { .. } => (0.0, 0.0),
        };

        self.registry
            .templates()
            .iter()
            .filter_map(|template| {
                histograms.get(&template.name).map(|hist| Plot2D {
                    histogram: spec.name.clone(),
                    region: region.to_string(),
                    template: template.clone(),
                    x_label: spec.x_label.clone(),
                    y_label: spec.y_label.clone(),
                    z_label: spec.z_label.clone(),
                    log_scales: [spec.log_x, spec.log_y, spec.log_z],
                    x_range: (x_binning.low(), x_binning.high()),
                    y_range,
                    data: hist.clone(),
                })
            })
            .collect()
    }
}
