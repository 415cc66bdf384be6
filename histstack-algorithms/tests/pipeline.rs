#![allow(clippy::uninlined_format_args)]
use std::collections::HashMap;
use std::sync::Arc;

use approx::assert_relative_eq;
use histstack_algorithms::{Divide, ErrorBand, Plotter};
use histstack_core::{
    Binning, Error, FillEngine, FillHandle, FillRequest, FlowFolding, Histogram, HistogramSpec,
    Level, MemorySink, NameFilter, Panel, PanelElement, Process, ProcessTemplate, Region,
    RecordingDiagnostics, Result, Role, Source,
};
use tempfile::TempDir;

/// Fill engine serving canned `(x, y, weight)` rows or whole histograms per
/// tree name.
///
/// Rows are accepted by a region when the selection is empty or equals the
/// tree name prefixed with `tree==`.
#[derive(Default)]
struct CannedEngine {
    rows: HashMap<String, Vec<(f64, f64, f64)>>,
    filled: HashMap<String, Histogram>,
    booked: Vec<FillRequest>,
    runs: usize,
}

impl CannedEngine {
    fn with_rows(mut self, tree: &str, rows: &[(f64, f64, f64)]) -> Self {
        self.rows.insert(tree.to_string(), rows.to_vec());
        self
    }

    fn with_histogram(mut self, tree: &str, hist: Histogram) -> Self {
        self.filled.insert(tree.to_string(), hist);
        self
    }
}

impl FillEngine for CannedEngine {
    fn book(&mut self, request: FillRequest) -> Result<FillHandle> {
        self.booked.push(request);
        Ok(FillHandle(self.booked.len() - 1))
    }

    fn run(&mut self) -> Vec<Result<Histogram>> {
        self.runs += 1;
        self.booked
            .iter()
            .map(|request| {
                if let Some(hist) = self.filled.get(&request.dataset.tree) {
                    return Ok(hist.clone());
                }
                let rows = self
                    .rows
                    .get(&request.dataset.tree)
                    .ok_or_else(|| Error::FillError(format!("no tree {}", request.dataset.tree)))?;
                let mut hist = Histogram::with_axes(request.axes.clone());
                let accepted = request.selection.is_empty()
                    || request.selection == format!("tree=={}", request.dataset.tree);
                if accepted {
                    let scale: f64 = request.weight.parse().unwrap_or(1.0);
                    for &(x, y, w) in rows {
                        if hist.is_2d() {
                            hist.fill_2d(x, y, w * scale);
                        } else {
                            hist.fill(x, w * scale);
                        }
                    }
                }
                Ok(hist)
            })
            .collect()
    }
}

struct Fixture {
    dir: TempDir,
    diag: Arc<RecordingDiagnostics>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            diag: Arc::new(RecordingDiagnostics::new()),
        }
    }

    fn process(&self, template: ProcessTemplate, file: &str, tree: &str) -> Process {
        let path = self.dir.path().join(file);
        std::fs::write(&path, "{}").unwrap();
        Process::new(template, path, tree).unwrap()
    }

    fn plotter(&self) -> Plotter {
        Plotter::new("1", self.diag.clone())
    }
}

fn one_bin() -> Binning {
    Binning::uniform(1, 0.0, 1.0).unwrap()
}

fn unit_rows(n: usize) -> Vec<(f64, f64, f64)> {
    vec![(0.5, 0.0, 1.0); n]
}

fn sig_bkg_data(fixture: &Fixture) -> Plotter {
    let mut plotter = fixture.plotter();
    plotter.add_process(fixture.process(ProcessTemplate::new("sig").with_color(2), "sig.json", "sig"));
    plotter.add_process(fixture.process(ProcessTemplate::new("bkg").with_color(4), "bkg.json", "bkg"));
    plotter.add_process(fixture.process(
        ProcessTemplate::new("data")
            .with_role(Role::PointOverlay)
            .with_color(12),
        "data.json",
        "data",
    ));
    plotter
}

fn canned_sig_bkg_data() -> CannedEngine {
    CannedEngine::default()
        .with_rows("sig", &unit_rows(3))
        .with_rows("bkg", &unit_rows(4))
        .with_rows("data", &unit_rows(7))
}

#[test]
fn test_stack_band_and_ratio() {
    let fixture = Fixture::new();
    let mut plotter = sig_bkg_data(&fixture);
    let panel = Panel::new("Data / Pred.", 0.5, 1.5)
        .with_element(
            PanelElement::new(vec![Source::parse("stack")], Arc::new(ErrorBand))
                .unwrap()
                .with_role(Role::Stacked)
                .with_color(920),
        )
        .with_element(
            PanelElement::new(
                vec![Source::parse("data"), Source::parse("stack")],
                Arc::new(Divide::default()),
            )
            .unwrap(),
        )
        .with_reference_lines(&[1.0], &[1], fixture.diag.as_ref());
    plotter.add_histogram(HistogramSpec::new("h", "x", one_bin(), "x").with_panel(panel));

    let mut engine = canned_sig_bkg_data();
    let mut sink = MemorySink::default();
    let output = plotter.run(&mut engine, &mut sink).unwrap();

    assert_eq!(engine.runs, 1);
    assert_eq!(output.plots.len(), 1);
    let plot = &output.plots[0];
    assert_eq!(plot.stem(), "h_nominal");

    let stack: Vec<&str> = plot
        .composition
        .stack
        .iter()
        .map(|l| l.template.name.as_str())
        .collect();
    assert_eq!(stack, vec!["sig", "bkg"]);
    let total = plot.composition.stack_total.as_ref().unwrap();
    assert_relative_eq!(total.bin_content(1), 7.0);
    assert_relative_eq!(total.bin_variance(1), 7.0);
    assert_relative_eq!(plot.range.y_max.unwrap(), 7.0 * 1.4, epsilon = 1e-12);

    let panel = plot.panel.as_ref().unwrap();
    let band = panel.outputs[0].histogram.as_ref().unwrap();
    assert_relative_eq!(band.bin_content(1), 1.0);
    assert_relative_eq!(band.bin_error(1), 0.378, epsilon = 1e-3);
    assert_eq!(panel.outputs[0].color, 920);

    let ratio = panel.outputs[1].histogram.as_ref().unwrap();
    assert_relative_eq!(ratio.bin_content(1), 1.0);
    // Color defaults to the first input's process color.
    assert_eq!(panel.outputs[1].color, 12);
    assert_eq!(panel.reference_lines.len(), 1);

    assert_eq!(fixture.diag.error_count(), 0);
}

#[test]
fn test_stack_band_and_ratio_every_bin() {
    let fixture = Fixture::new();
    let mut plotter = sig_bkg_data(&fixture);
    let binning = Binning::uniform(10, 0.0, 10.0).unwrap();
    let panel = Panel::new("Data / Pred.", 0.5, 1.5)
        .with_element(
            PanelElement::new(vec![Source::parse("stack")], Arc::new(ErrorBand))
                .unwrap()
                .with_role(Role::Stacked),
        )
        .with_element(
            PanelElement::new(
                vec![Source::parse("data"), Source::parse("stack")],
                Arc::new(Divide::default()),
            )
            .unwrap(),
        );
    plotter.add_histogram(HistogramSpec::new("h", "x", binning.clone(), "x").with_panel(panel));

    let flat = |value: f64| Histogram::from_bins(binning.clone(), &[value; 10], &[value; 10]).unwrap();
    let mut engine = CannedEngine::default()
        .with_histogram("sig", flat(5.0))
        .with_histogram("bkg", flat(2.0))
        .with_histogram("data", flat(7.0));
    let output = plotter
        .run(&mut engine, &mut MemorySink::default())
        .unwrap();

    let plot = &output.plots[0];
    let total = plot.composition.stack_total.as_ref().unwrap();
    assert_relative_eq!(plot.range.y_max.unwrap(), 7.0 * 1.4, epsilon = 1e-12);

    let panel = plot.panel.as_ref().unwrap();
    let band = panel.outputs[0].histogram.as_ref().unwrap();
    let ratio = panel.outputs[1].histogram.as_ref().unwrap();
    let band_error = 7.0_f64.sqrt() / 7.0;
    for bin in 1..=10 {
        assert_relative_eq!(total.bin_content(bin), 7.0);
        assert_relative_eq!(total.bin_variance(bin), 7.0);
        assert_relative_eq!(band.bin_content(bin), 1.0);
        assert_relative_eq!(band.bin_error(bin), band_error, epsilon = 1e-12);
        assert_relative_eq!(ratio.bin_content(bin), 1.0);
    }
    assert_relative_eq!(band.bin_content(0), 0.0);
    assert_relative_eq!(band.bin_content(11), 0.0);
    assert_eq!(fixture.diag.error_count(), 0);
}

#[test]
fn test_persisted_keys_in_registration_order() {
    let fixture = Fixture::new();
    let mut plotter = sig_bkg_data(&fixture);
    plotter.add_region(Region::new("sr", ""));
    plotter.add_region(Region::new("cr", "").with_processes(NameFilter::exclude(["data"])));
    plotter.add_histogram(HistogramSpec::new("h", "x", one_bin(), "x"));

    let mut sink = MemorySink::default();
    plotter
        .run(&mut canned_sig_bkg_data(), &mut sink)
        .unwrap();

    let keys: Vec<String> = sink.entries.iter().map(|(k, _)| k.to_string()).collect();
    assert_eq!(
        keys,
        vec!["h_sr_sig", "h_sr_bkg", "h_sr_data", "h_cr_sig", "h_cr_bkg"]
    );
}

#[test]
fn test_duplicate_process_merges_and_warns_once() {
    let fixture = Fixture::new();
    let mut plotter = fixture.plotter();
    plotter.add_process(fixture.process(ProcessTemplate::new("mc").with_color(2), "a.json", "a"));
    plotter.add_process(fixture.process(ProcessTemplate::new("mc").with_color(3), "b.json", "b"));
    plotter.add_histogram(HistogramSpec::new("h", "x", one_bin(), "x"));

    let mut engine = CannedEngine::default()
        .with_rows("a", &[(0.5, 0.0, 2.0)])
        .with_rows("b", &[(0.5, 0.0, 3.0)]);
    let output = plotter.run(&mut engine, &mut MemorySink::default()).unwrap();

    assert_eq!(fixture.diag.warning_count(), 1);
    assert_eq!(plotter.registry().template("mc").unwrap().color, 2);
    let mc = &output.merged["h"]["nominal"]["mc"];
    assert_relative_eq!(mc.bin_content(1), 5.0);
    assert_relative_eq!(mc.bin_variance(1), 13.0);
}

#[test]
fn test_failed_fill_is_reported_and_skipped() {
    let fixture = Fixture::new();
    let mut plotter = sig_bkg_data(&fixture);
    plotter.add_histogram(HistogramSpec::new("h", "x", one_bin(), "x"));

    let mut engine = CannedEngine::default()
        .with_rows("sig", &unit_rows(3))
        .with_rows("bkg", &unit_rows(4));
    let output = plotter.run(&mut engine, &mut MemorySink::default()).unwrap();

    // One error for the failed fill, one for the consistency check.
    assert_eq!(fixture.diag.error_count(), 2);
    let plot = &output.plots[0];
    assert!(plot.composition.overlay.is_empty());
    assert_relative_eq!(
        plot.composition.stack_total.as_ref().unwrap().integral(),
        7.0
    );
}

#[test]
fn test_filters_weights_and_folding() {
    let fixture = Fixture::new();
    let mut plotter = fixture.plotter();
    plotter.add_process(fixture.process(ProcessTemplate::new("mc"), "mc.json", "mc"));
    plotter.add_process(
        fixture
            .process(
                ProcessTemplate::new("data").with_role(Role::PointOverlay),
                "data.json",
                "data",
            )
            .with_weight("2"),
    );
    plotter.add_region(Region::new("sr", "tree==mc"));
    plotter.add_region(
        Region::new("empty", "").with_processes(NameFilter::include(["nothing"])),
    );
    plotter.add_histogram(
        HistogramSpec::new("h", "x", Binning::uniform(2, 0.0, 2.0).unwrap(), "x")
            .with_folding(FlowFolding::both()),
    );

    let mut engine = CannedEngine::default()
        .with_rows("mc", &[(-1.0, 0.0, 1.0), (0.5, 0.0, 1.0), (5.0, 0.0, 1.0)])
        .with_rows("data", &[(1.5, 0.0, 1.0)]);
    let output = plotter.run(&mut engine, &mut MemorySink::default()).unwrap();

    let warnings = fixture.diag.at_level(Level::Warn);
    assert_eq!(warnings.len(), 1, "{:?}", warnings);
    assert!(warnings[0].message.contains("empty"));
    assert_eq!(engine.booked.len(), 2);
    assert_eq!(engine.booked[1].weight, "2");
    assert_eq!(engine.booked[0].weight, "1");

    let sr = &output.merged["h"]["sr"];
    assert_relative_eq!(sr["mc"].bin_content(0), 0.0);
    assert_relative_eq!(sr["mc"].bin_content(1), 2.0);
    assert_relative_eq!(sr["mc"].bin_content(2), 1.0);
    assert_relative_eq!(sr["mc"].bin_content(3), 0.0);
    // Selection rejects data rows in "sr".
    assert_relative_eq!(sr["data"].integral(), 0.0);
    assert_eq!(output.plots.len(), 1);
}

#[test]
fn test_2d_plots_per_process() {
    let fixture = Fixture::new();
    let mut plotter = sig_bkg_data(&fixture);
    let binning = Binning::uniform(2, 0.0, 2.0).unwrap();
    plotter.add_histogram(
        HistogramSpec::new_2d("xy", ("x", "y"), (binning.clone(), binning), "x", "y")
            .with_folding(FlowFolding::both()),
    );

    let mut engine = CannedEngine::default()
        .with_rows("sig", &[(0.5, 1.5, 1.0), (3.0, 0.5, 1.0)])
        .with_rows("bkg", &[(1.5, 1.5, 2.0)])
        .with_rows("data", &[(0.5, 0.5, 1.0)]);
    let mut sink = MemorySink::default();
    let output = plotter.run(&mut engine, &mut sink).unwrap();

    assert!(output.plots.is_empty());
    let stems: Vec<String> = output.plots_2d.iter().map(|p| p.stem()).collect();
    assert_eq!(stems, vec!["xy_nominal_sig", "xy_nominal_bkg", "xy_nominal_data"]);

    let sig = &output.plots_2d[0].data;
    // 2D histograms are never folded: the overflow entry stays out of range.
    assert_relative_eq!(sig.integral(), 1.0);
    assert_relative_eq!(sig.bin_content(2 * 4 + 1), 1.0);
    assert_eq!(sink.entries.len(), 3);
}
