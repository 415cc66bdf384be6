use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use approx::assert_relative_eq;
use histstack_algorithms::{Divide, ErrorBand, Plotter};
use histstack_core::{
    Binning, HistogramSpec, Panel, PanelElement, Process, ProcessTemplate, RecordingDiagnostics,
    Region, Role, Source,
};
use histstack_io::{
    read_merged_json, write_dataset, ColumnarFillEngine, Columns, JsonSink, Manifest,
    MANIFEST_FILE, MERGED_JSON_FILE,
};
use tempfile::TempDir;

fn write_events(path: &Path, x: &[f64], w: &[f64]) {
    let mut columns = Columns::new();
    columns.insert("x".to_string(), x.to_vec());
    columns.insert("w".to_string(), w.to_vec());
    let mut trees = BTreeMap::new();
    trees.insert("events".to_string(), columns);
    write_dataset(path, &trees).unwrap();
}

fn plotter(dir: &TempDir, diag: Arc<RecordingDiagnostics>) -> Plotter {
    let sig = dir.path().join("sig.json");
    let bkg = dir.path().join("bkg.json");
    let data = dir.path().join("data.json");
    write_events(&sig, &[0.5, 0.5, 0.5, 1.5], &[1.0, 1.0, 1.0, 1.0]);
    write_events(&bkg, &[0.5, 0.5, 1.5, -3.0], &[2.0, 2.0, 1.0, 1.0]);
    write_events(&data, &[0.5; 7], &[1.0; 7]);

    let mut plotter = Plotter::new("w", diag);
    plotter.add_process(
        Process::new(ProcessTemplate::new("sig").with_color(2), &sig, "events").unwrap(),
    );
    plotter.add_process(
        Process::new(ProcessTemplate::new("bkg").with_color(4), &bkg, "events").unwrap(),
    );
    plotter.add_process(
        Process::new(
            ProcessTemplate::new("data")
                .with_role(Role::PointOverlay)
                .with_color(1),
            &data,
            "events",
        )
        .unwrap()
        .with_weight("1"),
    );
    plotter.add_region(Region::new("low", "x < 1"));
    plotter
}

fn ratio_panel(diag: &RecordingDiagnostics) -> Panel {
    Panel::new("Data / Pred.", 0.5, 1.5)
        .with_element(
            PanelElement::new(vec![Source::parse("stack")], Arc::new(ErrorBand))
                .unwrap()
                .with_color(920),
        )
        .with_element(
            PanelElement::new(
                vec![Source::parse("data"), Source::parse("stack")],
                Arc::new(Divide::default()),
            )
            .unwrap(),
        )
        .with_reference_lines(&[1.0], &[1], diag)
}

#[test]
fn test_json_datasets_to_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let diag = Arc::new(RecordingDiagnostics::new());
    let mut plotter = plotter(&dir, diag.clone());
    plotter.add_histogram(
        HistogramSpec::new("x", "x", Binning::uniform(1, 0.0, 1.0).unwrap(), "x [GeV]")
            .with_panel(ratio_panel(&diag)),
    );

    let mut engine = ColumnarFillEngine::new().with_threads(2).unwrap();
    let mut sink = JsonSink::new(dir.path().join(MERGED_JSON_FILE));
    let output = plotter.run(&mut engine, &mut sink).unwrap();
    assert_eq!(diag.error_count(), 0, "{:?}", diag.records());

    let merged = read_merged_json(sink.path()).unwrap();
    let keys: Vec<String> = merged.keys().map(ToString::to_string).collect();
    assert_eq!(keys, vec!["x_low_bkg", "x_low_data", "x_low_sig"]);

    let manifest_path = dir.path().join(MANIFEST_FILE);
    Manifest::from_run(&output).write(&manifest_path).unwrap();
    let manifest = Manifest::read(&manifest_path).unwrap();

    assert_eq!(manifest.plots.len(), 1);
    let plot = &manifest.plots[0];
    assert_eq!(plot.name, "x_low");
    let stack: Vec<&str> = plot.stack.iter().map(|l| l.process.as_str()).collect();
    assert_eq!(stack, vec!["sig", "bkg"]);
    assert_eq!(plot.overlay[0].role, "points");

    let total = plot.stack_total.as_ref().unwrap().to_histogram().unwrap();
    assert_relative_eq!(total.bin_content(1), 7.0);
    assert_relative_eq!(plot.y_max.unwrap(), 9.8, epsilon = 1e-12);

    let panel = plot.panel.as_ref().unwrap();
    assert_eq!(panel.elements[0].color, 920);
    let ratio = panel.elements[1]
        .histogram
        .as_ref()
        .unwrap()
        .to_histogram()
        .unwrap();
    assert_relative_eq!(ratio.bin_content(1), 1.0);
    assert_eq!(panel.elements[1].color, 1);
    assert_eq!(panel.reference_lines.len(), 1);
}

#[test]
fn test_missing_column_skips_process() {
    let dir = tempfile::tempdir().unwrap();
    let diag = Arc::new(RecordingDiagnostics::new());
    let mut plotter = plotter(&dir, diag.clone());
    plotter.add_histogram(HistogramSpec::new(
        "pt",
        "lep_pt",
        Binning::uniform(1, 0.0, 1.0).unwrap(),
        "pt",
    ));

    let mut engine = ColumnarFillEngine::new();
    let mut sink = JsonSink::new(dir.path().join(MERGED_JSON_FILE));
    let output = plotter.run(&mut engine, &mut sink).unwrap();

    assert!(diag.error_count() >= 3);
    assert!(output.merged["pt"].get("low").is_none());
    assert!(output.plots.is_empty());
}
