//! histstack CLI: Produce stacked, overlaid and ratio plots from a JSON
//! plot configuration.
//!
//! `histstack run` fills every configured histogram in one batched pass,
//! writes the merged histograms and a `plots.json` render manifest.
//! `histstack inspect` summarizes a merged histogram or dataset file.
#![allow(clippy::uninlined_format_args)]

mod config;

use clap::{Parser, Subcommand};
use histstack_core::{Histogram, HistogramKey, HistogramSink, LogDiagnostics};
use histstack_io::{ColumnarFillEngine, Dataset, Manifest, MANIFEST_FILE};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

use config::PlotConfig;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    HiststackIo(#[from] histstack_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] histstack_core::Error),

    #[error("Configuration error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Histogram aggregation and plot composition.
#[derive(Parser)]
#[command(name = "histstack")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fill, merge and compose every histogram of a plot configuration
    Run {
        /// JSON plot configuration
        #[arg(short, long)]
        config: PathBuf,

        /// Output directory (overrides the configuration)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Worker threads for the fill pass (0 = all cores)
        #[arg(short, long)]
        threads: Option<usize>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show the contents of a merged histogram file or a dataset
    Inspect {
        /// Input file
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            output_dir,
            threads,
            verbose,
        } => {
            init_logging(verbose);
            run(&config, output_dir, threads)
        }
        Commands::Inspect { input } => {
            init_logging(false);
            inspect(&input)
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn run(config_path: &Path, output_dir: Option<PathBuf>, threads: Option<usize>) -> Result<()> {
    let start = Instant::now();
    let config = PlotConfig::load(config_path)?;
    let output_dir = output_dir
        .or_else(|| config.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from("plots"));

    if output_dir.exists() {
        log::warn!(
            "output directory {} already exists; existing outputs will be overwritten",
            output_dir.display()
        );
    }
    std::fs::create_dir_all(&output_dir)?;

    let plotter = config.build(LogDiagnostics::shared())?;
    let mut engine = ColumnarFillEngine::new().with_threads(threads.unwrap_or(config.threads))?;
    let mut sink = merged_sink(&output_dir);

    let output = plotter.run(&mut engine, sink.as_mut())?;

    let manifest_path = output_dir.join(MANIFEST_FILE);
    Manifest::from_run(&output).write(&manifest_path)?;

    log::info!(
        "wrote {} plots and {} 2D plots to {} in {:.2}s",
        output.plots.len(),
        output.plots_2d.len(),
        output_dir.display(),
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

#[cfg(feature = "hdf5")]
fn merged_sink(output_dir: &Path) -> Box<dyn HistogramSink> {
    Box::new(histstack_io::Hdf5Sink::new(
        output_dir.join(histstack_io::MERGED_FILE),
    ))
}

#[cfg(not(feature = "hdf5"))]
fn merged_sink(output_dir: &Path) -> Box<dyn HistogramSink> {
    Box::new(histstack_io::JsonSink::new(
        output_dir.join(histstack_io::MERGED_JSON_FILE),
    ))
}

fn inspect(input: &Path) -> Result<()> {
    let extension = input
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase);

    match extension.as_deref() {
        Some("h5" | "hdf5") => print_merged(input, &read_hdf5(input)?),
        _ => match histstack_io::read_merged_json(input) {
            Ok(merged) => print_merged(input, &merged),
            Err(_) => print_dataset(&Dataset::open(input)?),
        },
    }
    Ok(())
}

#[cfg(feature = "hdf5")]
fn read_hdf5(input: &Path) -> Result<BTreeMap<HistogramKey, Histogram>> {
    Ok(histstack_io::read_merged_hdf5(input)?)
}

#[cfg(not(feature = "hdf5"))]
fn read_hdf5(_input: &Path) -> Result<BTreeMap<HistogramKey, Histogram>> {
    Err(CliError::Config(
        "HDF5 support is disabled in this build".to_string(),
    ))
}

fn print_merged(input: &Path, merged: &BTreeMap<HistogramKey, Histogram>) {
    println!("File: {}", input.display());
    println!("Histograms: {}", merged.len());
    println!(
        "{:<40} | {:>4} | {:>6} | {:>14}",
        "Key", "Dim", "Bins", "Integral"
    );
    println!("{:-<74}", "");
    for (key, hist) in merged {
        let dim = if hist.is_2d() { "2D" } else { "1D" };
        println!(
            "{:<40} | {:>4} | {:>6} | {:>14.4}",
            key.to_string(),
            dim,
            hist.in_range_slots().len(),
            hist.integral()
        );
    }
}

fn print_dataset(dataset: &Dataset) {
    println!("Dataset: {}", dataset.path().display());
    for name in dataset.tree_names() {
        if let Ok(table) = dataset.tree(name) {
            println!("  {}: {} rows", name, table.rows());
        }
    }
}
