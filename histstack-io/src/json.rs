//! JSON persistence of canonical merged histograms, for builds without HDF5.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use histstack_core::{Histogram, HistogramKey, HistogramSink};
use serde::{Deserialize, Serialize};

use crate::manifest::HistogramRecord;
use crate::{Error, Result};

/// File name of the merged histogram file inside the output directory.
pub const MERGED_JSON_FILE: &str = "merged_histograms.json";

const FORMAT_VERSION: &str = "1.0";

#[derive(Serialize, Deserialize)]
struct MergedFile {
    histstack_format_version: String,
    histograms: Vec<MergedEntry>,
}

#[derive(Serialize, Deserialize)]
struct MergedEntry {
    key: String,
    histogram: String,
    region: String,
    process: String,
    #[serde(flatten)]
    data: HistogramRecord,
}

/// Sink writing every canonical histogram of a run to one JSON file.
#[derive(Debug, Clone)]
pub struct JsonSink {
    path: PathBuf,
}

impl JsonSink {
    /// Creates a sink writing to `path`. The file is replaced on persist.
    #[must_use]
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Output path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `entries` to the file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn write(&self, entries: &[(HistogramKey, &Histogram)]) -> Result<()> {
        let merged = MergedFile {
            histstack_format_version: FORMAT_VERSION.to_string(),
            histograms: entries
                .iter()
                .map(|(key, hist)| MergedEntry {
                    key: key.to_string(),
                    histogram: key.histogram.clone(),
                    region: key.region.clone(),
                    process: key.process.clone(),
                    data: HistogramRecord::from(*hist),
                })
                .collect(),
        };
        let mut writer = BufWriter::new(File::create(&self.path)?);
        serde_json::to_writer(&mut writer, &merged)?;
        writer.flush()?;
        Ok(())
    }
}

impl HistogramSink for JsonSink {
    fn persist(&mut self, entries: &[(HistogramKey, &Histogram)]) -> histstack_core::Result<()> {
        self.write(entries).map_err(Error::into_persistence_error)
    }
}

/// Reads every histogram written by [`JsonSink`].
///
/// # Errors
/// Returns an error if the file cannot be read or parsed, or holds invalid
/// histograms.
pub fn read_merged_json<P: AsRef<Path>>(path: P) -> Result<BTreeMap<HistogramKey, Histogram>> {
    let bytes = std::fs::read(path)?;
    let merged: MergedFile = serde_json::from_slice(&bytes)?;
    merged
        .histograms
        .into_iter()
        .map(|entry| {
            let key = HistogramKey::new(entry.histogram, entry.region, entry.process);
            Ok((key, entry.data.to_histogram()?))
        })
        .collect()
}
