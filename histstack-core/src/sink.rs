//! Persistence of canonical merged histograms.

use std::fmt;

use crate::{Histogram, Result};

/// Identity of one canonical histogram: `(histogram, region, process)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HistogramKey {
    pub histogram: String,
    pub region: String,
    pub process: String,
}

impl HistogramKey {
    /// Creates a key.
    #[must_use]
    pub fn new(
        histogram: impl Into<String>,
        region: impl Into<String>,
        process: impl Into<String>,
    ) -> Self {
        Self {
            histogram: histogram.into(),
            region: region.into(),
            process: process.into(),
        }
    }
}

/// Formats as `{histogram}_{region}_{process}`, the persisted key.
impl fmt::Display for HistogramKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.histogram, self.region, self.process)
    }
}

/// Destination for the canonical histograms of a run.
pub trait HistogramSink {
    /// Writes every entry. Called once per run, after merging and folding.
    ///
    /// # Errors
    /// Returns [`crate::Error::PersistenceError`] if writing fails.
    fn persist(&mut self, entries: &[(HistogramKey, &Histogram)]) -> Result<()>;
}

/// Sink that keeps owned copies in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub entries: Vec<(HistogramKey, Histogram)>,
}

impl HistogramSink for MemorySink {
    fn persist(&mut self, entries: &[(HistogramKey, &Histogram)]) -> Result<()> {
        self.entries = entries
            .iter()
            .map(|(key, hist)| (key.clone(), (*hist).clone()))
            .collect();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_format() {
        let key = HistogramKey::new("lepton_pt", "nominal", "ttbar");
        assert_eq!(key.to_string(), "lepton_pt_nominal_ttbar");
    }
}
