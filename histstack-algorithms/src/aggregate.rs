//! Merging of raw fill fragments into canonical per-process histograms.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use histstack_core::{Diagnostics, FlowFolding, Histogram};

const COMPONENT: &str = "aggregator";

/// Canonical histograms of one region, keyed by process name.
pub type ProcessHistograms = BTreeMap<String, Histogram>;

/// Canonical histograms of one specification: region → process → histogram.
pub type MergedHistograms = BTreeMap<String, ProcessHistograms>;

/// Process names expected per region.
pub type ExpectedProcesses = BTreeMap<String, BTreeSet<String>>;

/// One raw fill result for a (region, process) pair of a specification.
#[derive(Debug, Clone)]
pub struct Fragment {
    /// Region the fill ran in.
    pub region: String,
    /// Process name (several datasets may share it).
    pub process: String,
    /// Filled histogram.
    pub histogram: Histogram,
}

impl Fragment {
    /// Creates a fragment.
    #[must_use]
    pub fn new(region: impl Into<String>, process: impl Into<String>, histogram: Histogram) -> Self {
        Self {
            region: region.into(),
            process: process.into(),
            histogram,
        }
    }
}

/// Merges fragments and post-processes the canonical histograms.
pub struct Aggregator {
    diagnostics: Arc<dyn Diagnostics>,
}

impl Aggregator {
    /// Creates an aggregator reporting to `diagnostics`.
    #[must_use]
    pub fn new(diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self { diagnostics }
    }

    /// Groups fragments by (region, process) and sums each group.
    ///
    /// The first fragment of a group becomes the running total and later
    /// ones are added bin by bin. A fragment whose binning disagrees with
    /// the running total is reported and skipped.
    pub fn merge<I>(&self, histogram: &str, fragments: I) -> MergedHistograms
    where
        I: IntoIterator<Item = Fragment>,
    {
        let mut merged = MergedHistograms::new();
        for fragment in fragments {
            let region = merged.entry(fragment.region.clone()).or_default();
            match region.get_mut(&fragment.process) {
                None => {
                    region.insert(fragment.process, fragment.histogram);
                }
                Some(total) => {
                    if let Err(err) = total.add(&fragment.histogram) {
                        self.diagnostics.error(
                            COMPONENT,
                            &format!(
                                "{histogram}: skipping fragment of '{}' in region '{}': {err}",
                                fragment.process, fragment.region
                            ),
                        );
                    }
                }
            }
        }
        merged
    }

    /// Compares merged process sets against the expected ones.
    ///
    /// Every missing or unexpected process and every missing region is
    /// reported as an error. Returns true when everything matches.
    pub fn check_consistency(
        &self,
        histogram: &str,
        merged: &MergedHistograms,
        expected: &ExpectedProcesses,
    ) -> bool {
        let mut consistent = true;
        for (region, names) in expected {
            let Some(found) = merged.get(region) else {
                self.diagnostics.error(
                    COMPONENT,
                    &format!("{histogram}: region '{region}' produced no histograms"),
                );
                consistent = false;
                continue;
            };
            let found: BTreeSet<&String> = found.keys().collect();
            let wanted: BTreeSet<&String> = names.iter().collect();
            if found != wanted {
                let missing: Vec<&str> = wanted.difference(&found).map(|s| s.as_str()).collect();
                let extra: Vec<&str> = found.difference(&wanted).map(|s| s.as_str()).collect();
                self.diagnostics.error(
                    COMPONENT,
                    &format!(
                        "{histogram}: region '{region}' process mismatch (missing {missing:?}, unexpected {extra:?})"
                    ),
                );
                consistent = false;
            }
        }
        for region in merged.keys().filter(|r| !expected.contains_key(*r)) {
            self.diagnostics.error(
                COMPONENT,
                &format!("{histogram}: unexpected region '{region}'"),
            );
            consistent = false;
        }
        consistent
    }

    /// Folds flow slots of every canonical histogram into the edge bins.
    pub fn fold_flows(&self, histogram: &str, merged: &mut MergedHistograms, folding: FlowFolding) {
        if folding.is_none() {
            return;
        }
        for hist in merged.values_mut().flat_map(BTreeMap::values_mut) {
            hist.fold_flows(folding);
        }
        self.diagnostics.debug(
            COMPONENT,
            &format!(
                "{histogram}: folded underflow={} overflow={}",
                folding.underflow, folding.overflow
            ),
        );
    }
}
