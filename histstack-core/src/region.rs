//! Selection regions and include/exclude name filters.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Name of the implicit region used when none is declared.
pub const NOMINAL_REGION: &str = "nominal";

/// Include/exclude filter over names.
///
/// A non-empty include list wins: only listed names pass. Otherwise names
/// on the exclude list are removed. An empty filter passes everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct NameFilter {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl NameFilter {
    /// Filter that passes everything.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Filter that passes only `names`.
    #[must_use]
    pub fn include<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            include: names.into_iter().map(Into::into).collect(),
            exclude: Vec::new(),
        }
    }

    /// Filter that removes `names`.
    #[must_use]
    pub fn exclude<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            include: Vec::new(),
            exclude: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns true if `name` passes.
    #[must_use]
    pub fn allows(&self, name: &str) -> bool {
        if !self.include.is_empty() {
            return self.include.iter().any(|n| n == name);
        }
        !self.exclude.iter().any(|n| n == name)
    }
}

/// A named event selection with optional process and histogram filters.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(deny_unknown_fields))]
pub struct Region {
    /// Region name.
    pub name: String,
    /// Boolean row filter; empty means every row passes.
    #[cfg_attr(feature = "serde", serde(default))]
    pub selection: String,
    /// Processes filled in this region.
    #[cfg_attr(feature = "serde", serde(default))]
    pub processes: NameFilter,
    /// Histograms filled in this region.
    #[cfg_attr(feature = "serde", serde(default))]
    pub histograms: NameFilter,
}

impl Region {
    /// Creates a region with the given selection.
    #[must_use]
    pub fn new(name: impl Into<String>, selection: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            selection: selection.into(),
            processes: NameFilter::all(),
            histograms: NameFilter::all(),
        }
    }

    /// The implicit always-true region.
    #[must_use]
    pub fn nominal() -> Self {
        Self::new(NOMINAL_REGION, "")
    }

    /// Sets the process filter.
    #[must_use]
    pub fn with_processes(mut self, filter: NameFilter) -> Self {
        self.processes = filter;
        self
    }

    /// Sets the histogram filter.
    #[must_use]
    pub fn with_histograms(mut self, filter: NameFilter) -> Self {
        self.histograms = filter;
        self
    }

    /// Returns true if the selection accepts every row.
    #[must_use]
    pub fn is_unfiltered(&self) -> bool {
        self.selection.trim().is_empty()
    }
}
