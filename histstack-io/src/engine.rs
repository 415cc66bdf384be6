//! Batched fill engine over columnar datasets.

use std::collections::HashMap;
use std::path::PathBuf;

use histstack_core::{Axes, FillEngine, FillHandle, FillRequest, Histogram};
use rayon::prelude::*;

use crate::expr::{truthy, BoundExpression, Expression};
use crate::{Dataset, Error, Result, Table};

struct Booked {
    request: FillRequest,
    selection: Option<Expression>,
    weight: Expression,
    variables: Vec<Expression>,
}

impl Booked {
    fn compile(request: FillRequest) -> Result<Self> {
        let dims = match request.axes {
            Axes::One(_) => 1,
            Axes::Two { .. } => 2,
        };
        if request.variables.len() != dims {
            return Err(Error::InvalidFormat(format!(
                "{dims}D fill needs {dims} variable(s), got {}",
                request.variables.len()
            )));
        }
        let selection = if request.selection.trim().is_empty() {
            None
        } else {
            Some(Expression::compile(&request.selection)?)
        };
        let weight = Expression::compile(&request.weight)?;
        let variables = request
            .variables
            .iter()
            .map(|v| Expression::compile(v))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            request,
            selection,
            weight,
            variables,
        })
    }

    fn fill(&self, dataset: &Dataset) -> Result<Histogram> {
        let table = dataset.tree(&self.request.dataset.tree)?;
        let selection = self
            .selection
            .as_ref()
            .map(|expr| bind(expr, table))
            .transpose()?;
        let weight = bind(&self.weight, table)?;
        let variables = self
            .variables
            .iter()
            .map(|expr| bind(expr, table))
            .collect::<Result<Vec<_>>>()?;

        let mut hist = Histogram::with_axes(self.request.axes.clone());
        for row in 0..table.rows() {
            if let Some(selection) = &selection {
                if !truthy(selection.at(row)) {
                    continue;
                }
            }
            let w = weight.at(row);
            match variables.as_slice() {
                [x] => hist.fill(x.at(row), w),
                [x, y] => hist.fill_2d(x.at(row), y.at(row), w),
                _ => {
                    return Err(Error::InvalidFormat(format!(
                        "unsupported variable count {}",
                        variables.len()
                    )))
                }
            }
        }
        Ok(hist)
    }
}

fn bind<'a>(expr: &'a Expression, table: &'a Table) -> Result<BoundExpression<'a>> {
    expr.bind(|name| table.column(name))
}

/// Fill engine reading JSON columnar datasets.
///
/// Fills are compiled when booked and realized together by
/// [`FillEngine::run`], which loads every referenced dataset once and fills
/// all histograms in parallel. Handles restart from zero after each run.
#[derive(Default)]
pub struct ColumnarFillEngine {
    booked: Vec<Booked>,
    datasets: HashMap<PathBuf, Dataset>,
    pool: Option<rayon::ThreadPool>,
}

impl ColumnarFillEngine {
    /// Creates an engine using the global rayon pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs fills on a dedicated pool of `threads` workers; 0 keeps the
    /// global pool.
    ///
    /// # Errors
    /// Returns [`Error::ThreadPool`] if the pool cannot be built.
    pub fn with_threads(mut self, threads: usize) -> Result<Self> {
        if threads > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| Error::ThreadPool(e.to_string()))?;
            self.pool = Some(pool);
        }
        Ok(self)
    }

    /// Number of fills waiting for the next run.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.booked.len()
    }

    fn load_datasets(&mut self) -> HashMap<PathBuf, String> {
        let mut missing: Vec<PathBuf> = self
            .booked
            .iter()
            .map(|b| b.request.dataset.path.clone())
            .filter(|path| !self.datasets.contains_key(path))
            .collect();
        missing.sort();
        missing.dedup();

        let loaded: Vec<(PathBuf, Result<Dataset>)> = missing
            .into_par_iter()
            .map(|path| {
                let dataset = Dataset::open(&path);
                (path, dataset)
            })
            .collect();

        let mut failures = HashMap::new();
        for (path, dataset) in loaded {
            match dataset {
                Ok(dataset) => {
                    self.datasets.insert(path, dataset);
                }
                Err(err) => {
                    failures.insert(path, err.to_string());
                }
            }
        }
        failures
    }
}

impl FillEngine for ColumnarFillEngine {
    fn book(&mut self, request: FillRequest) -> histstack_core::Result<FillHandle> {
        let booked = Booked::compile(request).map_err(Error::into_fill_error)?;
        self.booked.push(booked);
        Ok(FillHandle(self.booked.len() - 1))
    }

    fn run(&mut self) -> Vec<histstack_core::Result<Histogram>> {
        let failures = self.load_datasets();
        let booked = std::mem::take(&mut self.booked);
        let datasets = &self.datasets;

        let fill_all = || -> Vec<histstack_core::Result<Histogram>> {
            booked
                .par_iter()
                .map(|b| {
                    let path = &b.request.dataset.path;
                    let dataset = datasets.get(path).ok_or_else(|| {
                        let reason = failures
                            .get(path)
                            .map_or("not loaded", String::as_str);
                        histstack_core::Error::FillError(format!(
                            "{}: {reason}",
                            b.request.dataset
                        ))
                    })?;
                    b.fill(dataset).map_err(Error::into_fill_error)
                })
                .collect()
        };

        match &self.pool {
            Some(pool) => pool.install(fill_all),
            None => fill_all(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{write_dataset, Columns};
    use approx::assert_relative_eq;
    use histstack_core::{Binning, DatasetRef};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn dataset(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("events.json");
        let mut columns = Columns::new();
        columns.insert("pt".into(), vec![5.0, 15.0, 25.0, 35.0]);
        columns.insert("eta".into(), vec![0.5, -0.5, 1.5, 3.0]);
        columns.insert("w".into(), vec![1.0, 2.0, 0.5, 1.0]);
        let mut trees = BTreeMap::new();
        trees.insert("events".to_string(), columns);
        write_dataset(&path, &trees).unwrap();
        path
    }

    fn request(path: PathBuf, selection: &str, variables: &[&str], axes: Axes) -> FillRequest {
        FillRequest {
            dataset: DatasetRef {
                path,
                tree: "events".into(),
            },
            selection: selection.into(),
            weight: "w".into(),
            variables: variables.iter().map(|v| (*v).to_string()).collect(),
            axes,
        }
    }

    #[test]
    fn test_batched_fill() {
        let dir = tempfile::tempdir().unwrap();
        let path = dataset(&dir);
        let binning = Binning::uniform(2, 0.0, 40.0).unwrap();
        let mut engine = ColumnarFillEngine::new().with_threads(2).unwrap();

        let all = engine
            .book(request(path.clone(), "", &["pt"], Axes::One(binning.clone())))
            .unwrap();
        let central = engine
            .book(request(
                path.clone(),
                "abs(eta) < 2.5",
                &["pt"],
                Axes::One(binning.clone()),
            ))
            .unwrap();
        let two_d = engine
            .book(request(
                path,
                "",
                &["pt", "eta"],
                Axes::Two {
                    x: binning,
                    y: Binning::uniform(2, -2.0, 2.0).unwrap(),
                },
            ))
            .unwrap();
        assert_eq!(engine.pending(), 3);

        let results = engine.run();
        assert_eq!(engine.pending(), 0);
        assert_eq!(results.len(), 3);

        let all = results[all.0].as_ref().unwrap();
        assert_relative_eq!(all.bin_content(1), 3.0);
        assert_relative_eq!(all.bin_variance(1), 5.0);
        assert_relative_eq!(all.bin_content(2), 1.5);

        let central = results[central.0].as_ref().unwrap();
        assert_relative_eq!(central.bin_content(2), 0.5);

        let two_d = results[two_d.0].as_ref().unwrap();
        // pt=35, eta=3.0 lands in the y overflow row.
        assert_relative_eq!(two_d.integral(), 3.5);
    }

    #[test]
    fn test_book_rejects_bad_expressions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dataset(&dir);
        let binning = Binning::uniform(2, 0.0, 40.0).unwrap();
        let mut engine = ColumnarFillEngine::new();

        let err = engine
            .book(request(path.clone(), "pt >", &["pt"], Axes::One(binning.clone())))
            .unwrap_err();
        assert!(matches!(err, histstack_core::Error::FillError(_)));

        let err = engine
            .book(request(path, "", &["pt", "eta"], Axes::One(binning)))
            .unwrap_err();
        assert!(matches!(err, histstack_core::Error::FillError(_)));
        assert_eq!(engine.pending(), 0);
    }

    #[test]
    fn test_failed_fills_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dataset(&dir);
        let binning = Binning::uniform(2, 0.0, 40.0).unwrap();
        let mut engine = ColumnarFillEngine::new();

        engine
            .book(request(path.clone(), "", &["missing_column"], Axes::One(binning.clone())))
            .unwrap();
        let mut bad_tree = request(path.clone(), "", &["pt"], Axes::One(binning.clone()));
        bad_tree.dataset.tree = "nope".into();
        engine.book(bad_tree).unwrap();
        engine
            .book(request(dir.path().join("absent.json"), "", &["pt"], Axes::One(binning.clone())))
            .unwrap();
        engine
            .book(request(path, "", &["pt"], Axes::One(binning)))
            .unwrap();

        let results = engine.run();
        assert!(results[0].is_err());
        assert!(results[1].is_err());
        assert!(results[2].is_err());
        assert_relative_eq!(results[3].as_ref().unwrap().integral(), 4.5);
    }
}
