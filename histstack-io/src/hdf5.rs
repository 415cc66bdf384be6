//! HDF5 persistence of canonical merged histograms.
//!
//! Layout:
//!
//! ```text
//! /                       attr histstack_format_version
//! /histograms/{h}_{r}_{p} attrs histogram, region, process
//!     content, variance   full slot storage, shape (ny+2, nx+2) for 2D
//!     x_edges [, y_edges]
//! ```

use crate::manifest::HistogramRecord;
use crate::{Error, Result};
use hdf5::types::{H5Type, VarLenUnicode};
use hdf5::{Dataset, File, Group};
use ndarray::{ArrayView, ArrayView1, IxDyn};
use histstack_core::{Histogram, HistogramKey, HistogramSink};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// File name of the merged histogram file inside the output directory.
pub const MERGED_FILE: &str = "merged_histograms.h5";

const FORMAT_VERSION: &str = "1.0";
const HISTOGRAMS_GROUP: &str = "histograms";

/// Sink writing every canonical histogram of a run to one HDF5 file.
#[derive(Debug, Clone)]
pub struct Hdf5Sink {
    path: PathBuf,
    compression: Option<u8>,
}

impl Hdf5Sink {
    /// Creates a sink writing to `path`. The file is replaced on persist.
    #[must_use]
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            compression: None,
        }
    }

    /// Enables deflate compression of the bin arrays.
    #[must_use]
    pub fn with_compression(mut self, level: u8) -> Self {
        self.compression = Some(level);
        self
    }

    /// Output path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `entries` to the file.
    ///
    /// # Errors
    /// Returns an error if HDF5 I/O fails.
    pub fn write(&self, entries: &[(HistogramKey, &Histogram)]) -> Result<()> {
        let file = File::create(&self.path)?;
        set_attr_str_file(&file, "histstack_format_version", FORMAT_VERSION)?;
        let root = file.create_group(HISTOGRAMS_GROUP)?;

        for (key, hist) in entries {
            let group = root.create_group(&key.to_string())?;
            set_attr_str_group(&group, "histogram", &key.histogram)?;
            set_attr_str_group(&group, "region", &key.region)?;
            set_attr_str_group(&group, "process", &key.process)?;
            self.write_histogram(&group, hist)?;
        }
        Ok(())
    }

    fn write_histogram(&self, group: &Group, hist: &Histogram) -> Result<()> {
        let axes = hist.axes();
        let x_slots = axes.x().n_slots();
        let shape = match axes.y() {
            Some(y) => vec![y.n_slots(), x_slots],
            None => vec![x_slots],
        };

        self.write_slots(group, "content", &shape, hist.content())?;
        self.write_slots(group, "variance", &shape, hist.variance())?;

        write_edges(group, "x_edges", axes.x().edges())?;
        if let Some(y) = axes.y() {
            write_edges(group, "y_edges", y.edges())?;
        }
        Ok(())
    }

    fn write_slots(&self, group: &Group, name: &str, shape: &[usize], data: &[f64]) -> Result<()> {
        let view = ArrayView::from_shape(IxDyn(shape), data)
            .map_err(|e| Error::InvalidFormat(format!("{name}: {e}")))?;
        let dataset = create_fixed_dataset::<f64>(group, name, shape, self.compression)?;
        dataset.write(view)?;
        Ok(())
    }
}

impl HistogramSink for Hdf5Sink {
    fn persist(&mut self, entries: &[(HistogramKey, &Histogram)]) -> histstack_core::Result<()> {
        self.write(entries).map_err(Error::into_persistence_error)
    }
}

/// Reads every histogram written by [`Hdf5Sink`].
///
/// # Errors
/// Returns an error if the file is missing, is not a histstack file, or a
/// histogram group is incomplete.
pub fn read_merged_hdf5<P: AsRef<Path>>(path: P) -> Result<BTreeMap<HistogramKey, Histogram>> {
    let file = File::open(path)?;
    if read_attr_opt_string(&file, "histstack_format_version")?.is_none() {
        return Err(Error::InvalidFormat(
            "missing histstack_format_version attribute".to_string(),
        ));
    }
    let root = file.group(HISTOGRAMS_GROUP)?;

    let mut histograms = BTreeMap::new();
    for name in root.member_names()? {
        let group = root.group(&name)?;
        let key = HistogramKey::new(
            required_attr(&group, &name, "histogram")?,
            required_attr(&group, &name, "region")?,
            required_attr(&group, &name, "process")?,
        );
        let record = HistogramRecord {
            x_edges: read_dataset_vec(&group, "x_edges")?,
            y_edges: read_dataset_vec_opt(&group, "y_edges")?,
            content: read_dataset_vec(&group, "content")?,
            variance: read_dataset_vec(&group, "variance")?,
        };
        histograms.insert(key, record.to_histogram()?);
    }
    Ok(histograms)
}

fn write_edges(group: &Group, name: &str, edges: &[f64]) -> Result<()> {
    let dataset = create_fixed_dataset::<f64>(group, name, &[edges.len()], None)?;
    dataset.write(ArrayView1::from(edges))?;
    Ok(())
}

fn create_fixed_dataset<T: H5Type>(
    group: &Group,
    name: &str,
    shape: &[usize],
    compression: Option<u8>,
) -> Result<Dataset> {
    let mut builder = group.new_dataset::<T>().shape(shape.to_vec());

    if let Some(level) = compression {
        builder = builder.chunk(shape.to_vec()).deflate(level);
    }

    Ok(builder.create(name)?)
}

fn required_attr(group: &Group, key: &str, name: &str) -> Result<String> {
    read_attr_opt_string(group, name)?
        .ok_or_else(|| Error::MissingData(format!("attribute '{name}' of {key}")))
}

fn set_attr_str_file(file: &File, name: &str, value: &str) -> Result<()> {
    let value = to_var_len_unicode(value)?;
    file.new_attr::<VarLenUnicode>()
        .create(name)?
        .write_scalar(&value)?;
    Ok(())
}

fn set_attr_str_group(group: &Group, name: &str, value: &str) -> Result<()> {
    let value = to_var_len_unicode(value)?;
    group
        .new_attr::<VarLenUnicode>()
        .create(name)?
        .write_scalar(&value)?;
    Ok(())
}

fn read_dataset_vec<T: H5Type>(group: &Group, name: &str) -> Result<Vec<T>> {
    let dataset = group.dataset(name)?;
    Ok(dataset.read_raw::<T>()?)
}

fn read_dataset_vec_opt<T: H5Type>(group: &Group, name: &str) -> Result<Option<Vec<T>>> {
    match group.dataset(name) {
        Ok(dataset) => Ok(Some(dataset.read_raw::<T>()?)),
        Err(_) => Ok(None),
    }
}

fn read_attr_opt_string(group: &Group, name: &str) -> Result<Option<String>> {
    match group.attr(name) {
        Ok(attr) => {
            let value: VarLenUnicode = attr.read_scalar()?;
            Ok(Some(value.to_string()))
        }
        Err(_) => Ok(None),
    }
}

fn to_var_len_unicode(value: &str) -> Result<VarLenUnicode> {
    VarLenUnicode::from_str(value)
        .map_err(|e| Error::InvalidFormat(format!("invalid utf-8 attribute: {e}")))
}
