//! Columnar datasets read through memory-mapped files.
//!
//! A dataset file is a JSON object of named trees, each an object of
//! equally long numeric columns:
//!
//! ```json
//! { "events": { "lep_pt": [31.2, 54.0], "weight": [1.0, 0.9] } }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::{Error, Result};

/// A read-only memory-mapped file.
pub struct MappedFile {
    mmap: Mmap,
    path: PathBuf,
}

impl MappedFile {
    /// Maps `path` for reading.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or mapped, or is empty.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        if file.metadata()?.len() == 0 {
            return Err(Error::InvalidFormat(format!(
                "{} is empty",
                path.as_ref().display()
            )));
        }
        // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self {
            mmap,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// File contents.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap[..]
    }

    /// Mapped path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Equally long named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: HashMap<String, Vec<f64>>,
    rows: usize,
}

impl Table {
    /// Builds a table, checking that every column has the same length.
    ///
    /// # Errors
    /// Returns [`Error::InvalidFormat`] on ragged columns.
    pub fn from_columns(columns: HashMap<String, Vec<f64>>) -> Result<Self> {
        let rows = columns.values().map(Vec::len).next().unwrap_or(0);
        if let Some((name, column)) = columns.iter().find(|(_, c)| c.len() != rows) {
            return Err(Error::InvalidFormat(format!(
                "column '{name}' has {} rows, expected {rows}",
                column.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    /// Number of rows.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Column values by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }
}

/// A dataset file holding one or more trees.
#[derive(Debug, Clone)]
pub struct Dataset {
    path: PathBuf,
    trees: HashMap<String, Table>,
}

impl Dataset {
    /// Maps and parses the dataset at `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be mapped, is not valid JSON of
    /// the expected shape, or has ragged columns.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mapped = MappedFile::open(&path)?;
        let raw: HashMap<String, HashMap<String, Vec<f64>>> =
            serde_json::from_slice(mapped.as_bytes())?;
        let trees = raw
            .into_iter()
            .map(|(name, columns)| {
                Table::from_columns(columns)
                    .map(|table| (name.clone(), table))
                    .map_err(|e| Error::InvalidFormat(format!("tree '{name}': {e}")))
            })
            .collect::<Result<HashMap<_, _>>>()?;
        Ok(Self {
            path: mapped.path().to_path_buf(),
            trees,
        })
    }

    /// Source path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Looks up a tree.
    ///
    /// # Errors
    /// Returns [`Error::MissingData`] if the tree does not exist.
    pub fn tree(&self, name: &str) -> Result<&Table> {
        self.trees.get(name).ok_or_else(|| {
            Error::MissingData(format!("tree '{name}' in {}", self.path.display()))
        })
    }

    /// Tree names, sorted.
    #[must_use]
    pub fn tree_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.trees.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Columns of one tree, keyed by column name.
pub type Columns = BTreeMap<String, Vec<f64>>;

/// Writes trees in the dataset file format.
///
/// # Errors
/// Returns an error if the file cannot be written.
pub fn write_dataset<P: AsRef<Path>>(path: P, trees: &BTreeMap<String, Columns>) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, trees)?;
    writer.flush()?;
    Ok(())
}
