//! Processes (named dataset groups) and their drawing identity.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How a process is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Role {
    /// Part of the cumulative filled stack.
    #[default]
    Stacked,
    /// Independent line series.
    LineOverlay,
    /// Independent point series.
    PointOverlay,
}

impl Role {
    /// Returns true for [`Role::Stacked`].
    #[must_use]
    pub fn is_stacked(self) -> bool {
        matches!(self, Role::Stacked)
    }

    /// Canonical configuration string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Stacked => "stacked",
            Role::LineOverlay => "line",
            Role::PointOverlay => "points",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stacked" | "stack" => Ok(Role::Stacked),
            "line" | "line_overlay" => Ok(Role::LineOverlay),
            "points" | "point" | "point_overlay" => Ok(Role::PointOverlay),
            _ => Err(Error::InvalidRole(s.to_string())),
        }
    }
}

/// Canonical identity shared by all processes with the same name.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProcessTemplate {
    /// Process name, the merge key.
    pub name: String,
    /// Legend label.
    pub label: String,
    /// Draw role.
    pub role: Role,
    /// Color token understood by the renderer.
    pub color: i32,
    /// Draw statistical error bars.
    pub error_bars: bool,
}

impl ProcessTemplate {
    /// Creates a stacked template labelled with its name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            role: Role::Stacked,
            color: 1,
            error_bars: true,
        }
    }

    /// Sets the draw role.
    #[must_use]
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// Sets the color token.
    #[must_use]
    pub fn with_color(mut self, color: i32) -> Self {
        self.color = color;
        self
    }

    /// Sets the legend label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets whether error bars are drawn.
    #[must_use]
    pub fn with_error_bars(mut self, error_bars: bool) -> Self {
        self.error_bars = error_bars;
        self
    }
}

/// Reference to a table inside a dataset file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DatasetRef {
    /// Dataset file path.
    pub path: PathBuf,
    /// Table (tree) name inside the file.
    pub tree: String,
}

impl fmt::Display for DatasetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path.display(), self.tree)
    }
}

/// One physical input file contributing to a named process.
#[derive(Debug, Clone, PartialEq)]
pub struct Process {
    template: ProcessTemplate,
    dataset: DatasetRef,
    weight: Option<String>,
}

impl Process {
    /// Creates a process backed by `path`.
    ///
    /// Environment variables of the form `$VAR` or `${VAR}` in the path are
    /// expanded before the existence check.
    ///
    /// # Errors
    /// Returns [`Error::DatasetNotFound`] if the file does not exist.
    pub fn new(
        template: ProcessTemplate,
        path: impl AsRef<Path>,
        tree: impl Into<String>,
    ) -> Result<Self> {
        let path = expand_env(path.as_ref());
        if !path.is_file() {
            return Err(Error::DatasetNotFound { path });
        }
        Ok(Self {
            template,
            dataset: DatasetRef {
                path,
                tree: tree.into(),
            },
            weight: None,
        })
    }

    /// Overrides the global weight expression for this process.
    #[must_use]
    pub fn with_weight(mut self, weight: impl Into<String>) -> Self {
        self.weight = Some(weight.into());
        self
    }

    /// Process name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.template.name
    }

    /// Drawing identity as declared on this instance.
    #[must_use]
    pub fn template(&self) -> &ProcessTemplate {
        &self.template
    }

    /// Dataset reference.
    #[must_use]
    pub fn dataset(&self) -> &DatasetRef {
        &self.dataset
    }

    /// Process-specific weight expression, if any.
    #[must_use]
    pub fn weight(&self) -> Option<&str> {
        self.weight.as_deref()
    }
}

fn expand_env(path: &Path) -> PathBuf {
    let Some(raw) = path.to_str() else {
        return path.to_path_buf();
    };
    if !raw.contains('$') {
        return path.to_path_buf();
    }

    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        let braced = chars.peek() == Some(&'{');
        if braced {
            chars.next();
        }
        let mut name = String::new();
        while let Some(&n) = chars.peek() {
            if n.is_ascii_alphanumeric() || n == '_' {
                name.push(n);
                chars.next();
            } else {
                break;
            }
        }
        if braced && chars.peek() == Some(&'}') {
            chars.next();
        }
        match std::env::var(&name) {
            Ok(value) if !name.is_empty() => out.push_str(&value),
            // Unset variables stay verbatim.
            _ => {
                out.push('$');
                if braced {
                    out.push('{');
                }
                out.push_str(&name);
                if braced {
                    out.push('}');
                }
            }
        }
    }
    PathBuf::from(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_role_parsing() {
        assert_eq!("stacked".parse::<Role>().unwrap(), Role::Stacked);
        assert_eq!("Line".parse::<Role>().unwrap(), Role::LineOverlay);
        assert_eq!("points".parse::<Role>().unwrap(), Role::PointOverlay);
        assert!(matches!(
            "hatched".parse::<Role>(),
            Err(Error::InvalidRole(_))
        ));
    }

    #[test]
    fn test_template_defaults() {
        let template = ProcessTemplate::new("ttbar");
        assert_eq!(template.label, "ttbar");
        assert!(template.role.is_stacked());
        assert!(template.error_bars);
    }

    #[test]
    fn test_missing_dataset_is_fatal() {
        let err = Process::new(
            ProcessTemplate::new("wjets"),
            "/definitely/not/here.json",
            "nominal",
        )
        .unwrap_err();
        assert!(matches!(err, Error::DatasetNotFound { .. }));
    }

    #[test]
    fn test_process_with_weight() {
        let file = NamedTempFile::new().unwrap();
        let process = Process::new(ProcessTemplate::new("data"), file.path(), "events")
            .unwrap()
            .with_weight("w * 2");
        assert_eq!(process.name(), "data");
        assert_eq!(process.weight(), Some("w * 2"));
        assert_eq!(process.dataset().tree, "events");
    }

    #[test]
    fn test_unset_env_var_kept() {
        let path = expand_env(Path::new("/data/${HISTSTACK_SURELY_UNSET_VAR}/f.json"));
        assert_eq!(
            path,
            PathBuf::from("/data/${HISTSTACK_SURELY_UNSET_VAR}/f.json")
        );
    }
}
