//! Registration of processes and their canonical templates.

use std::sync::Arc;

use crate::{Diagnostics, Process, ProcessTemplate};

const COMPONENT: &str = "registry";

/// Ordered set of registered processes.
///
/// Several [`Process`] instances may share a name. The first instance
/// registered under a name defines the [`ProcessTemplate`]; later instances
/// that disagree on role, color, label or error bars produce one warning
/// per differing field and do not change the template.
pub struct ProcessRegistry {
    templates: Vec<ProcessTemplate>,
    processes: Vec<Process>,
    diagnostics: Arc<dyn Diagnostics>,
}

impl ProcessRegistry {
    /// Creates an empty registry reporting through `diagnostics`.
    #[must_use]
    pub fn new(diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self {
            templates: Vec::new(),
            processes: Vec::new(),
            diagnostics,
        }
    }

    /// Registers a process instance.
    pub fn register(&mut self, process: Process) {
        let incoming = process.template();
        match self.templates.iter().find(|t| t.name == incoming.name) {
            None => self.templates.push(incoming.clone()),
            Some(existing) => {
                let source = process.dataset().to_string();
                if incoming.color != existing.color {
                    self.conflict(&incoming.name, "color", &source);
                }
                if incoming.role != existing.role {
                    self.conflict(&incoming.name, "role", &source);
                }
                if incoming.error_bars != existing.error_bars {
                    self.conflict(&incoming.name, "error bars setting", &source);
                }
                if incoming.label != existing.label {
                    self.conflict(&incoming.name, "label", &source);
                }
            }
        }

        self.diagnostics.info(
            COMPONENT,
            &format!("added process {} from {}", process.name(), process.dataset()),
        );
        self.processes.push(process);
    }

    fn conflict(&self, name: &str, field: &str, source: &str) {
        self.diagnostics.warn(
            COMPONENT,
            &format!(
                "process {name} already exists with different {field}; \
                 keeping the first value and ignoring {source}"
            ),
        );
    }

    /// Canonical templates in registration order.
    #[must_use]
    pub fn templates(&self) -> &[ProcessTemplate] {
        &self.templates
    }

    /// Template for `name`.
    #[must_use]
    pub fn template(&self, name: &str) -> Option<&ProcessTemplate> {
        self.templates.iter().find(|t| t.name == name)
    }

    /// All process instances in registration order.
    #[must_use]
    pub fn processes(&self) -> &[Process] {
        &self.processes
    }

    /// Returns true if a process named `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.template(name).is_some()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }
}
