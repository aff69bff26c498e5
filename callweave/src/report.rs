//! Grouped invocation-count reports.
//!
//! The runtime collector is an external collaborator: after the instrumented program
//! has run, it walks the loaded type universe and reads the counter fields back. This
//! module carries the collector-facing half of the contract — recognizing helper
//! types by suffix and counter fields by prefix, reconstructing method name and
//! generic arity from the sanitized names, suppressing zero counters, and grouping
//! the survivors per target type.
//!
//! Counts enter either as plain samples (type name, field name, value) or by walking
//! a loaded [`Module`]'s helper types with a caller-supplied value source.

use std::fmt;

use crate::{
    metadata::module::Module,
    weave::naming,
};

/// One raw counter observation: a helper type, one of its fields, and the field's
/// value.
#[derive(Debug, Clone)]
pub struct CounterSample {
    /// Fully qualified helper type name
    pub helper_fqn: String,
    /// Counter field name
    pub field: String,
    /// Observed 32-bit counter value
    pub value: u32,
}

/// One reported method with its invocation count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterEntry {
    /// Namespace of the target type
    pub namespace: String,
    /// Display name of the target type, with the arity delimiter restored
    pub type_name: String,
    /// Generic arity recovered from the helper name
    pub generic_arity: u16,
    /// Sanitized method name recovered from the field name
    pub method: String,
    /// Invocation count
    pub count: u32,
}

impl CounterEntry {
    /// The target type's display name including its namespace.
    #[must_use]
    pub fn type_display(&self) -> String {
        if self.namespace.is_empty() {
            self.type_name.clone()
        } else {
            format!("{}.{}", self.namespace, self.type_name)
        }
    }
}

/// A grouped report over all observed counters.
#[derive(Debug, Clone, Default)]
pub struct CounterReport {
    /// Entries grouped by type (ascending name), methods by descending count
    pub entries: Vec<CounterEntry>,
}

impl CounterReport {
    /// Builds a report from raw samples under the given field prefix.
    ///
    /// Samples that do not follow the naming contract and samples with a zero value
    /// are suppressed.
    pub fn from_samples<I>(samples: I, field_prefix: &str) -> Self
    where
        I: IntoIterator<Item = CounterSample>,
    {
        let mut entries = Vec::new();

        for sample in samples {
            if sample.value == 0 {
                continue;
            }

            let (namespace, simple_name) = match sample.helper_fqn.rsplit_once('.') {
                Some((namespace, simple_name)) => (namespace, simple_name),
                None => ("", sample.helper_fqn.as_str()),
            };
            if !naming::is_helper_type(simple_name) {
                continue;
            }
            let Some((base, generic_arity)) = naming::target_from_helper(simple_name) else {
                continue;
            };
            let Some(method) = naming::method_from_field(&sample.field, field_prefix) else {
                continue;
            };

            let type_name = if generic_arity > 0 {
                format!("{base}`{generic_arity}")
            } else {
                base
            };

            entries.push(CounterEntry {
                namespace: namespace.to_string(),
                type_name,
                generic_arity,
                method: method.to_string(),
                count: sample.value,
            });
        }

        entries.sort_by(|a, b| {
            a.type_display()
                .cmp(&b.type_display())
                .then(b.count.cmp(&a.count))
                .then(a.method.cmp(&b.method))
        });

        CounterReport { entries }
    }

    /// Builds a report by walking a module's helper types, reading each counter
    /// field's value through the supplied source (e.g. a runtime snapshot).
    pub fn scan_module<F>(module: &Module, field_prefix: &str, mut value_of: F) -> Self
    where
        F: FnMut(&str, &str) -> u32,
    {
        let mut samples = Vec::new();

        for token in module.top_level_types() {
            let Ok(ty) = module.type_def(*token) else {
                continue;
            };
            if !naming::is_helper_type(&ty.name) {
                continue;
            }
            let helper_fqn = ty.fqn();

            for field_token in &ty.fields {
                let Ok(field) = module.field_def(*field_token) else {
                    continue;
                };
                if !naming::is_counter_field(&field.name, field_prefix) {
                    continue;
                }
                samples.push(CounterSample {
                    helper_fqn: helper_fqn.clone(),
                    field: field.name.clone(),
                    value: value_of(&helper_fqn, &field.name),
                });
            }
        }

        CounterReport::from_samples(samples, field_prefix)
    }

    /// True when no non-zero counter was observed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for CounterReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entries.is_empty() {
            return writeln!(f, "No invocations recorded.");
        }

        let mut current_type: Option<String> = None;
        for entry in &self.entries {
            let type_display = entry.type_display();
            if current_type.as_deref() != Some(type_display.as_str()) {
                writeln!(f, "{type_display}")?;
                current_type = Some(type_display);
            }
            writeln!(f, "    {:<40} {:>10}", entry.method, entry.count)?;
        }
        Ok(())
    }
}
