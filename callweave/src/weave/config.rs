//! The configuration record of one weave run.

use std::path::PathBuf;

use crate::weave::naming::DEFAULT_FIELD_PREFIX;

/// Namespaces excluded by default: the runtime's own surface. Instrumenting these
/// would count the machinery of the probe itself.
pub const DEFAULT_EXCLUDED_NAMESPACES: &[&str] = &["System", "Vm"];

/// Everything a weave run needs to know, assembled by the command-line front end (or
/// directly by an embedding host).
#[derive(Debug, Clone)]
pub struct WeaveConfig {
    /// The module to instrument
    pub module_path: PathBuf,
    /// Distinct output path; `None` overwrites the input in place
    pub output_path: Option<PathBuf>,
    /// Counter-field name prefix, also the idempotence marker
    pub field_prefix: String,
    /// Namespace include list (prefix match); empty means "all not excluded"
    pub includes: Vec<String>,
    /// Namespace exclude list (prefix match); wins over the include list
    pub excludes: Vec<String>,
    /// Whether to copy the input aside before weaving
    pub backup: bool,
    /// Directory for backups and their path records; defaults to the module's
    /// directory
    pub backup_dir: Option<PathBuf>,
    /// Whether compiler-synthesized types and members are instrumented too
    pub instrument_compiler_generated: bool,
    /// Extra directories for resolving module references
    pub search_dirs: Vec<PathBuf>,
}

impl WeaveConfig {
    /// Creates a configuration with the defaults: in-place output, the default
    /// field prefix, the built-in namespace exclusions, and backups enabled.
    pub fn new(module_path: impl Into<PathBuf>) -> Self {
        WeaveConfig {
            module_path: module_path.into(),
            output_path: None,
            field_prefix: DEFAULT_FIELD_PREFIX.to_string(),
            includes: Vec::new(),
            excludes: DEFAULT_EXCLUDED_NAMESPACES
                .iter()
                .map(ToString::to_string)
                .collect(),
            backup: true,
            backup_dir: None,
            instrument_compiler_generated: false,
            search_dirs: Vec::new(),
        }
    }
}
