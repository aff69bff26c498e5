//! Loading and saving of modules together with their symbol files.
//!
//! The loader is deliberately forgiving about everything except the module itself: a
//! missing input module is fatal, but stale symbols fall back to a symbol-less load
//! (with a warning), and unresolvable module references are reported per reference so
//! the caller can skip just the dependency that failed.
//!
//! Saving re-encodes every method body, writes the module, then rewrites the symbol
//! file against the new code layout — and finally reconciles the symbol file name to
//! the convention the input used, so downstream loaders that probe only one
//! convention keep finding symbols.

use std::path::{Path, PathBuf};

use crate::{
    metadata::{
        module::Module,
        reader::read_module,
        symbols::{self, SymbolConvention, SymbolFile},
        writer::write_module,
    },
    Error, Result,
};

/// File extension of module files.
pub const MODULE_EXTENSION: &str = "sbm";

/// A module loaded from disk, with everything the save path needs to put it back.
#[derive(Debug)]
pub struct LoadedModule {
    /// The mutable metadata graph
    pub module: Module,
    /// Symbols, when present and matching the module bytes
    pub symbols: Option<SymbolFile>,
    /// Naming convention the input symbol file used
    pub symbol_convention: Option<SymbolConvention>,
    /// Path the module was loaded from
    pub path: PathBuf,
}

/// Paths written by one save.
#[derive(Debug)]
pub struct SaveReport {
    /// Where the module was written
    pub module_path: PathBuf,
    /// Where the symbol file ended up, when symbols were written
    pub symbol_path: Option<PathBuf>,
}

/// Loads and saves modules, resolving module references through a directory list.
#[derive(Debug, Clone)]
pub struct Loader {
    search_dirs: Vec<PathBuf>,
}

impl Loader {
    /// Creates a loader with the given reference-resolution search directories.
    ///
    /// The directory of the module being loaded is always searched first; the
    /// configured directories follow in order.
    #[must_use]
    pub fn new(search_dirs: Vec<PathBuf>) -> Self {
        Loader { search_dirs }
    }

    /// Loads a module and its symbol file.
    ///
    /// Symbol handling: both naming conventions are probed (long first). A symbol
    /// file that fails to parse or does not fingerprint-match the module bytes is
    /// dropped with a warning; the load itself still succeeds and the save path will
    /// skip symbol writing.
    ///
    /// # Errors
    /// Returns [`Error::InputNotFound`] when the module path does not exist, and
    /// parse errors for a damaged module file.
    pub fn load(&self, path: &Path) -> Result<LoadedModule> {
        if !path.is_file() {
            return Err(Error::InputNotFound(path.to_path_buf()));
        }

        let bytes = std::fs::read(path)?;
        let module = read_module(&bytes)?;

        let (loaded_symbols, symbol_convention) = match symbols::probe(path) {
            Some((symbol_path, convention)) => {
                match SymbolFile::from_file(&symbol_path, &bytes) {
                    Ok(parsed) => (Some(parsed), Some(convention)),
                    Err(Error::SymbolMismatch) => {
                        log::warn!(
                            "Symbol file {} does not match {}, loading without symbols",
                            symbol_path.display(),
                            path.display()
                        );
                        (None, None)
                    }
                    Err(error) => {
                        log::warn!(
                            "Failed to load symbol file {}: {error}",
                            symbol_path.display()
                        );
                        (None, None)
                    }
                }
            }
            None => (None, None),
        };

        log::debug!(
            "Loaded module '{}' from {} ({} top-level types, symbols: {})",
            module.name,
            path.display(),
            module.top_level_types().len(),
            if loaded_symbols.is_some() { "yes" } else { "no" }
        );

        Ok(LoadedModule {
            module,
            symbols: loaded_symbols,
            symbol_convention,
            path: path.to_path_buf(),
        })
    }

    /// Resolves one module reference by name against the referencing module's
    /// directory and the configured search directories.
    ///
    /// # Errors
    /// Returns [`Error::Error`] when no candidate file exists, or a parse error when
    /// a candidate exists but cannot be read. Callers treat both as a per-dependency
    /// warning, not a run failure.
    pub fn resolve_dependency(&self, referencing_dir: &Path, name: &str) -> Result<Module> {
        let file_name = format!("{name}.{MODULE_EXTENSION}");
        let candidates =
            std::iter::once(referencing_dir.to_path_buf()).chain(self.search_dirs.iter().cloned());

        for dir in candidates {
            let candidate = dir.join(&file_name);
            if candidate.is_file() {
                let bytes = std::fs::read(&candidate)?;
                return read_module(&bytes);
            }
        }

        Err(Error::Error(format!(
            "Unresolved module reference '{name}'"
        )))
    }

    /// Resolves every module reference of a loaded module, pairing each reference
    /// name with its outcome.
    #[must_use]
    pub fn resolve_dependencies(&self, loaded: &LoadedModule) -> Vec<(String, Result<Module>)> {
        let referencing_dir = loaded
            .path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

        loaded
            .module
            .module_refs
            .iter()
            .map(|reference| {
                (
                    reference.name.clone(),
                    self.resolve_dependency(&referencing_dir, &reference.name),
                )
            })
            .collect()
    }

    /// Saves a loaded module, overwriting in place unless an output path is given.
    ///
    /// Bodies are re-encoded, the module is written, and — iff symbols were loaded —
    /// the symbol file is remapped to the new code layout, re-fingerprinted, written
    /// under the long convention, and then reconciled: when the input used the short
    /// convention, any stale short-convention file is deleted and the fresh output is
    /// renamed over it.
    ///
    /// # Errors
    /// Propagates body-encoding failures and I/O failures; both are fatal to the
    /// run.
    pub fn save(&self, loaded: &mut LoadedModule, output: Option<&Path>) -> Result<SaveReport> {
        let target = output.unwrap_or(&loaded.path).to_path_buf();

        let (bytes, offset_maps) = write_module(&mut loaded.module)?;
        std::fs::write(&target, &bytes)?;

        let symbol_path = match loaded.symbols.as_mut() {
            Some(symbol_file) => {
                symbol_file.remap(&offset_maps);
                symbol_file.fingerprint = symbols::fingerprint(&bytes);

                let long_path = symbols::symbol_path(&target, SymbolConvention::Long);
                symbol_file.write_file(&long_path)?;

                if loaded.symbol_convention == Some(SymbolConvention::Short) {
                    let short_path = symbols::symbol_path(&target, SymbolConvention::Short);
                    if short_path.is_file() {
                        std::fs::remove_file(&short_path)?;
                    }
                    std::fs::rename(&long_path, &short_path)?;
                    Some(short_path)
                } else {
                    Some(long_path)
                }
            }
            None => None,
        };

        log::debug!("Saved module '{}' to {}", loaded.module.name, target.display());

        Ok(SaveReport {
            module_path: target,
            symbol_path,
        })
    }
}
