//! Idempotence detection and backup management.
//!
//! Instrumenting twice would double-count every invocation, so the weaver refuses to
//! touch a module that shows any trace of a prior run — a single prefix-named field
//! on any top-level type is proof enough, even if that run was aborted half way.
//!
//! Backups are a copy of the input plus a `.bak.path` sidecar recording the original
//! absolute path. The sidecar is what makes restoration work when the backup
//! directory lives outside the original directory; the host orchestrator reads it to
//! learn where the copy belongs.

use std::path::{Path, PathBuf};

use crate::{
    metadata::module::Module,
    weave::naming::is_counter_field,
    Error, Result,
};

/// Extension appended to backup copies.
pub const BACKUP_EXTENSION: &str = "bak";
/// Extension of the sidecar recording the original path.
pub const BACKUP_PATH_EXTENSION: &str = "bak.path";

/// True when any top-level type of the module carries a field whose name starts with
/// the counter prefix — the marker of prior instrumentation.
#[must_use]
pub fn is_instrumented(module: &Module, field_prefix: &str) -> bool {
    module.top_level_types().iter().any(|token| {
        module.type_def(*token).is_ok_and(|ty| {
            ty.fields.iter().any(|field_token| {
                module
                    .field_def(*field_token)
                    .is_ok_and(|field| is_counter_field(&field.name, field_prefix))
            })
        })
    })
}

/// Copies inputs aside before a weave and restores them afterwards.
#[derive(Debug, Clone)]
pub struct BackupManager {
    dir: PathBuf,
}

impl BackupManager {
    /// Creates a manager writing into the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        BackupManager { dir: dir.into() }
    }

    /// Copies a file to `<dir>/<filename>.bak` and writes the `<filename>.bak.path`
    /// sidecar containing the file's original absolute path.
    ///
    /// # Errors
    /// Surfaces I/O failures as [`Error::FileError`].
    pub fn back_up(&self, original: &Path) -> Result<PathBuf> {
        let Some(file_name) = original.file_name().and_then(|n| n.to_str()) else {
            return Err(Error::Error(format!(
                "Cannot derive a backup name from {}",
                original.display()
            )));
        };

        std::fs::create_dir_all(&self.dir)?;

        let backup = self.dir.join(format!("{file_name}.{BACKUP_EXTENSION}"));
        std::fs::copy(original, &backup)?;

        let absolute = std::path::absolute(original)?;
        let sidecar = self.dir.join(format!("{file_name}.{BACKUP_PATH_EXTENSION}"));
        std::fs::write(&sidecar, absolute.display().to_string())?;

        log::debug!("Backed up {} to {}", original.display(), backup.display());
        Ok(backup)
    }

    /// Restores a backup to the path recorded in its sidecar, returning that path.
    ///
    /// This is the host-side half of the contract; the weaver itself never restores.
    ///
    /// # Errors
    /// Fails when the sidecar is missing or the copy fails.
    pub fn restore(backup: &Path) -> Result<PathBuf> {
        let Some(backup_name) = backup.to_str() else {
            return Err(Error::Error(format!(
                "Backup path {} is not valid UTF-8",
                backup.display()
            )));
        };
        let sidecar = PathBuf::from(format!("{backup_name}.path"));
        let recorded = std::fs::read_to_string(&sidecar)?;
        let destination = PathBuf::from(recorded.trim());

        std::fs::copy(backup, &destination)?;
        Ok(destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::{
            builders::FieldBuilder, signatures::TypeSig, types::TypeDef,
        },
        weave::naming::DEFAULT_FIELD_PREFIX,
    };

    #[test]
    fn fresh_module_is_not_instrumented() {
        let mut module = Module::new("demo");
        module.add_top_level_type(TypeDef::new("Demo", "Foo"));
        assert!(!is_instrumented(&module, DEFAULT_FIELD_PREFIX));
    }

    #[test]
    fn prefix_field_marks_instrumentation() {
        let mut module = Module::new("demo");
        let ty = module.add_top_level_type(TypeDef::new("Demo", "Foo_InvokeCounters"));
        FieldBuilder::new("_invokeCount_Bar")
            .public()
            .static_()
            .ty(TypeSig::U4)
            .build(&mut module, ty)
            .unwrap();

        assert!(is_instrumented(&module, DEFAULT_FIELD_PREFIX));
        assert!(!is_instrumented(&module, "_other_"));
    }

    #[test]
    fn backup_and_restore_round_trip() {
        let source_dir = tempfile::tempdir().unwrap();
        let backup_dir = tempfile::tempdir().unwrap();

        let original = source_dir.path().join("app.sbm");
        std::fs::write(&original, b"module bytes").unwrap();

        let manager = BackupManager::new(backup_dir.path());
        let backup = manager.back_up(&original).unwrap();
        assert_eq!(backup, backup_dir.path().join("app.sbm.bak"));

        let sidecar = backup_dir.path().join("app.sbm.bak.path");
        let recorded = std::fs::read_to_string(&sidecar).unwrap();
        assert_eq!(
            PathBuf::from(recorded.trim()),
            std::path::absolute(&original).unwrap()
        );

        // Clobber the original, then restore from the backup.
        std::fs::write(&original, b"woven bytes").unwrap();
        let restored_to = BackupManager::restore(&backup).unwrap();
        assert_eq!(restored_to, std::path::absolute(&original).unwrap());
        assert_eq!(std::fs::read(&original).unwrap(), b"module bytes");
    }
}
