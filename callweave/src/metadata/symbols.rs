//! Debug-symbol files: sequence points, fingerprints, and naming conventions.
//!
//! A `.sym` file maps code offsets of a module's methods back to source lines. It is
//! bound to one exact module file through a SHA-1 fingerprint of that file's bytes:
//! symbols whose fingerprint does not match the module they were loaded for are
//! stale and must not be trusted.
//!
//! Two on-disk naming conventions exist side by side: the *short* convention drops
//! the module extension (`app.sbm` → `app.sym`), the *long* convention appends to the
//! full file name (`app.sbm` → `app.sbm.sym`). The loader probes both and remembers
//! which one the input used so the save path can reconcile its output to match.

use std::path::{Path, PathBuf};

use sha1::{Digest, Sha1};

use crate::{
    file::io::{read_bytes_at, read_le_at, read_string_at, write_le, write_string},
    metadata::{token::Token, writer::BodyOffsetMaps},
    Error, Result,
};

/// Magic bytes opening every symbol file.
pub const SYMBOL_MAGIC: [u8; 4] = *b"SBS0";
/// Symbol format version this crate reads and writes.
pub const SYMBOL_VERSION: u16 = 1;
/// File extension of symbol files.
pub const SYMBOL_EXTENSION: &str = "sym";

/// Which on-disk naming convention a symbol file uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolConvention {
    /// `<stem>.sym` — replaces the module extension
    Short,
    /// `<filename>.sym` — appends to the full module file name
    Long,
}

/// One source-line mapping of one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencePoint {
    /// Byte offset of the instruction within its method's code stream
    pub il_offset: u32,
    /// 1-based source line
    pub line: u32,
    /// Index into the symbol file's source-file table
    pub file: u32,
}

/// All sequence points of one method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSymbols {
    /// The described method (MethodDef token)
    pub method: Token,
    /// Sequence points in ascending offset order
    pub points: Vec<SequencePoint>,
}

/// A parsed symbol file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolFile {
    /// SHA-1 of the module file these symbols describe
    pub fingerprint: [u8; 20],
    /// Source file paths referenced by sequence points
    pub files: Vec<String>,
    /// Per-method sequence points
    pub methods: Vec<MethodSymbols>,
}

/// SHA-1 fingerprint of a module file's bytes.
#[must_use]
pub fn fingerprint(module_bytes: &[u8]) -> [u8; 20] {
    Sha1::digest(module_bytes).into()
}

/// The symbol path of a module path under the given convention.
#[must_use]
pub fn symbol_path(module_path: &Path, convention: SymbolConvention) -> PathBuf {
    match convention {
        SymbolConvention::Short => module_path.with_extension(SYMBOL_EXTENSION),
        SymbolConvention::Long => {
            let mut name = module_path.as_os_str().to_os_string();
            name.push(".");
            name.push(SYMBOL_EXTENSION);
            PathBuf::from(name)
        }
    }
}

/// Probes for a symbol file next to a module, long convention first.
#[must_use]
pub fn probe(module_path: &Path) -> Option<(PathBuf, SymbolConvention)> {
    for convention in [SymbolConvention::Long, SymbolConvention::Short] {
        let candidate = symbol_path(module_path, convention);
        if candidate.is_file() {
            return Some((candidate, convention));
        }
    }
    None
}

impl SymbolFile {
    /// Creates an empty symbol file bound to the given module bytes.
    #[must_use]
    pub fn new(module_bytes: &[u8]) -> Self {
        SymbolFile {
            fingerprint: fingerprint(module_bytes),
            files: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Parses a symbol file and validates it against the module bytes it is meant to
    /// describe.
    ///
    /// # Errors
    /// Returns [`Error::SymbolMismatch`] when the fingerprint does not match the
    /// module bytes, [`Error::NotSupported`] on a foreign magic or version, and
    /// [`Error::Malformed`]/[`Error::OutOfBounds`] on structural damage.
    pub fn from_bytes(data: &[u8], module_bytes: &[u8]) -> Result<SymbolFile> {
        if data.len() < 8 || data[0..4] != SYMBOL_MAGIC {
            return Err(Error::NotSupported);
        }

        let mut offset = 4_usize;
        let version = read_le_at::<u16>(data, &mut offset)?;
        if version != SYMBOL_VERSION {
            return Err(Error::NotSupported);
        }

        let stored = read_bytes_at::<20>(data, &mut offset)?;
        if stored != fingerprint(module_bytes) {
            return Err(Error::SymbolMismatch);
        }

        let file_count = read_le_at::<u32>(data, &mut offset)? as usize;
        let mut files = Vec::with_capacity(file_count.min(64));
        for _ in 0..file_count {
            files.push(read_string_at(data, &mut offset)?);
        }

        let method_count = read_le_at::<u32>(data, &mut offset)? as usize;
        let mut methods = Vec::with_capacity(method_count.min(1024));
        for _ in 0..method_count {
            let method = Token::new(read_le_at::<u32>(data, &mut offset)?);
            let point_count = read_le_at::<u32>(data, &mut offset)? as usize;
            let mut points = Vec::with_capacity(point_count.min(1024));
            for _ in 0..point_count {
                points.push(SequencePoint {
                    il_offset: read_le_at::<u32>(data, &mut offset)?,
                    line: read_le_at::<u32>(data, &mut offset)?,
                    file: read_le_at::<u32>(data, &mut offset)?,
                });
            }
            methods.push(MethodSymbols { method, points });
        }

        Ok(SymbolFile {
            fingerprint: stored,
            files,
            methods,
        })
    }

    /// Reads and validates a symbol file from disk.
    ///
    /// # Errors
    /// See [`SymbolFile::from_bytes`]; I/O failures surface as
    /// [`Error::FileError`].
    pub fn from_file(path: &Path, module_bytes: &[u8]) -> Result<SymbolFile> {
        let data = std::fs::read(path)?;
        SymbolFile::from_bytes(&data, module_bytes)
    }

    /// Serializes the symbol file.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&SYMBOL_MAGIC);
        write_le::<u16>(&mut out, SYMBOL_VERSION);
        out.extend_from_slice(&self.fingerprint);

        #[allow(clippy::cast_possible_truncation)]
        write_le::<u32>(&mut out, self.files.len() as u32);
        for file in &self.files {
            write_string(&mut out, file);
        }

        #[allow(clippy::cast_possible_truncation)]
        write_le::<u32>(&mut out, self.methods.len() as u32);
        for method in &self.methods {
            write_le::<u32>(&mut out, method.method.value());
            #[allow(clippy::cast_possible_truncation)]
            write_le::<u32>(&mut out, method.points.len() as u32);
            for point in &method.points {
                write_le::<u32>(&mut out, point.il_offset);
                write_le::<u32>(&mut out, point.line);
                write_le::<u32>(&mut out, point.file);
            }
        }

        out
    }

    /// Writes the symbol file to disk.
    ///
    /// # Errors
    /// Surfaces I/O failures as [`Error::FileError`].
    pub fn write_file(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_bytes())?;
        Ok(())
    }

    /// Moves every sequence point into the offset space of a re-encoded module.
    ///
    /// Points of methods without a map are left alone; points whose instruction
    /// vanished (none are removed by the weaver, so this indicates stale symbols)
    /// keep their old offset and a warning is logged.
    pub fn remap(&mut self, maps: &BodyOffsetMaps) {
        for method in &mut self.methods {
            let Some(map) = maps.get(&method.method) else {
                continue;
            };
            for point in &mut method.points {
                match map.get(&point.il_offset) {
                    Some(new_offset) => point.il_offset = *new_offset,
                    None => log::warn!(
                        "Sequence point at {} of method {} does not land on an instruction",
                        point.il_offset,
                        method.method
                    ),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashMap;

    #[test]
    fn naming_conventions() {
        let module = Path::new("/proj/app.sbm");
        assert_eq!(
            symbol_path(module, SymbolConvention::Short),
            Path::new("/proj/app.sym")
        );
        assert_eq!(
            symbol_path(module, SymbolConvention::Long),
            Path::new("/proj/app.sbm.sym")
        );
    }

    #[test]
    fn round_trip() {
        let module_bytes = b"fake module bytes";
        let mut symbols = SymbolFile::new(module_bytes);
        symbols.files.push("src/foo.vs".to_string());
        symbols.methods.push(MethodSymbols {
            method: Token::new(0x06000001),
            points: vec![SequencePoint {
                il_offset: 0,
                line: 12,
                file: 0,
            }],
        });

        let bytes = symbols.to_bytes();
        let parsed = SymbolFile::from_bytes(&bytes, module_bytes).unwrap();
        assert_eq!(parsed, symbols);
    }

    #[test]
    fn mismatched_fingerprint_is_rejected() {
        let symbols = SymbolFile::new(b"module one");
        let bytes = symbols.to_bytes();

        assert!(matches!(
            SymbolFile::from_bytes(&bytes, b"module two"),
            Err(Error::SymbolMismatch)
        ));
    }

    #[test]
    fn remap_moves_points() {
        let mut symbols = SymbolFile::new(b"bytes");
        symbols.methods.push(MethodSymbols {
            method: Token::new(0x06000001),
            points: vec![
                SequencePoint {
                    il_offset: 0,
                    line: 1,
                    file: 0,
                },
                SequencePoint {
                    il_offset: 5,
                    line: 2,
                    file: 0,
                },
            ],
        });

        let mut map = FxHashMap::default();
        map.insert(0_u32, 12_u32);
        map.insert(5_u32, 17_u32);
        let mut maps = BodyOffsetMaps::default();
        maps.insert(Token::new(0x06000001), map);

        symbols.remap(&maps);
        assert_eq!(symbols.methods[0].points[0].il_offset, 12);
        assert_eq!(symbols.methods[0].points[1].il_offset, 17);
    }
}
