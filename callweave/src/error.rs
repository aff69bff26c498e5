use std::path::PathBuf;

use thiserror::Error;

use crate::metadata::token::Token;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// The variants map onto the behavioral error kinds of the weaver: fatal input problems
/// ([`Error::InputNotFound`], [`Error::FileError`]), recoverable parse/metadata problems
/// ([`Error::Malformed`], [`Error::SymbolMismatch`], [`Error::TokenNotFound`]), and
/// bytecode-level problems surfaced while re-encoding method bodies
/// ([`Error::InvalidBranchTarget`]).
///
/// Per-item instrumentation failures are *not* errors at this level: the weaver logs them
/// and continues with the remaining methods and call sites. Only file-level I/O and
/// unrecoverable metadata-graph errors propagate out of a weave run.
#[derive(Error, Debug)]
pub enum Error {
    /// The file is damaged and could not be parsed.
    ///
    /// The error includes the source location where the malformation was detected
    /// for debugging purposes.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing the file.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// This file is not a supported module format or version.
    #[error("This file type is not supported")]
    NotSupported,

    /// File I/O error.
    ///
    /// Wraps standard I/O errors that can occur during file operations
    /// such as reading from disk, permission issues, or filesystem errors.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// The target module path does not exist.
    ///
    /// This is the one unconditionally fatal input error of a weave run.
    #[error("Input module not found - {0}")]
    InputNotFound(PathBuf),

    /// A symbol file was found but does not describe the loaded module bytes.
    ///
    /// The loader recovers from this locally by falling back to a symbol-less
    /// load; the subsequent save then also skips symbol writing.
    #[error("Symbol file does not match the module it was loaded for")]
    SymbolMismatch,

    /// A metadata token did not resolve to a row of the expected table.
    ///
    /// The associated [`Token`] identifies the failed lookup.
    #[error("Failed to resolve metadata token - {0}")]
    TokenNotFound(Token),

    /// A branch or exception-handler boundary referenced a code offset that no
    /// instruction occupies.
    ///
    /// The associated value is the unresolvable byte offset.
    #[error("Branch target does not land on an instruction - 0x{0:04x}")]
    InvalidBranchTarget(u64),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}
