use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for live-restore operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the live-restore layer.
///
/// I/O failures from the operating system propagate verbatim through
/// [`Error::Io`]; the remaining variants are produced by this layer itself.
#[derive(Debug, Error)]
pub enum Error {
    /// The named file exists in neither layer (or, for rename and size,
    /// not in the destination layer where those operations require it).
    #[error("no such file: {}", path.display())]
    NotFound {
        /// Logical name that failed to resolve.
        path: PathBuf,
    },
    /// The persisted layer state is inconsistent, e.g. a discovered hole
    /// list that extends past the end of the source file.
    #[error("invalid layer state: {0}")]
    InvalidInput(String),
    /// The operation is intentionally absent from this layer's contract.
    #[error("operation not supported: {0}")]
    NotSupported(&'static str),
    /// I/O error from the underlying file system.
    #[error("I/O error: {0}")]
    Io(
        #[from]
        #[source]
        io::Error,
    ),
    /// The mount entered the panic state; long-running work aborted.
    #[error("file system is in a panic state")]
    Panicked,
}
