//! Error types that can be emitted from this library

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Error type for library
///
/// Every fallible operation on an archive resolves to one of these variants;
/// there is no nested error hierarchy for callers to unwrap.
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// the archive (or a loose source file) does not exist
    #[error("file not found: {}", path.display())]
    FileNotFound {
        /// path that could not be opened for reading
        path: PathBuf,
    },

    /// a target file or directory could not be created or opened for writing
    #[error("access failed: {}", path.display())]
    AccessFailed {
        /// path that could not be opened for writing
        path: PathBuf,
    },

    /// the archive contents contradict the format: unknown magic or version,
    /// short reads, corrupt compressed streams
    #[error("invalid archive data: {0}")]
    InvalidData(String),

    /// file name hashes do not match the names stored in the archive
    #[error("file name hashes do not match the archive contents")]
    InvalidHashes,

    /// the zlib decompressor could not be set up
    #[error("zlib stream could not be initialized")]
    ZlibInitFailed,
}

impl Error {
    pub(crate) fn data(message: impl Into<String>) -> Self {
        Error::InvalidData(message.into())
    }
}

/// Short reads and other stream failures inside a parse or copy are data
/// errors from the caller's point of view; open/create failures are
/// classified at the call site instead of going through this conversion.
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::InvalidData(err.to_string())
    }
}

impl From<binrw::Error> for Error {
    fn from(err: binrw::Error) -> Self {
        match err {
            binrw::Error::Io(io) => io.into(),
            other => Error::InvalidData(other.to_string()),
        }
    }
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
