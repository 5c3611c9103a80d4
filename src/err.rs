use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Only catastrophic conditions surface here. Field-level resolution
/// failures are absorbed into default values on the record instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid input path, cannot canonicalize {}: {source}", .path.display())]
    InvalidInputPath { source: io::Error, path: PathBuf },

    #[error("Input path {} is not a directory", .path.display())]
    InputNotADirectory { path: PathBuf },

    #[error("Failed to open file {}: {source}", .path.display())]
    FailedToOpenFile { source: io::Error, path: PathBuf },

    #[error("No .inf files found under {}", .path.display())]
    NoInfFiles { path: PathBuf },

    #[error("An I/O error has occurred: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}
