use std::io;
use std::path::PathBuf;
use thiserror::Error;
use zip::result::ZipError;

#[derive(Debug, Error)]
pub enum VfsError {
    #[error("source unavailable: {locator} ({reason})")]
    SourceUnavailable { locator: String, reason: String },
    #[error("I/O error while reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read archive {path}: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: ZipError,
    },
    #[error("entries of {path} were already enumerated; resolve the locator again")]
    AlreadyEnumerated { path: String },
}

impl VfsError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        VfsError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn zip(path: impl Into<PathBuf>, source: ZipError) -> Self {
        VfsError::Zip {
            path: path.into(),
            source,
        }
    }
}
