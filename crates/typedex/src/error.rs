use std::io;
use std::path::PathBuf;

use thiserror::Error;
use typedex_classfile::ClassParseError;
use typedex_vfs::VfsError;

use crate::cache::CacheError;
use crate::filter::FilterError;

/// Failure to turn one entry into a type descriptor. Non-fatal per entry.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("could not read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: VfsError,
    },
    #[error("malformed type record {path}: {source}")]
    Malformed {
        path: String,
        #[source]
        source: ClassParseError,
    },
    #[error("type {name} could not be resolved")]
    Unresolvable { name: String },
}

#[derive(Debug, Error)]
pub enum TypedexError {
    #[error(transparent)]
    SourceUnavailable(#[from] VfsError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error("failed to instrument {member}: {source}")]
    Instrumentation {
        member: String,
        #[source]
        source: ClassParseError,
    },
    #[error("scanner {0} was not configured")]
    ScannerNotConfigured(String),
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("failed to parse configuration {origin}: {source}")]
    Config {
        origin: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to decode index document {origin}: {reason}")]
    Decode { origin: String, reason: String },
    #[error("failed to encode index document: {0}")]
    Encode(String),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl TypedexError {
    /// Errors that abort the whole scan instead of skipping one locator.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TypedexError::Instrumentation { .. } | TypedexError::ScannerNotConfigured(_)
        )
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        TypedexError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn decode(origin: impl Into<String>, reason: impl ToString) -> Self {
        TypedexError::Decode {
            origin: origin.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T, E = TypedexError> = std::result::Result<T, E>;
