use std::fs::File;
use std::io::{self, BufReader, Read};
use std::sync::Arc;

use crate::dir::{ArchiveDir, Dir, StreamDir, SystemDir};
use crate::error::VfsError;
use crate::locator::{SourceLocator, is_archive};

/// One way of turning a locator into a [`Dir`].
pub trait ResolverStrategy: Send + Sync {
    fn name(&self) -> &str;

    fn matches(&self, locator: &SourceLocator) -> bool;

    fn open(&self, locator: &SourceLocator) -> Result<Box<dyn Dir>, VfsError>;
}

/// The built-in strategies in priority order.
pub fn default_strategies() -> Vec<Arc<dyn ResolverStrategy>> {
    vec![
        Arc::new(LocalArchive),
        Arc::new(StreamedArchive::local()),
        Arc::new(ArchiveUrl),
        Arc::new(PlainDirectory),
    ]
}

/// A zip-format archive file on the local filesystem, read with random access.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalArchive;

impl ResolverStrategy for LocalArchive {
    fn name(&self) -> &str {
        "local-archive"
    }

    fn matches(&self, locator: &SourceLocator) -> bool {
        locator
            .local_path()
            .map(|path| path.is_file() && is_archive(&path))
            .unwrap_or(false)
    }

    fn open(&self, locator: &SourceLocator) -> Result<Box<dyn Dir>, VfsError> {
        let path = locator
            .local_path()
            .ok_or_else(|| unavailable(locator, "not a local path"))?;
        Ok(Box::new(ArchiveDir::open(path)?))
    }
}

pub type Connector = dyn Fn(&SourceLocator) -> io::Result<Box<dyn Read + Send>> + Send + Sync;

/// A zip-format archive consumed as a forward-only byte stream.
///
/// The connector opens the stream; the default one reads local files, which
/// recovers archives whose central directory is damaged.
pub struct StreamedArchive {
    connector: Arc<Connector>,
}

impl StreamedArchive {
    pub fn local() -> Self {
        Self::with_connector(|locator: &SourceLocator| {
            let path = locator.local_path().ok_or_else(|| {
                io::Error::new(io::ErrorKind::Unsupported, "locator is not a local path")
            })?;
            let file = File::open(path)?;
            Ok(Box::new(BufReader::new(file)) as Box<dyn Read + Send>)
        })
    }

    pub fn with_connector<F>(connector: F) -> Self
    where
        F: Fn(&SourceLocator) -> io::Result<Box<dyn Read + Send>> + Send + Sync + 'static,
    {
        Self {
            connector: Arc::new(connector),
        }
    }
}

impl ResolverStrategy for StreamedArchive {
    fn name(&self) -> &str {
        "streamed-archive"
    }

    fn matches(&self, locator: &SourceLocator) -> bool {
        let is_dir = locator
            .local_path()
            .map(|path| path.is_dir())
            .unwrap_or(false);
        !is_dir
            && locator.archive_reference().is_none()
            && (locator.looks_like_archive() || locator.as_str().contains(".jar"))
    }

    fn open(&self, locator: &SourceLocator) -> Result<Box<dyn Dir>, VfsError> {
        let reader = (self.connector)(locator).map_err(|source| VfsError::Io {
            path: locator.as_str().into(),
            source,
        })?;
        Ok(Box::new(StreamDir::new(locator.as_str(), reader)))
    }
}

/// `jar:file:/a.jar!/path` URLs: the whole archive, a sub-tree of it, or an
/// archive nested inside it.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArchiveUrl;

impl ResolverStrategy for ArchiveUrl {
    fn name(&self) -> &str {
        "archive-url"
    }

    fn matches(&self, locator: &SourceLocator) -> bool {
        locator
            .archive_reference()
            .map(|(outer, _)| outer.is_file())
            .unwrap_or(false)
    }

    fn open(&self, locator: &SourceLocator) -> Result<Box<dyn Dir>, VfsError> {
        let (outer, inner) = locator
            .archive_reference()
            .ok_or_else(|| unavailable(locator, "not an archive URL"))?;
        let inner = inner.trim_end_matches('/');
        if !inner.is_empty() && is_archive(inner.as_ref()) {
            return Ok(Box::new(ArchiveDir::open_nested(&outer, inner)?));
        }
        Ok(Box::new(ArchiveDir::open(&outer)?.with_prefix(inner)))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PlainDirectory;

impl ResolverStrategy for PlainDirectory {
    fn name(&self) -> &str {
        "directory"
    }

    fn matches(&self, locator: &SourceLocator) -> bool {
        locator
            .local_path()
            .map(|path| path.is_dir())
            .unwrap_or(false)
    }

    fn open(&self, locator: &SourceLocator) -> Result<Box<dyn Dir>, VfsError> {
        let path = locator
            .local_path()
            .ok_or_else(|| unavailable(locator, "not a local path"))?;
        Ok(Box::new(SystemDir::new(path)))
    }
}

pub(crate) fn unavailable(locator: &SourceLocator, reason: impl Into<String>) -> VfsError {
    VfsError::SourceUnavailable {
        locator: locator.to_string(),
        reason: reason.into(),
    }
}
