use std::fmt;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use zip::ZipArchive;

use crate::error::VfsError;

pub(crate) trait ReadSeek: Read + Seek + Send {}
impl<T: Read + Seek + Send> ReadSeek for T {}

/// An open archive shared by the directory that enumerated it and every entry
/// it produced; the handle is released once the last of them is dropped.
pub(crate) type SharedArchive = Arc<Mutex<ZipArchive<Box<dyn ReadSeek>>>>;

/// Upper bound on the buffer reserved from an archive header's declared size.
const MAX_PREALLOCATION: u64 = 1 << 20;

#[derive(Clone)]
enum Content {
    File(PathBuf),
    Archive {
        archive: SharedArchive,
        index: usize,
        origin: PathBuf,
    },
    Bytes(Arc<[u8]>),
}

/// One byte-addressable item inside a resolved source.
#[derive(Clone)]
pub struct Entry {
    name: String,
    relative_path: String,
    content: Content,
}

impl Entry {
    pub(crate) fn file(relative_path: String, path: PathBuf) -> Self {
        Self::with_content(relative_path, Content::File(path))
    }

    pub(crate) fn archived(
        relative_path: String,
        archive: SharedArchive,
        index: usize,
        origin: PathBuf,
    ) -> Self {
        Self::with_content(
            relative_path,
            Content::Archive {
                archive,
                index,
                origin,
            },
        )
    }

    /// An entry whose content is already in memory.
    pub fn from_bytes(relative_path: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::with_content(relative_path.into(), Content::Bytes(bytes.into()))
    }

    fn with_content(relative_path: String, content: Content) -> Self {
        let name = relative_path
            .rsplit('/')
            .next()
            .unwrap_or(relative_path.as_str())
            .to_string();
        Self {
            name,
            relative_path,
            content,
        }
    }

    /// Last path segment, e.g. `Config.class`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Slash separated path relative to the source root.
    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    /// Opens a fresh stream over the entry content.
    pub fn open(&self) -> Result<Box<dyn Read + Send>, VfsError> {
        match &self.content {
            Content::File(path) => {
                let file = File::open(path).map_err(|source| VfsError::io(path, source))?;
                Ok(Box::new(BufReader::new(file)))
            }
            Content::Archive { .. } => Ok(Box::new(Cursor::new(self.read_bytes()?))),
            Content::Bytes(bytes) => Ok(Box::new(Cursor::new(Arc::clone(bytes)))),
        }
    }

    pub fn read_bytes(&self) -> Result<Vec<u8>, VfsError> {
        match &self.content {
            Content::File(path) => std::fs::read(path).map_err(|source| VfsError::io(path, source)),
            Content::Archive {
                archive,
                index,
                origin,
            } => {
                let mut archive = archive.lock();
                let mut file = archive
                    .by_index(*index)
                    .map_err(|source| VfsError::zip(origin, source))?;
                let mut buffer = Vec::with_capacity(file.size().min(MAX_PREALLOCATION) as usize);
                file.read_to_end(&mut buffer)
                    .map_err(|source| VfsError::io(origin.join(&self.relative_path), source))?;
                Ok(buffer)
            }
            Content::Bytes(bytes) => Ok(bytes.to_vec()),
        }
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("name", &self.name)
            .field("relative_path", &self.relative_path)
            .finish()
    }
}
