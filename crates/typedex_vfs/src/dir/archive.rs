use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use zip::ZipArchive;

use super::{Dir, Entries, mark_enumerated};
use crate::entry::{Entry, ReadSeek, SharedArchive};
use crate::error::VfsError;

/// A seekable zip-format archive, optionally narrowed to a path prefix.
pub struct ArchiveDir {
    origin: PathBuf,
    display: String,
    archive: SharedArchive,
    prefix: String,
    enumerated: bool,
}

impl ArchiveDir {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, VfsError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| VfsError::io(path, source))?;
        let reader: Box<dyn ReadSeek> = Box::new(BufReader::new(file));
        let archive = ZipArchive::new(reader).map_err(|source| VfsError::zip(path, source))?;
        Ok(Self::from_archive(
            path.to_path_buf(),
            path.to_string_lossy().into_owned(),
            archive,
        ))
    }

    /// Opens the archive stored at `inner` inside the archive at `outer`.
    pub fn open_nested(outer: impl AsRef<Path>, inner: &str) -> Result<Self, VfsError> {
        let outer = outer.as_ref();
        let mut parent = Self::open(outer)?;
        let bytes = parent.read_member(inner)?;
        let reader: Box<dyn ReadSeek> = Box::new(Cursor::new(bytes));
        let origin = outer.join(inner);
        let archive = ZipArchive::new(reader).map_err(|source| VfsError::zip(&origin, source))?;
        let display = format!("{}!/{}", outer.to_string_lossy(), inner);
        Ok(Self::from_archive(origin, display, archive))
    }

    fn from_archive(
        origin: PathBuf,
        display: String,
        archive: ZipArchive<Box<dyn ReadSeek>>,
    ) -> Self {
        Self {
            origin,
            display,
            archive: Arc::new(Mutex::new(archive)),
            prefix: String::new(),
            enumerated: false,
        }
    }

    /// Restricts enumeration to entries under `prefix`, reporting paths
    /// relative to it.
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        let trimmed = prefix.trim_matches('/');
        self.prefix = if trimmed.is_empty() {
            String::new()
        } else {
            format!("{trimmed}/")
        };
        self
    }

    fn read_member(&mut self, name: &str) -> Result<Vec<u8>, VfsError> {
        let mut archive = self.archive.lock();
        let mut file = archive
            .by_name(name)
            .map_err(|source| VfsError::zip(&self.origin, source))?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)
            .map_err(|source| VfsError::io(self.origin.join(name), source))?;
        Ok(buffer)
    }
}

impl Dir for ArchiveDir {
    fn path(&self) -> &str {
        &self.display
    }

    fn entries(&mut self) -> Result<Entries<'_>, VfsError> {
        mark_enumerated(&mut self.enumerated, &self.display)?;
        let len = self.archive.lock().len();
        let archive = Arc::clone(&self.archive);
        let origin = self.origin.clone();
        let prefix = self.prefix.clone();
        Ok(Box::new((0..len).filter_map(move |index| {
            let name = {
                let mut guard = archive.lock();
                match guard.by_index_raw(index) {
                    Ok(file) if file.is_dir() => return None,
                    Ok(file) => file.name().to_string(),
                    Err(source) => return Some(Err(VfsError::zip(&origin, source))),
                }
            };
            let relative = name.strip_prefix(prefix.as_str())?;
            if relative.is_empty() {
                return None;
            }
            Some(Ok(Entry::archived(
                relative.to_string(),
                Arc::clone(&archive),
                index,
                origin.clone(),
            )))
        })))
    }
}
