use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::{Dir, Entries, mark_enumerated};
use crate::entry::Entry;
use crate::error::VfsError;

/// A plain directory tree on the local filesystem.
pub struct SystemDir {
    root: PathBuf,
    display: String,
    enumerated: bool,
}

impl SystemDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            display: root.to_string_lossy().into_owned(),
            root,
            enumerated: false,
        }
    }
}

impl Dir for SystemDir {
    fn path(&self) -> &str {
        &self.display
    }

    fn entries(&mut self) -> Result<Entries<'_>, VfsError> {
        mark_enumerated(&mut self.enumerated, &self.display)?;
        let root = self.root.clone();
        let walker = WalkDir::new(&self.root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter();
        Ok(Box::new(walker.filter_map(move |item| match item {
            Ok(item) if item.file_type().is_dir() => None,
            Ok(item) => Some(Ok(Entry::file(
                relative_to(&root, item.path()),
                item.into_path(),
            ))),
            Err(err) => {
                let path = err
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| root.clone());
                Some(Err(VfsError::io(path, err.into())))
            }
        })))
    }
}

fn relative_to(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
