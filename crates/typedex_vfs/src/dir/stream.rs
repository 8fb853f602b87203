use std::io::Read;

use super::{Dir, Entries, mark_enumerated};
use crate::entry::Entry;
use crate::error::VfsError;

/// A zip-format archive read front to back from a non-seekable stream.
///
/// Entry content is buffered while streaming because the stream cannot be
/// revisited.
pub struct StreamDir {
    display: String,
    reader: Option<Box<dyn Read + Send>>,
    enumerated: bool,
}

impl StreamDir {
    pub fn new(display: impl Into<String>, reader: Box<dyn Read + Send>) -> Self {
        Self {
            display: display.into(),
            reader: Some(reader),
            enumerated: false,
        }
    }
}

impl Dir for StreamDir {
    fn path(&self) -> &str {
        &self.display
    }

    fn entries(&mut self) -> Result<Entries<'_>, VfsError> {
        mark_enumerated(&mut self.enumerated, &self.display)?;
        let Some(reader) = self.reader.take() else {
            return Ok(Box::new(std::iter::empty()));
        };
        Ok(Box::new(StreamEntries {
            display: self.display.clone(),
            reader,
            done: false,
        }))
    }
}

struct StreamEntries {
    display: String,
    reader: Box<dyn Read + Send>,
    done: bool,
}

impl Iterator for StreamEntries {
    type Item = Result<Entry, VfsError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let mut file = match zip::read::read_zipfile_from_stream(&mut self.reader) {
                Ok(Some(file)) => file,
                Ok(None) => {
                    self.done = true;
                    return None;
                }
                Err(source) => {
                    self.done = true;
                    return Some(Err(VfsError::zip(&self.display, source)));
                }
            };
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut buffer = Vec::new();
            if let Err(source) = file.read_to_end(&mut buffer) {
                self.done = true;
                return Some(Err(VfsError::io(&self.display, source)));
            }
            return Some(Ok(Entry::from_bytes(name, buffer)));
        }
        None
    }
}
