mod archive;
mod stream;
mod system;

pub use archive::ArchiveDir;
pub use stream::StreamDir;
pub use system::SystemDir;

use crate::entry::Entry;
use crate::error::VfsError;

pub type Entries<'a> = Box<dyn Iterator<Item = Result<Entry, VfsError>> + 'a>;

/// A resolved source root.
///
/// `entries` yields every non-directory item exactly once; a second call
/// fails with [`VfsError::AlreadyEnumerated`]. Handles are released on drop.
pub trait Dir: Send {
    fn path(&self) -> &str;

    fn entries(&mut self) -> Result<Entries<'_>, VfsError>;
}

pub(crate) fn mark_enumerated(flag: &mut bool, path: &str) -> Result<(), VfsError> {
    if std::mem::replace(flag, true) {
        return Err(VfsError::AlreadyEnumerated {
            path: path.to_string(),
        });
    }
    Ok(())
}
