use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

const ARCHIVE_EXTENSIONS: &[&str] = &["jar", "zip", "war", "ear", "jmod"];
const ARCHIVE_URL_SCHEMES: &[&str] = &["jar", "zip", "wsjar"];

/// Address of one scan root: a directory, an archive file, or an archive
/// URL of the form `jar:file:/lib/app.jar!/nested/path`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceLocator(String);

impl SourceLocator {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self(path.as_ref().to_string_lossy().into_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn scheme(&self) -> Option<&str> {
        let (scheme, _) = self.0.split_once(':')?;
        let valid = scheme.len() > 1
            && scheme
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '+' | '-' | '.'));
        valid.then_some(scheme)
    }

    /// The filesystem path for bare paths and `file:` URLs.
    pub fn local_path(&self) -> Option<PathBuf> {
        match self.scheme() {
            None => Some(PathBuf::from(&self.0)),
            Some("file") => Some(PathBuf::from(strip_file_scheme(&self.0))),
            Some(_) => None,
        }
    }

    /// Splits `jar:file:/a.jar!/inner/` into the outer archive path and the
    /// inner path (empty when the URL names the archive root).
    pub fn archive_reference(&self) -> Option<(PathBuf, String)> {
        let scheme = self.scheme()?;
        if !ARCHIVE_URL_SCHEMES.contains(&scheme) {
            return None;
        }
        let rest = &self.0[scheme.len() + 1..];
        let (outer, inner) = match rest.split_once("!/") {
            Some((outer, inner)) => (outer, inner),
            None => (rest.trim_end_matches('!'), ""),
        };
        Some((PathBuf::from(strip_file_scheme(outer)), inner.to_string()))
    }

    pub fn looks_like_archive(&self) -> bool {
        match self.local_path() {
            Some(path) => is_archive(&path),
            None => false,
        }
    }
}

fn strip_file_scheme(value: &str) -> &str {
    let rest = value.strip_prefix("file:").unwrap_or(value);
    // `file:///x` and `file://localhost/x` both name `/x`.
    match rest.strip_prefix("//") {
        Some(authority) => match authority.find('/') {
            Some(index) => &authority[index..],
            None => authority,
        },
        None => rest,
    }
}

pub(crate) fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            ARCHIVE_EXTENSIONS
                .iter()
                .any(|candidate| ext.eq_ignore_ascii_case(candidate))
        })
        .unwrap_or(false)
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&Path> for SourceLocator {
    fn from(path: &Path) -> Self {
        Self::from_path(path)
    }
}

impl From<PathBuf> for SourceLocator {
    fn from(path: PathBuf) -> Self {
        Self::from_path(path)
    }
}

impl From<&str> for SourceLocator {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
