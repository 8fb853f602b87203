//! On-disk reuse of finished scans.
//!
//! A scan is cached under a [`ScanKey`]: the session settings plus a content
//! hash of every local source it reads, scanned locators and classpath alike.
//! Any byte that changes under a source changes the key, so a hit always
//! reflects the current inputs.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use blake3::Hasher;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use typedex_vfs::SourceLocator;
use walkdir::WalkDir;

use crate::store::StoreSnapshot;

/// Bumped whenever the layout of [`CachedScan`] changes.
const FORMAT_VERSION: u32 = 2;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cannot hash source {path}: {source}")]
    Source {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("corrupt cache entry {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },
}

/// Content hash of one source locator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct SourceHash {
    locator: String,
    /// `None` when nothing exists at the locator's path.
    content: Option<String>,
}

/// Identifies the inputs of one scan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanKey {
    settings: String,
    sources: Vec<SourceHash>,
}

impl ScanKey {
    /// Hashes every source in `locators` and `classpath`. `None` when one of
    /// them has no local file behind it; such scans are never cached.
    pub fn capture(
        locators: &[SourceLocator],
        classpath: &[SourceLocator],
        settings: impl Into<String>,
    ) -> Result<Option<Self>, CacheError> {
        let mut sources = Vec::with_capacity(locators.len() + classpath.len());
        for locator in locators.iter().chain(classpath) {
            let path = match locator.archive_reference() {
                Some((archive, _)) => archive,
                None => match locator.local_path() {
                    Some(path) => path,
                    None => return Ok(None),
                },
            };
            sources.push(SourceHash {
                locator: locator.as_str().to_string(),
                content: hash_source(&path)?,
            });
        }
        Ok(Some(Self {
            settings: settings.into(),
            sources,
        }))
    }

    /// Stable file-name-safe digest of the whole key.
    pub fn id(&self) -> String {
        let mut hasher = Hasher::new();
        hasher.update(self.settings.as_bytes());
        for source in &self.sources {
            hasher.update(&[0]);
            hasher.update(source.locator.as_bytes());
            hasher.update(&[0]);
            hasher.update(source.content.as_deref().unwrap_or("-").as_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }
}

/// Hashes a file's bytes, or every file under a directory together with its
/// relative path, in file name order.
fn hash_source(path: &Path) -> Result<Option<String>, CacheError> {
    let source_error = |source: io::Error| CacheError::Source {
        path: path.to_path_buf(),
        source,
    };
    if !path.exists() {
        return Ok(None);
    }
    let mut hasher = Hasher::new();
    if path.is_dir() {
        for item in WalkDir::new(path).follow_links(true).sort_by_file_name() {
            let item = item.map_err(|err| source_error(io::Error::other(err)))?;
            if item.file_type().is_dir() {
                continue;
            }
            let relative = item.path().strip_prefix(path).unwrap_or(item.path());
            hasher.update(relative.to_string_lossy().replace('\\', "/").as_bytes());
            hasher.update(&[0]);
            hash_file(&mut hasher, item.path()).map_err(source_error)?;
        }
    } else {
        hash_file(&mut hasher, path).map_err(source_error)?;
    }
    Ok(Some(hasher.finalize().to_hex().to_string()))
}

fn hash_file(hasher: &mut Hasher, path: &Path) -> io::Result<()> {
    let mut file = File::open(path)?;
    let length = io::copy(&mut file, hasher)?;
    hasher.update(&length.to_le_bytes());
    Ok(())
}

/// A cache hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedScan {
    format: u32,
    key: ScanKey,
    pub scan_ms: u64,
    pub recorded_at_ms: u64,
    pub snapshot: StoreSnapshot,
}

/// Directory of bincode-encoded scans, one file per [`ScanKey::id`].
#[derive(Debug, Clone)]
pub struct ScanCache {
    root: PathBuf,
}

impl ScanCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, key: &ScanKey) -> PathBuf {
        self.root.join(format!("scan-{}.bin", key.id()))
    }

    /// `Ok(None)` on a miss, including entries written by another format
    /// version or whose full key differs from `key`.
    pub fn load(&self, key: &ScanKey) -> Result<Option<CachedScan>, CacheError> {
        let path = self.path_of(key);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(CacheError::Io { path, source }),
        };
        let cached: CachedScan = bincode::deserialize_from(BufReader::new(file))
            .map_err(|source| CacheError::Corrupt {
                path: path.clone(),
                source,
            })?;
        if cached.format != FORMAT_VERSION || cached.key != *key {
            return Ok(None);
        }
        Ok(Some(cached))
    }

    /// Writes next to the final entry first and renames it into place, so
    /// readers never observe a partial file.
    pub fn save(
        &self,
        key: &ScanKey,
        snapshot: StoreSnapshot,
        elapsed: Duration,
    ) -> Result<PathBuf, CacheError> {
        let io_error = |path: &Path| {
            let path = path.to_path_buf();
            move |source: io::Error| CacheError::Io { path, source }
        };
        fs::create_dir_all(&self.root).map_err(io_error(&self.root))?;
        let path = self.path_of(key);
        let staging = path.with_extension(format!("{}.tmp", std::process::id()));

        let cached = CachedScan {
            format: FORMAT_VERSION,
            key: key.clone(),
            scan_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            recorded_at_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |since| u64::try_from(since.as_millis()).unwrap_or(u64::MAX)),
            snapshot,
        };
        let file = File::create(&staging).map_err(io_error(&staging))?;
        let mut writer = BufWriter::new(file);
        bincode::serialize_into(&mut writer, &cached).map_err(|source| CacheError::Corrupt {
            path: staging.clone(),
            source,
        })?;
        writer.flush().map_err(io_error(&staging))?;
        fs::rename(&staging, &path).map_err(io_error(&path))?;
        Ok(path)
    }
}
