use tracing::{debug, info};
use typedex_vfs::{SourceLocator, Vfs};

use crate::error::{Result, TypedexError};
use crate::filter::Filter;
use crate::persist::Format;
use crate::query::Typedex;
use crate::store::Store;

pub const DEFAULT_PREFIX: &str = "META-INF/reflections/";
pub const DEFAULT_NAME_PATTERN: &str = r".*-reflections\.(xml|json)";

/// Gathers saved index documents from sources and merges them.
///
/// Documents are found under a path prefix and kept when their file name
/// passes the name filter. A document that fails to decode fails the whole
/// collection; same-named indices of every document are unioned.
#[derive(Debug, Clone)]
pub struct Collector {
    vfs: Vfs,
    prefix: String,
    name_filter: Filter,
}

impl Default for Collector {
    fn default() -> Self {
        let name_filter = Filter::include(DEFAULT_NAME_PATTERN).unwrap_or_default();
        Self {
            vfs: Vfs::default(),
            prefix: DEFAULT_PREFIX.to_string(),
            name_filter,
        }
    }
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vfs(mut self, vfs: Vfs) -> Self {
        self.vfs = vfs;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_name_filter(mut self, name_filter: Filter) -> Self {
        self.name_filter = name_filter;
        self
    }

    pub fn collect(&self, locators: &[SourceLocator]) -> Result<Typedex> {
        let documents = self.vfs.find_entries(locators, |entry| {
            entry.relative_path().starts_with(&self.prefix)
                && self.name_filter.accepts(entry.name())
        });

        let mut merged = Store::new();
        for document in &documents {
            let origin = document.relative_path();
            let format = Format::from_name(document.name()).ok_or_else(|| {
                TypedexError::decode(origin, "unknown document extension")
            })?;
            let bytes = document
                .read_bytes()
                .map_err(|err| TypedexError::decode(origin, err))?;
            let text = String::from_utf8(bytes).map_err(|err| TypedexError::decode(origin, err))?;
            let store = format.decode(&text, origin)?;
            debug!(document = origin, scanners = store.len(), "collected index document");
            merged.merge(&store);
        }

        info!(
            documents = documents.len(),
            keys = merged.keys_count(),
            values = merged.values_count(),
            "index documents collected"
        );
        Ok(Typedex::new(merged))
    }
}
