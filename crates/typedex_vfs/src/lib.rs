//! Virtual source layer: resolves scan locators into enumerable containers
//! of entries, regardless of whether they are directories or archives.

mod dir;
mod entry;
mod error;
mod locator;
mod strategy;

use std::sync::Arc;

use tracing::{debug, warn};

pub use dir::{ArchiveDir, Dir, Entries, StreamDir, SystemDir};
pub use entry::Entry;
pub use error::VfsError;
pub use locator::SourceLocator;
pub use strategy::{
    ArchiveUrl, Connector, LocalArchive, PlainDirectory, ResolverStrategy, StreamedArchive,
    default_strategies,
};

/// Resolves locators with an explicit, ordered list of strategies.
#[derive(Clone)]
pub struct Vfs {
    strategies: Vec<Arc<dyn ResolverStrategy>>,
}

impl Default for Vfs {
    fn default() -> Self {
        Self::new(default_strategies())
    }
}

impl std::fmt::Debug for Vfs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.strategies.iter().map(|strategy| strategy.name()))
            .finish()
    }
}

impl Vfs {
    pub fn new(strategies: Vec<Arc<dyn ResolverStrategy>>) -> Self {
        Self { strategies }
    }

    /// Appends an extension strategy after the existing ones.
    pub fn with_strategy(mut self, strategy: Arc<dyn ResolverStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|strategy| strategy.name()).collect()
    }

    /// Opens `locator` with the first strategy that matches it and opens
    /// successfully.
    pub fn resolve(&self, locator: &SourceLocator) -> Result<Box<dyn Dir>, VfsError> {
        let mut last_error = None;
        for strategy in &self.strategies {
            if !strategy.matches(locator) {
                continue;
            }
            match strategy.open(locator) {
                Ok(dir) => {
                    debug!(locator = %locator, strategy = strategy.name(), "resolved source");
                    return Ok(dir);
                }
                Err(err) => {
                    debug!(
                        locator = %locator,
                        strategy = strategy.name(),
                        error = %err,
                        "strategy failed to open source"
                    );
                    last_error = Some(err.to_string());
                }
            }
        }
        Err(strategy::unavailable(
            locator,
            last_error.unwrap_or_else(|| "no resolver strategy matches".to_string()),
        ))
    }

    /// Collects the entries accepted by `predicate` across every locator.
    ///
    /// Locators that fail to resolve and entries that fail to enumerate are
    /// logged and skipped.
    pub fn find_entries<P>(&self, locators: &[SourceLocator], predicate: P) -> Vec<Entry>
    where
        P: Fn(&Entry) -> bool,
    {
        let mut found = Vec::new();
        for locator in locators {
            let mut dir = match self.resolve(locator) {
                Ok(dir) => dir,
                Err(err) => {
                    warn!(locator = %locator, error = %err, "skipping unavailable source");
                    continue;
                }
            };
            let entries = match dir.entries() {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(locator = %locator, error = %err, "could not enumerate source");
                    continue;
                }
            };
            for entry in entries {
                match entry {
                    Ok(entry) if predicate(&entry) => found.push(entry),
                    Ok(_) => {}
                    Err(err) => warn!(locator = %locator, error = %err, "skipping unreadable entry"),
                }
            }
        }
        found
    }
}
