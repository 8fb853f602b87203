use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{debug, info, warn};
use typedex_vfs::{Entry, SourceLocator, Vfs};

use crate::backend::ExtractionBackend;
use crate::cache::{ScanCache, ScanKey};
use crate::config::ScanConfig;
use crate::error::Result;
use crate::filter::Filter;
use crate::pool::{ClassPool, TypeResolver};
use crate::query::{Typedex, expand_super_types};
use crate::scanner::{ScanContext, ScanInput, Scanner, ScannerKind};
use crate::store::Store;

/// Counters of one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub locators: usize,
    pub skipped_locators: usize,
    pub entries: usize,
    pub extraction_failures: usize,
    pub scanner_failures: usize,
    pub expanded_edges: usize,
    pub from_cache: bool,
    pub elapsed: Duration,
}

impl ScanStats {
    fn absorb(&mut self, other: ScanStats) {
        self.locators += other.locators;
        self.skipped_locators += other.skipped_locators;
        self.entries += other.entries;
        self.extraction_failures += other.extraction_failures;
        self.scanner_failures += other.scanner_failures;
    }
}

struct ScanSession {
    vfs: Vfs,
    filter: Filter,
    scanners: Vec<Arc<dyn Scanner>>,
    backend: Arc<dyn ExtractionBackend>,
    context: ScanContext,
}

impl Typedex {
    /// Scans `config.locators`, on a dedicated pool of
    /// `config.parallelism` workers when one was requested.
    pub fn scan(config: ScanConfig) -> Result<Self> {
        let pool = config.thread_pool()?;
        Self::scan_with_pool(config, pool)
    }

    /// Scans with a caller-supplied worker pool, one task per locator.
    ///
    /// The pool is shut down once every task has finished; without one the
    /// scan runs serially in the calling thread. Failed locators and
    /// entries are logged and skipped, while a fatal scanner error aborts
    /// the scan.
    pub fn scan_with_pool(config: ScanConfig, pool: Option<rayon::ThreadPool>) -> Result<Self> {
        let started = Instant::now();
        let vfs = config.vfs();
        let mut resolver_locators = config.locators.clone();
        resolver_locators.extend(config.classpath.iter().cloned());
        let class_pool = Arc::new(ClassPool::new(vfs.clone(), resolver_locators));
        let resolver: Arc<dyn TypeResolver> = class_pool.clone();

        let cache = config.cache_dir.as_ref().map(ScanCache::new);
        let key = match &cache {
            Some(_) => ScanKey::capture(
                &config.locators,
                &config.classpath,
                config.settings_digest(),
            )
            .unwrap_or_else(|err| {
                warn!(error = %err, "scan cache disabled for this session");
                None
            }),
            None => None,
        };
        if let (Some(cache), Some(key)) = (&cache, &key) {
            match cache.load(key) {
                Ok(Some(cached)) => {
                    info!(
                        cache = %cache.root().display(),
                        scanned_ms = cached.scan_ms,
                        "store loaded from cache"
                    );
                    let mut typedex = Typedex::new(Store::from_snapshot(cached.snapshot))
                        .with_resolver(resolver);
                    typedex.stats = Some(ScanStats {
                        locators: config.locators.len(),
                        from_cache: true,
                        elapsed: started.elapsed(),
                        ..ScanStats::default()
                    });
                    return Ok(typedex);
                }
                Ok(None) => debug!("scan cache miss"),
                Err(err) => warn!(error = %err, "ignoring unusable scan cache"),
            }
        }

        let scanners = config.build_scanners();
        let session = ScanSession {
            vfs,
            filter: config.filter.clone(),
            backend: config.policy.select(&class_pool)?,
            context: ScanContext {
                filter: config.filter.clone(),
                resolver: Arc::clone(&resolver),
            },
            scanners,
        };
        debug!(
            locators = config.locators.len(),
            backend = session.backend.name(),
            parallel = pool.is_some(),
            "scan started"
        );

        let outcomes: Vec<Result<ScanStats>> = match pool {
            Some(pool) => {
                let outcomes = pool.install(|| {
                    config
                        .locators
                        .par_iter()
                        .map(|locator| session.scan_locator(locator))
                        .collect()
                });
                drop(pool);
                outcomes
            }
            None => config
                .locators
                .iter()
                .map(|locator| session.scan_locator(locator))
                .collect(),
        };
        let mut stats = ScanStats::default();
        for outcome in outcomes {
            stats.absorb(outcome?);
        }

        // Every task has finished; nothing else mutates the indices.
        let mut store = Store::new();
        for scanner in &session.scanners {
            store.insert(scanner.name(), Arc::clone(scanner.index()));
        }
        if config.expand_super_types {
            if let Some(subtypes) = store.get(ScannerKind::SubTypes.name()) {
                stats.expanded_edges = expand_super_types(subtypes, resolver.as_ref());
            }
        }
        stats.elapsed = started.elapsed();

        for (name, index) in store.iter() {
            debug!(
                scanner = name,
                keys = index.keys_count(),
                values = index.values_count(),
                "index summary"
            );
        }
        info!(
            locators = stats.locators,
            skipped = stats.skipped_locators,
            entries = stats.entries,
            keys = store.keys_count(),
            values = store.values_count(),
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "scan finished"
        );

        if let (Some(cache), Some(key)) = (&cache, &key) {
            match cache.save(key, store.snapshot(), stats.elapsed) {
                Ok(path) => debug!(entry = %path.display(), "scan cached"),
                Err(err) => warn!(error = %err, "failed to write scan cache"),
            }
        }

        let mut typedex = Typedex::new(store).with_resolver(resolver);
        typedex.stats = Some(stats);
        Ok(typedex)
    }
}

impl ScanSession {
    fn scan_locator(&self, locator: &SourceLocator) -> Result<ScanStats> {
        let mut stats = ScanStats {
            locators: 1,
            ..ScanStats::default()
        };
        let mut dir = match self.vfs.resolve(locator) {
            Ok(dir) => dir,
            Err(err) => {
                warn!(locator = %locator, error = %err, "skipping unavailable source");
                stats.skipped_locators = 1;
                return Ok(stats);
            }
        };
        let entries = match dir.entries() {
            Ok(entries) => entries,
            Err(err) => {
                warn!(locator = %locator, error = %err, "could not enumerate source");
                stats.skipped_locators = 1;
                return Ok(stats);
            }
        };
        for entry in entries {
            match entry {
                Ok(entry) => self.scan_entry(&entry, &mut stats)?,
                Err(err) => warn!(locator = %locator, error = %err, "skipping unreadable entry"),
            }
        }
        Ok(stats)
    }

    fn accepts_input(&self, entry: &Entry) -> bool {
        let path = entry.relative_path();
        self.filter.accepts(path) || self.filter.accepts(&path.replace('/', "."))
    }

    fn scan_entry(&self, entry: &Entry, stats: &mut ScanStats) -> Result<()> {
        if !self.accepts_input(entry) {
            return Ok(());
        }
        let interested: Vec<&Arc<dyn Scanner>> = self
            .scanners
            .iter()
            .filter(|scanner| scanner.accepts(entry))
            .collect();
        if interested.is_empty() {
            return Ok(());
        }
        stats.entries += 1;

        let wants_descriptor = entry.name().ends_with(".class")
            && interested.iter().any(|scanner| scanner.needs_descriptor());
        let descriptor = if wants_descriptor {
            match self.backend.extract(entry) {
                Ok(descriptor) => Some(descriptor),
                Err(err) => {
                    warn!(entry = entry.relative_path(), error = %err, "skipping unreadable type");
                    stats.extraction_failures += 1;
                    None
                }
            }
        } else {
            None
        };

        let input = ScanInput {
            entry,
            descriptor: descriptor.as_ref(),
        };
        for scanner in interested {
            if scanner.needs_descriptor() && input.descriptor.is_none() {
                continue;
            }
            if let Err(err) = scanner.scan(&input, &self.context) {
                if err.is_fatal() {
                    return Err(err);
                }
                warn!(
                    scanner = scanner.name(),
                    entry = entry.relative_path(),
                    error = %err,
                    "scanner skipped entry"
                );
                stats.scanner_failures += 1;
            }
        }
        Ok(())
    }
}
