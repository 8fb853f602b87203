use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use typedex_vfs::{ResolverStrategy, SourceLocator, Vfs};

use crate::backend::ExtractionPolicy;
use crate::error::{Result, TypedexError};
use crate::filter::Filter;
use crate::scanner::{Scanner, ScannerKind};

/// Builds a fresh caller-defined scanner for each scan session.
pub type ScannerFactory = Arc<dyn Fn() -> Arc<dyn Scanner> + Send + Sync>;

/// Inputs of one scan session.
#[derive(Clone)]
pub struct ScanConfig {
    pub locators: Vec<SourceLocator>,
    /// Extra locators consulted only when resolving types, never scanned.
    pub classpath: Vec<SourceLocator>,
    /// Session input filter, matched against entry paths.
    pub filter: Filter,
    pub scanners: Vec<ScannerKind>,
    /// Caller-defined scanners; they replace a same-named built-in kind.
    pub custom_scanners: Vec<ScannerFactory>,
    pub policy: ExtractionPolicy,
    /// `None` scans serially in the caller's thread; `Some(0)` uses the
    /// available parallelism.
    pub parallelism: Option<usize>,
    pub expand_super_types: bool,
    pub cache_dir: Option<PathBuf>,
    /// Appended after the default resolver strategies.
    pub strategies: Vec<Arc<dyn ResolverStrategy>>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            locators: Vec::new(),
            classpath: Vec::new(),
            filter: Filter::accept_all(),
            scanners: Vec::new(),
            custom_scanners: Vec::new(),
            policy: ExtractionPolicy::default(),
            parallelism: None,
            expand_super_types: true,
            cache_dir: None,
            strategies: Vec::new(),
        }
    }
}

impl fmt::Debug for ScanConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanConfig")
            .field("locators", &self.locators)
            .field("classpath", &self.classpath)
            .field("filter", &self.filter)
            .field("scanners", &self.scanner_names())
            .field("policy", &self.policy)
            .field("parallelism", &self.parallelism)
            .field("expand_super_types", &self.expand_super_types)
            .field("cache_dir", &self.cache_dir)
            .finish()
    }
}

/// `typedex.toml` as written on disk.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawScanConfig {
    locators: Vec<String>,
    classpath: Vec<String>,
    /// `+regex,-regex` over entry paths.
    filter: Option<String>,
    /// `+package,-package`
    packages: Option<String>,
    scanners: Vec<String>,
    policy: Option<ExtractionPolicy>,
    parallelism: Option<usize>,
    expand_super_types: Option<bool>,
    cache_dir: Option<PathBuf>,
}

impl ScanConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_locators<I, L>(locators: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<SourceLocator>,
    {
        Self::default().with_locators(locators)
    }

    pub fn with_locators<I, L>(mut self, locators: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<SourceLocator>,
    {
        self.locators.extend(locators.into_iter().map(Into::into));
        self
    }

    pub fn add_locator(mut self, locator: impl Into<SourceLocator>) -> Self {
        self.locators.push(locator.into());
        self
    }

    pub fn add_classpath(mut self, locator: impl Into<SourceLocator>) -> Self {
        self.classpath.push(locator.into());
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_scanners(mut self, scanners: impl IntoIterator<Item = ScannerKind>) -> Self {
        self.scanners = scanners.into_iter().collect();
        self
    }

    /// Registers a scanner built anew by `factory` for every scan, so
    /// indices of earlier results are never written again.
    pub fn add_scanner<F, S>(mut self, factory: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: Scanner + 'static,
    {
        self.custom_scanners
            .push(Arc::new(move || Arc::new(factory()) as Arc<dyn Scanner>));
        self
    }

    pub fn with_policy(mut self, policy: ExtractionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_parallelism(mut self, workers: Option<usize>) -> Self {
        self.parallelism = workers;
        self
    }

    pub fn with_super_type_expansion(mut self, enabled: bool) -> Self {
        self.expand_super_types = enabled;
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn add_strategy(mut self, strategy: Arc<dyn ResolverStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Reads a TOML configuration from `path`. Relative `cache_dir` values
    /// resolve against the file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| TypedexError::io(path, source))?;
        let mut config = Self::parse_toml(&contents, &path.display().to_string())?;
        if let (Some(dir), Some(base)) = (&config.cache_dir, path.parent()) {
            if dir.is_relative() {
                config.cache_dir = Some(base.join(dir));
            }
        }
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Self::parse_toml(contents, "<inline>")
    }

    fn parse_toml(contents: &str, origin: &str) -> Result<Self> {
        let raw: RawScanConfig = toml::from_str(contents).map_err(|source| TypedexError::Config {
            origin: origin.to_string(),
            source,
        })?;

        // Package items come first so that path excludes still apply to them.
        let mut filter = match &raw.packages {
            Some(packages) => Filter::parse_packages(packages)?,
            None => Filter::accept_all(),
        };
        if let Some(expression) = &raw.filter {
            filter = match Filter::parse(expression)? {
                Filter::Composite(items) => items.into_iter().fold(filter, Filter::and),
                single => filter.and(single),
            };
        }

        let scanners = raw
            .scanners
            .iter()
            .map(|name| name.parse::<ScannerKind>())
            .collect::<Result<Vec<_>>>()?;

        let defaults = Self::default();
        Ok(Self {
            locators: raw.locators.into_iter().map(SourceLocator::new).collect(),
            classpath: raw.classpath.into_iter().map(SourceLocator::new).collect(),
            filter,
            scanners,
            policy: raw.policy.unwrap_or(defaults.policy),
            parallelism: raw.parallelism,
            expand_super_types: raw.expand_super_types.unwrap_or(defaults.expand_super_types),
            cache_dir: raw.cache_dir,
            ..defaults
        })
    }

    /// Built-in kinds to run, falling back to the defaults when nothing
    /// was configured.
    pub fn scanner_kinds(&self) -> Vec<ScannerKind> {
        if self.scanners.is_empty() && self.custom_scanners.is_empty() {
            ScannerKind::defaults()
        } else {
            self.scanners.clone()
        }
    }

    /// Fresh scanner instances for one session.
    pub fn build_scanners(&self) -> Vec<Arc<dyn Scanner>> {
        let custom: Vec<Arc<dyn Scanner>> =
            self.custom_scanners.iter().map(|factory| factory()).collect();
        let mut scanners: Vec<Arc<dyn Scanner>> = self
            .scanner_kinds()
            .into_iter()
            .filter(|kind| !custom.iter().any(|scanner| scanner.name() == kind.name()))
            .map(ScannerKind::build)
            .collect();
        scanners.extend(custom);
        scanners
    }

    pub fn scanner_names(&self) -> Vec<String> {
        self.build_scanners()
            .iter()
            .map(|scanner| scanner.name().to_string())
            .collect()
    }

    pub(crate) fn vfs(&self) -> Vfs {
        self.strategies
            .iter()
            .cloned()
            .fold(Vfs::default(), Vfs::with_strategy)
    }

    /// Everything that changes the content of a scan, for cache keys.
    pub(crate) fn settings_digest(&self) -> String {
        let mut scanners: Vec<String> = self
            .build_scanners()
            .iter()
            .map(|scanner| scanner.fingerprint())
            .collect();
        scanners.sort();
        format!(
            "scanners={};filter={};policy={:?};expand={};strategies={};classpath={}",
            scanners.join(","),
            self.filter,
            self.policy,
            self.expand_super_types,
            self.strategies
                .iter()
                .map(|strategy| strategy.name())
                .collect::<Vec<_>>()
                .join(","),
            self.classpath
                .iter()
                .map(SourceLocator::as_str)
                .collect::<Vec<_>>()
                .join(";")
        )
    }

    /// A dedicated worker pool when parallel scanning was requested.
    pub fn thread_pool(&self) -> Result<Option<rayon::ThreadPool>> {
        let Some(workers) = self.parallelism else {
            return Ok(None);
        };
        rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("typedex-scan-{index}"))
            .build()
            .map(Some)
            .map_err(|err| TypedexError::Configuration(format!("cannot start scan workers: {err}")))
    }
}
