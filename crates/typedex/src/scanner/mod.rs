//! Scanner plugins. Each scanner owns one [`Index`] and records a single kind
//! of fact for every entry it accepts.

mod members;
mod resources;
mod types;
mod usage;

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use typedex_vfs::Entry;

use crate::descriptor::TypeDescriptor;
use crate::error::{Result, TypedexError};
use crate::filter::Filter;
use crate::pool::TypeResolver;
use crate::store::Index;

pub use members::{
    MemberTagsScanner, ParameterNamesScanner, ParameterTagsScanner, ParameterTypesScanner,
    ReturnTypesScanner,
};
pub use resources::ResourcesScanner;
pub use types::{SubTypesScanner, TypeElementsScanner, TypeTagsScanner};
pub use usage::MemberUsageScanner;

/// What a scanner sees for one accepted entry.
pub struct ScanInput<'a> {
    pub entry: &'a Entry,
    /// Present for compiled-type entries that extracted successfully.
    pub descriptor: Option<&'a TypeDescriptor>,
}

/// Session state shared with every scanner.
#[derive(Clone)]
pub struct ScanContext {
    pub filter: Filter,
    pub resolver: Arc<dyn TypeResolver>,
}

pub trait Scanner: Send + Sync {
    /// Scanner type name; same-named indices may be merged.
    fn name(&self) -> &str;

    fn index(&self) -> &Arc<Index>;

    /// Output filter applied to recorded keys.
    fn result_filter(&self) -> &Filter;

    /// Everything about this scanner's setup that changes what it records.
    /// Scanners with extra options beyond the result filter must include them.
    fn fingerprint(&self) -> String {
        format!("{}[{}]", self.name(), self.result_filter())
    }

    /// Scanner-specific input predicate; compiled types by default.
    fn accepts(&self, entry: &Entry) -> bool {
        entry.name().ends_with(".class")
    }

    /// Whether `scan` needs the extracted descriptor.
    fn needs_descriptor(&self) -> bool {
        true
    }

    fn scan(&self, input: &ScanInput<'_>, context: &ScanContext) -> Result<()>;

    fn accepts_result(&self, key: &str) -> bool {
        self.result_filter().accepts(key)
    }

    fn add_entry(&self, key: &str, value: &str) -> bool {
        self.index().put(key, value)
    }

    /// Records `key -> value` when the key passes the result filter.
    fn record(&self, key: &str, value: &str) -> bool {
        self.accepts_result(key) && self.add_entry(key, value)
    }

    fn keys(&self) -> HashSet<String> {
        self.index().keys()
    }

    fn values_of(&self, key: &str) -> HashSet<String> {
        self.index().values_of(key)
    }

    fn values_of_all(&self, keys: &[String]) -> HashSet<String> {
        self.index().values_of_all(keys)
    }

    fn recursive_values_excluding_self(&self, keys: &[String]) -> HashSet<String> {
        self.index().recursive_values_excluding_self(keys)
    }

    fn recursive_values_including_self(&self, keys: &[String]) -> HashSet<String> {
        self.index().recursive_values_including_self(keys)
    }
}

/// Per-scanner index plus output filter.
#[derive(Debug, Default)]
pub(crate) struct ScannerState {
    pub(crate) index: Arc<Index>,
    pub(crate) result_filter: Filter,
}

impl ScannerState {
    pub(crate) fn with_filter(result_filter: Filter) -> Self {
        Self {
            index: Arc::new(Index::new()),
            result_filter,
        }
    }
}

/// The built-in scanners, by their index names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ScannerKind {
    SubTypes,
    TypeTags,
    MemberTags,
    ParameterTypes,
    ParameterTags,
    ReturnTypes,
    ParameterNames,
    Resources,
    MemberUsage,
    TypeElements,
}

impl ScannerKind {
    pub const ALL: [ScannerKind; 10] = [
        ScannerKind::SubTypes,
        ScannerKind::TypeTags,
        ScannerKind::MemberTags,
        ScannerKind::ParameterTypes,
        ScannerKind::ParameterTags,
        ScannerKind::ReturnTypes,
        ScannerKind::ParameterNames,
        ScannerKind::Resources,
        ScannerKind::MemberUsage,
        ScannerKind::TypeElements,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ScannerKind::SubTypes => "SubTypes",
            ScannerKind::TypeTags => "TypeTags",
            ScannerKind::MemberTags => "MemberTags",
            ScannerKind::ParameterTypes => "ParameterTypes",
            ScannerKind::ParameterTags => "ParameterTags",
            ScannerKind::ReturnTypes => "ReturnTypes",
            ScannerKind::ParameterNames => "ParameterNames",
            ScannerKind::Resources => "Resources",
            ScannerKind::MemberUsage => "MemberUsage",
            ScannerKind::TypeElements => "TypeElements",
        }
    }

    /// A fresh scanner with its default result filter.
    pub fn build(self) -> Arc<dyn Scanner> {
        match self {
            ScannerKind::SubTypes => Arc::new(SubTypesScanner::new()),
            ScannerKind::TypeTags => Arc::new(TypeTagsScanner::new()),
            ScannerKind::MemberTags => Arc::new(MemberTagsScanner::new()),
            ScannerKind::ParameterTypes => Arc::new(ParameterTypesScanner::new()),
            ScannerKind::ParameterTags => Arc::new(ParameterTagsScanner::new()),
            ScannerKind::ReturnTypes => Arc::new(ReturnTypesScanner::new()),
            ScannerKind::ParameterNames => Arc::new(ParameterNamesScanner::new()),
            ScannerKind::Resources => Arc::new(ResourcesScanner::new()),
            ScannerKind::MemberUsage => Arc::new(MemberUsageScanner::new()),
            ScannerKind::TypeElements => Arc::new(TypeElementsScanner::new()),
        }
    }

    /// Scanners run when none are configured.
    pub fn defaults() -> Vec<ScannerKind> {
        vec![ScannerKind::SubTypes, ScannerKind::TypeTags]
    }
}

impl fmt::Display for ScannerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScannerKind {
    type Err = TypedexError;

    fn from_str(value: &str) -> Result<Self> {
        ScannerKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(value))
            .ok_or_else(|| TypedexError::Configuration(format!("unknown scanner `{value}`")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_round_trip_through_names() {
        for kind in ScannerKind::ALL {
            assert_eq!(kind.name().parse::<ScannerKind>().unwrap(), kind);
            assert_eq!(kind.build().name(), kind.name());
        }
        assert_eq!("subtypes".parse::<ScannerKind>().unwrap(), ScannerKind::SubTypes);
        assert!("Nope".parse::<ScannerKind>().is_err());
    }

    #[test]
    fn only_resources_accepts_plain_files() {
        let class = Entry::from_bytes("app/Config.class", Vec::new());
        let props = Entry::from_bytes("app/config.properties", Vec::new());
        for kind in ScannerKind::ALL {
            let scanner = kind.build();
            let is_resources = kind == ScannerKind::Resources;
            assert_eq!(scanner.accepts(&class), !is_resources, "{kind}");
            assert_eq!(scanner.accepts(&props), is_resources, "{kind}");
        }
    }
}
