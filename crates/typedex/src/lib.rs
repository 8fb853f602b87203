//! Queryable index of structural facts about compiled JVM types.
//!
//! A scan resolves every source locator through the virtual source layer,
//! extracts a [`TypeDescriptor`] per compiled type and lets each configured
//! [`Scanner`] record facts into its own append-only [`Index`]. The resulting
//! [`Typedex`] answers hierarchy, tag, member, usage and resource queries,
//! and can be saved as XML or JSON and collected back from many sources.

mod backend;
mod cache;
mod collect;
mod config;
mod descriptor;
mod error;
mod filter;
mod persist;
mod pool;
mod query;
mod scan;
pub mod scanner;
mod store;
mod tag;

pub use backend::{ExtractionBackend, ExtractionPolicy, IntrospectionBackend};
#[cfg(feature = "structural")]
pub use backend::StructuralBackend;
pub use cache::{CacheError, CachedScan, ScanCache, ScanKey};
pub use collect::{Collector, DEFAULT_NAME_PATTERN, DEFAULT_PREFIX};
pub use config::{ScanConfig, ScannerFactory};
pub use descriptor::{
    FieldDescriptor, INHERITED, MethodDescriptor, OBJECT, TypeDescriptor, TypeKind, field_key,
    method_signature, split_member_key,
};
pub use error::{ExtractionError, Result, TypedexError};
pub use filter::{Filter, FilterError, Pattern};
pub use persist::Format;
pub use pool::{ClassPool, TypeResolver};
pub use query::Typedex;
pub use scan::ScanStats;
pub use scanner::{ScanContext, ScanInput, Scanner, ScannerKind};
pub use store::{Index, IndexSnapshot, Store, StoreSnapshot};
pub use tag::{TagInstance, TagValue};

pub use typedex_vfs::{Entry, SourceLocator, Vfs};
