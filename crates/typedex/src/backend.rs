use std::sync::Arc;

use serde::{Deserialize, Serialize};
use typedex_vfs::Entry;

use crate::descriptor::TypeDescriptor;
use crate::error::{ExtractionError, Result, TypedexError};
use crate::pool::ClassPool;

/// Turns one compiled-type entry into a [`TypeDescriptor`].
pub trait ExtractionBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn extract(&self, entry: &Entry) -> Result<TypeDescriptor, ExtractionError>;
}

/// Session-wide choice of extraction backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionPolicy {
    /// Structural parsing when compiled in, introspection otherwise.
    #[default]
    Auto,
    Structural,
    Introspection,
}

impl ExtractionPolicy {
    pub fn select(self, pool: &Arc<ClassPool>) -> Result<Arc<dyn ExtractionBackend>> {
        match self {
            ExtractionPolicy::Structural => structural_backend().ok_or_else(|| {
                TypedexError::Configuration(
                    "structural extraction requested but the `structural` feature is disabled"
                        .to_string(),
                )
            }),
            ExtractionPolicy::Introspection => {
                Ok(Arc::new(IntrospectionBackend::new(Arc::clone(pool))))
            }
            ExtractionPolicy::Auto => Ok(structural_backend()
                .unwrap_or_else(|| Arc::new(IntrospectionBackend::new(Arc::clone(pool))))),
        }
    }
}

#[cfg(feature = "structural")]
fn structural_backend() -> Option<Arc<dyn ExtractionBackend>> {
    Some(Arc::new(StructuralBackend))
}

#[cfg(not(feature = "structural"))]
fn structural_backend() -> Option<Arc<dyn ExtractionBackend>> {
    None
}

/// Parses the record's bytes directly; never loads referenced types.
#[cfg(feature = "structural")]
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuralBackend;

#[cfg(feature = "structural")]
impl ExtractionBackend for StructuralBackend {
    fn name(&self) -> &'static str {
        "structural"
    }

    fn extract(&self, entry: &Entry) -> Result<TypeDescriptor, ExtractionError> {
        let path = entry.relative_path();
        let bytes = entry.read_bytes().map_err(|source| ExtractionError::Read {
            path: path.to_string(),
            source,
        })?;
        let class = typedex_classfile::parse_class(&bytes).map_err(|source| {
            ExtractionError::Malformed {
                path: path.to_string(),
                source,
            }
        })?;
        TypeDescriptor::from_class_file(&class).map_err(|source| ExtractionError::Malformed {
            path: path.to_string(),
            source,
        })
    }
}

/// Derives the type name from the entry path and asks the class pool for it.
///
/// Only types reachable through the pool's locators can be described.
#[derive(Debug)]
pub struct IntrospectionBackend {
    pool: Arc<ClassPool>,
}

impl IntrospectionBackend {
    pub fn new(pool: Arc<ClassPool>) -> Self {
        Self { pool }
    }
}

impl ExtractionBackend for IntrospectionBackend {
    fn name(&self) -> &'static str {
        "introspection"
    }

    fn extract(&self, entry: &Entry) -> Result<TypeDescriptor, ExtractionError> {
        let name = type_name_of(entry.relative_path()).ok_or_else(|| {
            ExtractionError::Unresolvable {
                name: entry.relative_path().to_string(),
            }
        })?;
        let descriptor = self.pool.introspect(&name)?;
        if descriptor.name != name {
            return Err(ExtractionError::Unresolvable { name });
        }
        Ok(descriptor)
    }
}

/// `a/b/C.class` -> `a.b.C`
pub(crate) fn type_name_of(relative_path: &str) -> Option<String> {
    let stem = relative_path.strip_suffix(".class")?;
    if stem.is_empty() {
        return None;
    }
    Some(stem.replace('/', "."))
}
