use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use tracing::debug;
use typedex_classfile::{ClassFile, internal_name, parse_class};
use typedex_vfs::{Entry, SourceLocator, Vfs};

use crate::descriptor::TypeDescriptor;
use crate::error::ExtractionError;

/// Best-effort lookup of type descriptors by qualified name.
///
/// A miss is not an error: callers drop names that no longer resolve.
pub trait TypeResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Option<Arc<TypeDescriptor>>;

    fn is_resolvable(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// The type in `owner`'s ancestry that declares method `name` with
    /// `descriptor`: the owner itself, then superclasses, then interfaces.
    fn declaring_method_owner(&self, owner: &str, name: &str, descriptor: &str) -> Option<String> {
        self.find_in_ancestry(owner, &|ty| ty.method(name, descriptor).is_some())
    }

    fn declaring_field_owner(&self, owner: &str, name: &str) -> Option<String> {
        self.find_in_ancestry(owner, &|ty| ty.field(name).is_some())
    }

    fn find_in_ancestry(
        &self,
        owner: &str,
        declares: &dyn Fn(&TypeDescriptor) -> bool,
    ) -> Option<String> {
        let mut queue = VecDeque::from([owner.to_string()]);
        let mut seen = HashSet::new();
        let mut interfaces = VecDeque::new();
        while let Some(name) = queue.pop_front().or_else(|| interfaces.pop_front()) {
            if !seen.insert(name.clone()) {
                continue;
            }
            let Some(ty) = self.resolve(&name) else {
                continue;
            };
            if declares(&ty) {
                return Some(name);
            }
            if let Some(super_class) = &ty.super_class {
                queue.push_back(super_class.clone());
            }
            interfaces.extend(ty.interfaces.iter().cloned());
        }
        None
    }
}

/// Classpath-wide resolver over a set of locators.
///
/// The catalog of compiled records is built on first use; parsed
/// descriptors are memoized, misses included.
pub struct ClassPool {
    vfs: Vfs,
    locators: Vec<SourceLocator>,
    catalog: OnceLock<HashMap<String, Entry>>,
    preloaded: DashMap<String, Arc<TypeDescriptor>>,
    resolved: DashMap<String, Option<Arc<TypeDescriptor>>>,
}

impl std::fmt::Debug for ClassPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassPool")
            .field("locators", &self.locators)
            .field("resolved", &self.resolved.len())
            .finish()
    }
}

impl ClassPool {
    pub fn new(vfs: Vfs, locators: Vec<SourceLocator>) -> Self {
        Self {
            vfs,
            locators,
            catalog: OnceLock::new(),
            preloaded: DashMap::new(),
            resolved: DashMap::new(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vfs::default(), Vec::new())
    }

    pub fn locators(&self) -> &[SourceLocator] {
        &self.locators
    }

    /// Registers a descriptor that takes precedence over the classpath.
    pub fn insert(&self, descriptor: TypeDescriptor) {
        self.preloaded
            .insert(descriptor.name.clone(), Arc::new(descriptor));
    }

    fn catalog(&self) -> &HashMap<String, Entry> {
        self.catalog.get_or_init(|| {
            let entries = self
                .vfs
                .find_entries(&self.locators, |entry| entry.relative_path().ends_with(".class"));
            let mut catalog = HashMap::with_capacity(entries.len());
            for entry in entries {
                // Earlier locators shadow later ones.
                catalog
                    .entry(entry.relative_path().to_string())
                    .or_insert(entry);
            }
            debug!(records = catalog.len(), "class pool catalog built");
            catalog
        })
    }

    /// Loads and parses the record for `name`.
    pub fn class_file(&self, name: &str) -> Result<ClassFile, ExtractionError> {
        let path = format!("{}.class", internal_name(name));
        let entry = self
            .catalog()
            .get(&path)
            .ok_or_else(|| ExtractionError::Unresolvable {
                name: name.to_string(),
            })?;
        let bytes = entry.read_bytes().map_err(|source| ExtractionError::Read {
            path: path.clone(),
            source,
        })?;
        parse_class(&bytes).map_err(|source| ExtractionError::Malformed { path, source })
    }

    /// Looks `name` up and builds its descriptor.
    pub fn introspect(&self, name: &str) -> Result<TypeDescriptor, ExtractionError> {
        if let Some(descriptor) = self.preloaded.get(name) {
            return Ok(descriptor.as_ref().clone());
        }
        let class = self.class_file(name)?;
        TypeDescriptor::from_class_file(&class).map_err(|source| ExtractionError::Malformed {
            path: name.to_string(),
            source,
        })
    }
}

impl TypeResolver for ClassPool {
    fn resolve(&self, name: &str) -> Option<Arc<TypeDescriptor>> {
        if let Some(descriptor) = self.preloaded.get(name) {
            return Some(Arc::clone(descriptor.value()));
        }
        if let Some(cached) = self.resolved.get(name) {
            return cached.value().clone();
        }
        let resolved = match self.introspect(name) {
            Ok(descriptor) => Some(Arc::new(descriptor)),
            Err(err) => {
                debug!(type_name = name, error = %err, "type not resolvable");
                None
            }
        };
        self.resolved.insert(name.to_string(), resolved.clone());
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;
    use typedex_classfile::fixtures::{ClassBuilder, FieldSpec, MethodSpec};

    fn write_class(root: &std::path::Path, builder: &ClassBuilder) {
        let path = root.join(builder.relative_path());
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, builder.build()).expect("write class");
    }

    #[test]
    fn resolves_records_by_name_and_memoizes_misses() {
        let temp = tempdir().unwrap();
        write_class(temp.path(), &ClassBuilder::new("app.Foo").extends("app.Base"));
        let pool = ClassPool::new(Vfs::default(), vec![SourceLocator::from_path(temp.path())]);

        let foo = pool.resolve("app.Foo").expect("resolves");
        assert_eq!(foo.super_class.as_deref(), Some("app.Base"));
        assert!(pool.resolve("app.Missing").is_none());
        assert!(!pool.is_resolvable("app.Missing"));
    }

    #[test]
    fn earlier_locators_shadow_later_ones() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        write_class(first.path(), &ClassBuilder::new("app.Dup").implements("app.First"));
        write_class(second.path(), &ClassBuilder::new("app.Dup").implements("app.Second"));
        let pool = ClassPool::new(
            Vfs::default(),
            vec![
                SourceLocator::from_path(first.path()),
                SourceLocator::from_path(second.path()),
            ],
        );
        assert_eq!(pool.resolve("app.Dup").unwrap().interfaces, vec!["app.First"]);
    }

    #[test]
    fn finds_declaring_owner_through_ancestry() {
        let temp = tempdir().unwrap();
        write_class(
            temp.path(),
            &ClassBuilder::new("app.Base")
                .method(MethodSpec::new("run", "()V"))
                .field(FieldSpec::new("state", "I")),
        );
        write_class(
            temp.path(),
            &ClassBuilder::interface("app.Greeter").method(MethodSpec::new("greet", "()V")),
        );
        write_class(
            temp.path(),
            &ClassBuilder::new("app.Child")
                .extends("app.Base")
                .implements("app.Greeter"),
        );
        let pool = ClassPool::new(Vfs::default(), vec![SourceLocator::from_path(temp.path())]);

        assert_eq!(
            pool.declaring_method_owner("app.Child", "run", "()V").as_deref(),
            Some("app.Base")
        );
        assert_eq!(
            pool.declaring_method_owner("app.Child", "greet", "()V").as_deref(),
            Some("app.Greeter")
        );
        assert_eq!(
            pool.declaring_field_owner("app.Child", "state").as_deref(),
            Some("app.Base")
        );
        assert_eq!(pool.declaring_method_owner("app.Child", "nope", "()V"), None);
    }
}
