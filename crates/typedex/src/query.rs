use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use tracing::debug;
use typedex_vfs::{SourceLocator, Vfs};

use crate::descriptor::{INHERITED, OBJECT, split_member_key};
use crate::error::{Result, TypedexError};
use crate::pool::{ClassPool, TypeResolver};
use crate::scan::ScanStats;
use crate::scanner::ScannerKind;
use crate::store::{Index, Store};
use crate::tag::TagInstance;

/// A scanned store plus the resolver used to answer queries against it.
///
/// Queries against a scanner that did not take part in the scan fail with
/// [`TypedexError::ScannerNotConfigured`]. Names that no longer resolve are
/// dropped from type-valued answers; without a resolver nothing is dropped.
#[derive(Clone, Default)]
pub struct Typedex {
    store: Store,
    resolver: Option<Arc<dyn TypeResolver>>,
    pub(crate) stats: Option<ScanStats>,
}

impl std::fmt::Debug for Typedex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Typedex")
            .field("store", &self.store)
            .field("resolver", &self.resolver.is_some())
            .field("stats", &self.stats)
            .finish()
    }
}

impl Typedex {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            resolver: None,
            stats: None,
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn TypeResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Resolves names against the compiled types reachable from `locators`.
    pub fn with_classpath(self, locators: Vec<SourceLocator>) -> Self {
        self.with_resolver(Arc::new(ClassPool::new(Vfs::default(), locators)))
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn into_store(self) -> Store {
        self.store
    }

    pub fn resolver(&self) -> Option<&Arc<dyn TypeResolver>> {
        self.resolver.as_ref()
    }

    /// Counters of the scan that produced this store, if any.
    pub fn stats(&self) -> Option<&ScanStats> {
        self.stats.as_ref()
    }

    /// Unions every index of `other` into this one. The resolver is kept.
    pub fn merge(&mut self, other: &Typedex) {
        self.store.merge(&other.store);
    }

    fn index(&self, kind: ScannerKind) -> Result<&Index> {
        self.store.index(kind.name())
    }

    fn resolvable(&self, names: HashSet<String>) -> BTreeSet<String> {
        match &self.resolver {
            Some(resolver) => names
                .into_iter()
                .filter(|name| resolver.is_resolvable(name))
                .collect(),
            None => names.into_iter().collect(),
        }
    }

    /// Every transitive subtype of `name`, excluding `name` itself.
    pub fn subtypes_of(&self, name: &str) -> Result<BTreeSet<String>> {
        let subtypes = self.index(ScannerKind::SubTypes)?;
        Ok(self.resolvable(subtypes.recursive_values_excluding_self([name])))
    }

    /// Every scanned type. Needs a subtype index that kept edges from the
    /// universal root.
    pub fn all_types(&self) -> Result<BTreeSet<String>> {
        let subtypes = self.index(ScannerKind::SubTypes)?;
        let all = subtypes.recursive_values_excluding_self([OBJECT]);
        if all.is_empty() {
            return Err(TypedexError::Configuration(format!(
                "no subtypes of {OBJECT} were recorded; scan with SubTypesScanner::with_object()"
            )));
        }
        Ok(all.into_iter().collect())
    }

    /// Types carrying `tag`, directly or through the hierarchy.
    ///
    /// With `honor_inherited` only tags marked inheritable flow to subtypes,
    /// and only from tagged classes, never interfaces. Without it every
    /// subtype of a tagged type counts, as do types tagged with a tag that
    /// is itself tagged with `tag`.
    pub fn types_tagged_with(&self, tag: &str, honor_inherited: bool) -> Result<BTreeSet<String>> {
        let tags = self.index(ScannerKind::TypeTags)?;
        let annotated = tags.values_of(tag);
        let inherited = self.is_inherited_tag(tags, tag);
        self.all_tagged(annotated, inherited, honor_inherited)
    }

    /// Like [`Typedex::types_tagged_with`], but a directly tagged type only
    /// counts when its applied tag equals `instance`, member values included.
    /// Subtypes that carry a different instance of the same tag are left out.
    pub fn types_tagged_with_instance(
        &self,
        instance: &TagInstance,
        honor_inherited: bool,
    ) -> Result<BTreeSet<String>> {
        let tags = self.index(ScannerKind::TypeTags)?;
        let expected = self.complete(instance);
        let annotated = tags.values_of(&instance.type_name);
        let matching: HashSet<String> = annotated
            .iter()
            .filter(|name| {
                self.resolve(name)
                    .and_then(|ty| ty.tag(&instance.type_name).cloned())
                    .is_some_and(|applied| self.complete(&applied) == expected)
            })
            .cloned()
            .collect();
        let inherited = self.is_inherited_tag(tags, &instance.type_name);
        let mut result = self.all_tagged(matching.clone(), inherited, honor_inherited)?;
        // A type carrying its own, different instance overrides what it inherits.
        result.retain(|name| matching.contains(name) || !annotated.contains(name));
        Ok(result)
    }

    fn all_tagged(
        &self,
        annotated: HashSet<String>,
        inherited: bool,
        honor_inherited: bool,
    ) -> Result<BTreeSet<String>> {
        let subtypes = self.index(ScannerKind::SubTypes)?;
        if !honor_inherited {
            let tags = self.index(ScannerKind::TypeTags)?;
            let tagged = tags.recursive_values_including_self(&annotated);
            return Ok(self.resolvable(subtypes.recursive_values_including_self(&tagged)));
        }
        if !inherited {
            return Ok(self.resolvable(annotated));
        }
        let classes: Vec<&String> = annotated
            .iter()
            .filter(|name| match self.resolve(name) {
                Some(ty) => !ty.is_interface(),
                None => self.resolver.is_none(),
            })
            .collect();
        let direct = subtypes.values_of_all(classes);
        let mut result = subtypes.recursive_values_including_self(&direct);
        result.extend(annotated);
        Ok(self.resolvable(result))
    }

    fn is_inherited_tag(&self, tags: &Index, tag: &str) -> bool {
        tags.contains(INHERITED, tag)
            || self
                .resolve(tag)
                .is_some_and(|ty| ty.tag(INHERITED).is_some())
    }

    fn resolve(&self, name: &str) -> Option<Arc<crate::descriptor::TypeDescriptor>> {
        self.resolver.as_ref()?.resolve(name)
    }

    /// `instance` with unset members filled from its tag type's defaults.
    fn complete(&self, instance: &TagInstance) -> TagInstance {
        match self.resolve(&instance.type_name) {
            Some(tag_type) => instance.clone().with_defaults(tag_type.tag_defaults()),
            None => instance.clone(),
        }
    }

    /// Signatures of methods and constructors, and keys of fields, that
    /// carry `tag`.
    pub fn members_tagged_with(&self, tag: &str) -> Result<BTreeSet<String>> {
        let members = self.index(ScannerKind::MemberTags)?;
        Ok(members.values_of(tag).into_iter().collect())
    }

    pub fn methods_tagged_with(&self, tag: &str) -> Result<BTreeSet<String>> {
        Ok(self
            .members_tagged_with(tag)?
            .into_iter()
            .filter(|member| member.contains('(') && !is_constructor(member))
            .collect())
    }

    pub fn constructors_tagged_with(&self, tag: &str) -> Result<BTreeSet<String>> {
        Ok(self
            .members_tagged_with(tag)?
            .into_iter()
            .filter(|member| is_constructor(member))
            .collect())
    }

    pub fn fields_tagged_with(&self, tag: &str) -> Result<BTreeSet<String>> {
        Ok(self
            .members_tagged_with(tag)?
            .into_iter()
            .filter(|member| !member.contains('('))
            .collect())
    }

    /// Members whose applied tag equals `instance`. Members whose owner can
    /// no longer be resolved are dropped.
    pub fn members_tagged_with_instance(&self, instance: &TagInstance) -> Result<BTreeSet<String>> {
        let expected = self.complete(instance);
        Ok(self
            .members_tagged_with(&instance.type_name)?
            .into_iter()
            .filter(|member| {
                self.member_tag(member, &instance.type_name)
                    .is_some_and(|applied| self.complete(&applied) == expected)
            })
            .collect())
    }

    fn member_tag(&self, member: &str, tag: &str) -> Option<TagInstance> {
        let (owner, _) = split_member_key(member)?;
        let ty = self.resolve(owner)?;
        let tags = match ty.method_by_signature(member) {
            Some(method) => &method.tags,
            None => &ty.fields.iter().find(|field| field.key == member)?.tags,
        };
        tags.iter().find(|applied| applied.type_name == tag).cloned()
    }

    /// Methods and constructors declaring exactly `parameter_types`, in order.
    pub fn methods_with_parameter_types(&self, parameter_types: &[&str]) -> Result<BTreeSet<String>> {
        let index = self.index(ScannerKind::ParameterTypes)?;
        Ok(index.values_of(&parameter_types.join(",")).into_iter().collect())
    }

    /// Methods and constructors with any parameter carrying `tag`.
    pub fn methods_with_parameter_tagged(&self, tag: &str) -> Result<BTreeSet<String>> {
        let index = self.index(ScannerKind::ParameterTags)?;
        Ok(index.values_of(tag).into_iter().collect())
    }

    pub fn methods_with_return_type(&self, return_type: &str) -> Result<BTreeSet<String>> {
        let index = self.index(ScannerKind::ReturnTypes)?;
        Ok(index.values_of(return_type).into_iter().collect())
    }

    /// Callers of `member` as `"<caller signature> #<line>"`.
    pub fn usages_of(&self, member: &str) -> Result<BTreeSet<String>> {
        let index = self.index(ScannerKind::MemberUsage)?;
        Ok(index.values_of(member).into_iter().collect())
    }

    /// Declared parameter names of `signature`; empty when they were not
    /// compiled in.
    pub fn param_names_of(&self, signature: &str) -> Result<Vec<String>> {
        let index = self.index(ScannerKind::ParameterNames)?;
        Ok(index
            .values_of(signature)
            .into_iter()
            .next()
            .map(|names| {
                names
                    .split(',')
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Relative paths of every resource whose simple name satisfies `predicate`.
    pub fn resources_matching(&self, predicate: impl Fn(&str) -> bool) -> Result<BTreeSet<String>> {
        let index = self.index(ScannerKind::Resources)?;
        let keys: Vec<String> = index
            .keys()
            .into_iter()
            .filter(|name| predicate(name))
            .collect();
        Ok(index.values_of_all(&keys).into_iter().collect())
    }

    /// Field names, `name(params)` members and `@Tag` entries of `type_name`.
    pub fn members_of(&self, type_name: &str) -> Result<BTreeSet<String>> {
        let index = self.index(ScannerKind::TypeElements)?;
        Ok(index
            .values_of(type_name)
            .into_iter()
            .filter(|member| !member.is_empty())
            .collect())
    }

    /// Adds hierarchy edges for supertypes that were referenced but never
    /// scanned, so their resolvable ancestors reach scanned descendants.
    /// Returns the number of edges added.
    pub fn expand_super_types(&self) -> Result<usize> {
        let subtypes = self.index(ScannerKind::SubTypes)?;
        let Some(resolver) = &self.resolver else {
            debug!("no resolver; supertype expansion skipped");
            return Ok(0);
        };
        Ok(expand_super_types(subtypes, resolver.as_ref()))
    }
}

fn is_constructor(member: &str) -> bool {
    member.contains(".<init>(")
}

/// Walks the real ancestry of every key that is never a value.
pub(crate) fn expand_super_types(subtypes: &Index, resolver: &dyn TypeResolver) -> usize {
    let values = subtypes.all_values();
    let mut pending: Vec<String> = subtypes
        .keys()
        .into_iter()
        .filter(|key| !values.contains(key))
        .collect();
    pending.sort();
    let mut visited = HashSet::new();
    let mut added = 0;
    while let Some(name) = pending.pop() {
        if !visited.insert(name.clone()) {
            continue;
        }
        let Some(ty) = resolver.resolve(&name) else {
            continue;
        };
        for supertype in ty.supertypes().filter(|supertype| *supertype != OBJECT) {
            if subtypes.put(supertype, name.as_str()) {
                added += 1;
                pending.push(supertype.to_string());
            }
        }
    }
    debug!(added, "supertype expansion finished");
    added
}
