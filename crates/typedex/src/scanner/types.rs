use std::sync::Arc;

use super::{ScanContext, ScanInput, Scanner, ScannerKind, ScannerState};
use crate::descriptor::{INHERITED, OBJECT};
use crate::error::Result;
use crate::filter::{Filter, Pattern};
use crate::store::Index;

/// Supertype or interface name -> type name.
#[derive(Debug)]
pub struct SubTypesScanner {
    state: ScannerState,
}

impl Default for SubTypesScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl SubTypesScanner {
    /// Excludes edges from the universal root type.
    pub fn new() -> Self {
        let exclude_object = match Pattern::new(&regex::escape(OBJECT)) {
            Ok(pattern) => Filter::Composite(vec![Filter::Exclude(pattern)]),
            Err(_) => Filter::accept_all(),
        };
        Self {
            state: ScannerState::with_filter(exclude_object),
        }
    }

    /// Also records direct subtypes of the universal root, which makes
    /// every scanned type reachable from it.
    pub fn with_object() -> Self {
        Self {
            state: ScannerState::with_filter(Filter::accept_all()),
        }
    }

    pub fn with_result_filter(result_filter: Filter) -> Self {
        Self {
            state: ScannerState::with_filter(result_filter),
        }
    }
}

impl Scanner for SubTypesScanner {
    fn name(&self) -> &str {
        ScannerKind::SubTypes.name()
    }

    fn index(&self) -> &Arc<Index> {
        &self.state.index
    }

    fn result_filter(&self) -> &Filter {
        &self.state.result_filter
    }

    fn scan(&self, input: &ScanInput<'_>, _context: &ScanContext) -> Result<()> {
        let Some(ty) = input.descriptor else {
            return Ok(());
        };
        for supertype in ty.supertypes() {
            self.record(supertype, &ty.name);
        }
        Ok(())
    }
}

/// Tag name -> tagged type name.
///
/// The inheritance meta-tag is recorded regardless of the result filter;
/// inherited-tag queries depend on it.
#[derive(Debug, Default)]
pub struct TypeTagsScanner {
    state: ScannerState,
}

impl TypeTagsScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_result_filter(result_filter: Filter) -> Self {
        Self {
            state: ScannerState::with_filter(result_filter),
        }
    }
}

impl Scanner for TypeTagsScanner {
    fn name(&self) -> &str {
        ScannerKind::TypeTags.name()
    }

    fn index(&self) -> &Arc<Index> {
        &self.state.index
    }

    fn result_filter(&self) -> &Filter {
        &self.state.result_filter
    }

    fn accepts_result(&self, key: &str) -> bool {
        key == INHERITED || self.result_filter().accepts(key)
    }

    fn scan(&self, input: &ScanInput<'_>, _context: &ScanContext) -> Result<()> {
        let Some(ty) = input.descriptor else {
            return Ok(());
        };
        for tag in ty.tag_names() {
            self.record(tag, &ty.name);
        }
        Ok(())
    }
}

/// Type name -> its members: field names, `name(params)` for methods and
/// `@Tag` for applied tags. An empty value marks the type itself.
#[derive(Debug)]
pub struct TypeElementsScanner {
    state: ScannerState,
    include_fields: bool,
    include_methods: bool,
    include_tags: bool,
}

impl Default for TypeElementsScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeElementsScanner {
    pub fn new() -> Self {
        Self {
            state: ScannerState::default(),
            include_fields: true,
            include_methods: true,
            include_tags: true,
        }
    }

    pub fn without_fields(mut self) -> Self {
        self.include_fields = false;
        self
    }

    pub fn without_methods(mut self) -> Self {
        self.include_methods = false;
        self
    }

    pub fn without_tags(mut self) -> Self {
        self.include_tags = false;
        self
    }

    pub fn with_result_filter(mut self, result_filter: Filter) -> Self {
        self.state.result_filter = result_filter;
        self
    }
}

impl Scanner for TypeElementsScanner {
    fn name(&self) -> &str {
        ScannerKind::TypeElements.name()
    }

    fn index(&self) -> &Arc<Index> {
        &self.state.index
    }

    fn result_filter(&self) -> &Filter {
        &self.state.result_filter
    }

    fn fingerprint(&self) -> String {
        format!(
            "{}[{}]fields={},methods={},tags={}",
            self.name(),
            self.result_filter(),
            self.include_fields,
            self.include_methods,
            self.include_tags
        )
    }

    fn scan(&self, input: &ScanInput<'_>, _context: &ScanContext) -> Result<()> {
        let Some(ty) = input.descriptor else {
            return Ok(());
        };
        if !self.accepts_result(&ty.name) {
            return Ok(());
        }
        self.add_entry(&ty.name, "");
        if self.include_fields {
            for field in &ty.fields {
                self.add_entry(&ty.name, &field.name);
            }
        }
        if self.include_methods {
            for method in &ty.methods {
                let member = format!("{}({})", method.name, method.parameter_types.join(","));
                self.add_entry(&ty.name, &member);
            }
        }
        if self.include_tags {
            for tag in ty.tag_names() {
                self.add_entry(&ty.name, &format!("@{tag}"));
            }
        }
        Ok(())
    }
}
