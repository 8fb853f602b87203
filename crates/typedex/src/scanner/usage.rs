use std::sync::Arc;

use tracing::trace;
use typedex_classfile::{
    ClassFile, CodeReference, MethodInfo, ReferenceKind, binary_name, code_references,
    parse_class, parse_method_descriptor,
};

use super::{ScanContext, ScanInput, Scanner, ScannerKind, ScannerState};
use crate::descriptor::{field_key, method_signature};
use crate::error::{ExtractionError, Result, TypedexError};
use crate::filter::Filter;
use crate::pool::TypeResolver;
use crate::store::Index;

/// Referenced member -> `"<referencing method signature> #<line>"`.
///
/// Walks the bytecode of every method body and records object
/// constructions, constructor chain calls, method invocations and field
/// accesses. Invocations and field accesses are attributed to the type that
/// declares the member, resolved through the session's class pool; when the
/// declaring type cannot be found the symbolic owner is used. A body that
/// cannot be decoded fails the whole scan.
#[derive(Debug, Default)]
pub struct MemberUsageScanner {
    state: ScannerState,
}

impl MemberUsageScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_result_filter(result_filter: Filter) -> Self {
        Self {
            state: ScannerState::with_filter(result_filter),
        }
    }

    fn scan_method(
        &self,
        class: &ClassFile,
        owner: &str,
        method: &MethodInfo,
        context: &ScanContext,
    ) -> Result<()> {
        let Some(code) = &method.code else {
            return Ok(());
        };
        let caller = parse_method_descriptor(&method.descriptor)
            .map(|ty| method_signature(owner, &method.name, &ty.parameters))
            .map_err(|source| TypedexError::Instrumentation {
                member: format!("{owner}.{}{}", method.name, method.descriptor),
                source,
            })?;
        let references = code_references(code, &class.constant_pool).map_err(|source| {
            TypedexError::Instrumentation {
                member: caller.clone(),
                source,
            }
        })?;

        for reference in &references {
            let key = referenced_member(reference, context.resolver.as_ref()).map_err(
                |source| TypedexError::Instrumentation {
                    member: caller.clone(),
                    source,
                },
            )?;
            if !context.filter.accepts(&key) || !self.accepts_result(&key) {
                continue;
            }
            let line = reference.line.map(i32::from).unwrap_or(-1);
            self.add_entry(&key, &format!("{caller} #{line}"));
        }
        trace!(member = %caller, references = references.len(), "instrumented");
        Ok(())
    }
}

/// Signature or field key of the member a reference points at.
fn referenced_member(
    reference: &CodeReference,
    resolver: &dyn TypeResolver,
) -> std::result::Result<String, typedex_classfile::ClassParseError> {
    let owner = binary_name(&reference.owner);
    match reference.kind {
        ReferenceKind::NewObject | ReferenceKind::ConstructorCall => {
            let ty = parse_method_descriptor(&reference.descriptor)?;
            Ok(method_signature(&owner, "<init>", &ty.parameters))
        }
        ReferenceKind::MethodCall => {
            let ty = parse_method_descriptor(&reference.descriptor)?;
            let declaring = resolver
                .declaring_method_owner(&owner, &reference.name, &reference.descriptor)
                .unwrap_or(owner);
            Ok(method_signature(&declaring, &reference.name, &ty.parameters))
        }
        ReferenceKind::FieldAccess { .. } => {
            let declaring = resolver
                .declaring_field_owner(&owner, &reference.name)
                .unwrap_or(owner);
            Ok(field_key(&declaring, &reference.name))
        }
    }
}

impl Scanner for MemberUsageScanner {
    fn name(&self) -> &str {
        ScannerKind::MemberUsage.name()
    }

    fn index(&self) -> &Arc<Index> {
        &self.state.index
    }

    fn result_filter(&self) -> &Filter {
        &self.state.result_filter
    }

    /// Works from the method bodies, which descriptors do not carry.
    fn needs_descriptor(&self) -> bool {
        false
    }

    fn scan(&self, input: &ScanInput<'_>, context: &ScanContext) -> Result<()> {
        let path = input.entry.relative_path();
        let bytes = input
            .entry
            .read_bytes()
            .map_err(|source| ExtractionError::Read {
                path: path.to_string(),
                source,
            })?;
        let class = parse_class(&bytes).map_err(|source| ExtractionError::Malformed {
            path: path.to_string(),
            source,
        })?;
        let owner = class.name();
        for method in class.methods.iter().filter(|method| !method.is_initializer()) {
            self.scan_method(&class, &owner, method, context)?;
        }
        Ok(())
    }
}
