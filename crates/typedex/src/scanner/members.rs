use std::sync::Arc;

use super::{ScanContext, ScanInput, Scanner, ScannerKind, ScannerState};
use crate::error::Result;
use crate::filter::Filter;
use crate::store::Index;

macro_rules! member_scanner {
    ($(#[$doc:meta])* $name:ident, $kind:expr) => {
        $(#[$doc])*
        #[derive(Debug, Default)]
        pub struct $name {
            state: ScannerState,
        }

        impl $name {
            pub fn new() -> Self {
                Self::default()
            }

            pub fn with_result_filter(result_filter: Filter) -> Self {
                Self {
                    state: ScannerState::with_filter(result_filter),
                }
            }
        }

        impl $name {
            fn kind(&self) -> ScannerKind {
                $kind
            }
        }
    };
}

macro_rules! scanner_accessors {
    () => {
        fn name(&self) -> &str {
            self.kind().name()
        }

        fn index(&self) -> &Arc<Index> {
            &self.state.index
        }

        fn result_filter(&self) -> &Filter {
            &self.state.result_filter
        }
    };
}

member_scanner!(
    /// Tag name -> signature of each tagged method or constructor, or
    /// `Owner.field` key of each tagged field.
    MemberTagsScanner,
    ScannerKind::MemberTags
);

member_scanner!(
    /// Comma-joined parameter type list -> method signature.
    ParameterTypesScanner,
    ScannerKind::ParameterTypes
);

member_scanner!(
    /// Tag name -> signature of each method with a parameter carrying it.
    ParameterTagsScanner,
    ScannerKind::ParameterTags
);

member_scanner!(
    /// Return type name -> method signature. Constructors return `void`.
    ReturnTypesScanner,
    ScannerKind::ReturnTypes
);

member_scanner!(
    /// Method signature -> comma-joined parameter names. Methods compiled
    /// without parameter names or local variable tables are skipped.
    ParameterNamesScanner,
    ScannerKind::ParameterNames
);

impl Scanner for MemberTagsScanner {
    scanner_accessors!();

    fn scan(&self, input: &ScanInput<'_>, _context: &ScanContext) -> Result<()> {
        let Some(ty) = input.descriptor else {
            return Ok(());
        };
        for method in &ty.methods {
            for tag in &method.tags {
                self.record(&tag.type_name, &method.signature);
            }
        }
        for field in &ty.fields {
            for tag in &field.tags {
                self.record(&tag.type_name, &field.key);
            }
        }
        Ok(())
    }
}

impl Scanner for ParameterTypesScanner {
    scanner_accessors!();

    fn scan(&self, input: &ScanInput<'_>, _context: &ScanContext) -> Result<()> {
        let Some(ty) = input.descriptor else {
            return Ok(());
        };
        for method in &ty.methods {
            self.record(&method.parameter_types.join(","), &method.signature);
        }
        Ok(())
    }
}

impl Scanner for ParameterTagsScanner {
    scanner_accessors!();

    fn scan(&self, input: &ScanInput<'_>, _context: &ScanContext) -> Result<()> {
        let Some(ty) = input.descriptor else {
            return Ok(());
        };
        for method in &ty.methods {
            for tag in method.parameter_tags.iter().flatten() {
                self.record(&tag.type_name, &method.signature);
            }
        }
        Ok(())
    }
}

impl Scanner for ReturnTypesScanner {
    scanner_accessors!();

    fn scan(&self, input: &ScanInput<'_>, _context: &ScanContext) -> Result<()> {
        let Some(ty) = input.descriptor else {
            return Ok(());
        };
        for method in &ty.methods {
            self.record(&method.return_type, &method.signature);
        }
        Ok(())
    }
}

impl Scanner for ParameterNamesScanner {
    scanner_accessors!();

    fn scan(&self, input: &ScanInput<'_>, _context: &ScanContext) -> Result<()> {
        let Some(ty) = input.descriptor else {
            return Ok(());
        };
        for method in &ty.methods {
            match &method.parameter_names {
                Some(names) if !names.is_empty() => {
                    self.record(&method.signature, &names.join(","));
                }
                _ => {}
            }
        }
        Ok(())
    }
}
