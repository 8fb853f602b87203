use std::sync::Arc;

use typedex_vfs::Entry;

use super::{ScanContext, ScanInput, Scanner, ScannerKind, ScannerState};
use crate::error::Result;
use crate::filter::Filter;
use crate::store::Index;

/// Simple file name -> relative path, for every entry that is not a
/// compiled type.
#[derive(Debug, Default)]
pub struct ResourcesScanner {
    state: ScannerState,
}

impl ResourcesScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_result_filter(result_filter: Filter) -> Self {
        Self {
            state: ScannerState::with_filter(result_filter),
        }
    }
}

impl Scanner for ResourcesScanner {
    fn name(&self) -> &str {
        ScannerKind::Resources.name()
    }

    fn index(&self) -> &Arc<Index> {
        &self.state.index
    }

    fn result_filter(&self) -> &Filter {
        &self.state.result_filter
    }

    fn accepts(&self, entry: &Entry) -> bool {
        !entry.name().ends_with(".class")
    }

    fn needs_descriptor(&self) -> bool {
        false
    }

    fn scan(&self, input: &ScanInput<'_>, _context: &ScanContext) -> Result<()> {
        self.record(input.entry.name(), input.entry.relative_path());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::ClassPool;

    #[test]
    fn records_simple_name_to_path() {
        let scanner = ResourcesScanner::new();
        let context = ScanContext {
            filter: Filter::accept_all(),
            resolver: Arc::new(ClassPool::empty()),
        };
        let entry = Entry::from_bytes("app/config.properties", b"k=v".to_vec());
        scanner
            .scan(
                &ScanInput {
                    entry: &entry,
                    descriptor: None,
                },
                &context,
            )
            .unwrap();
        assert_eq!(
            scanner.values_of("config.properties"),
            ["app/config.properties".to_string()].into_iter().collect()
        );
    }
}
