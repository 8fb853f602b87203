use std::sync::Arc;

use typedex_classfile::fixtures::{AnnotationSpec, ClassBuilder, FieldSpec, FixtureValue, MethodSpec};
use typedex_vfs::Entry;

use super::{describe, pool_of, set};
use crate::filter::Filter;
use crate::query::Typedex;
use crate::scanner::{
    MemberTagsScanner, ParameterNamesScanner, ParameterTagsScanner, ParameterTypesScanner,
    ReturnTypesScanner, ScanContext, ScanInput, Scanner, TypeElementsScanner,
};
use crate::store::Store;
use crate::tag::{TagInstance, TagValue};

fn service() -> ClassBuilder {
    ClassBuilder::new("app.Service")
        .annotate(AnnotationSpec::new("app.Component"))
        .field(FieldSpec::new("repository", "Lapp/Repository;").annotate(AnnotationSpec::new("app.Inject")))
        .method(
            MethodSpec::new("<init>", "(Lapp/Repository;)V")
                .annotate(AnnotationSpec::new("app.Inject"))
                .parameter_names(&["repository"]),
        )
        .method(
            MethodSpec::new("find", "(Ljava/lang/String;I)Lapp/Item;")
                .annotate(AnnotationSpec::new("app.Inject").value("optional", FixtureValue::Bool(true)))
                .parameter_annotation(0, AnnotationSpec::new("app.NotNull"))
                .parameter_names(&["key", "limit"]),
        )
        .method(MethodSpec::new("clear", "()V"))
}

/// Runs every member scanner over `builders` and collects their indices.
fn scan(builders: &[ClassBuilder]) -> Store {
    let scanners: Vec<Arc<dyn Scanner>> = vec![
        Arc::new(MemberTagsScanner::new()),
        Arc::new(ParameterTypesScanner::new()),
        Arc::new(ParameterTagsScanner::new()),
        Arc::new(ReturnTypesScanner::new()),
        Arc::new(ParameterNamesScanner::new()),
        Arc::new(TypeElementsScanner::new()),
    ];
    let context = ScanContext {
        filter: Filter::accept_all(),
        resolver: pool_of(builders),
    };
    for builder in builders {
        let entry = Entry::from_bytes(builder.relative_path(), builder.build());
        let descriptor = describe(builder);
        let input = ScanInput {
            entry: &entry,
            descriptor: Some(&descriptor),
        };
        for scanner in &scanners {
            scanner.scan(&input, &context).unwrap();
        }
    }
    let mut store = Store::new();
    for scanner in &scanners {
        store.insert(scanner.name(), Arc::clone(scanner.index()));
    }
    store
}

fn typedex() -> Typedex {
    Typedex::new(scan(&[service()])).with_resolver(pool_of(&[service()]))
}

#[test]
fn member_tags_split_by_member_kind() {
    let typedex = typedex();
    assert_eq!(
        typedex.members_tagged_with("app.Inject").unwrap(),
        set(&[
            "app.Service.<init>(app.Repository)",
            "app.Service.find(java.lang.String,int)",
            "app.Service.repository",
        ])
    );
    assert_eq!(
        typedex.methods_tagged_with("app.Inject").unwrap(),
        set(&["app.Service.find(java.lang.String,int)"])
    );
    assert_eq!(
        typedex.constructors_tagged_with("app.Inject").unwrap(),
        set(&["app.Service.<init>(app.Repository)"])
    );
    assert_eq!(
        typedex.fields_tagged_with("app.Inject").unwrap(),
        set(&["app.Service.repository"])
    );
}

#[test]
fn member_tag_instances_compare_values() {
    let typedex = typedex();
    let optional = TagInstance::new("app.Inject").with("optional", TagValue::Boolean(true));
    assert_eq!(
        typedex.members_tagged_with_instance(&optional).unwrap(),
        set(&["app.Service.find(java.lang.String,int)"])
    );
    let bare = TagInstance::new("app.Inject");
    assert_eq!(
        typedex.members_tagged_with_instance(&bare).unwrap(),
        set(&["app.Service.<init>(app.Repository)", "app.Service.repository"])
    );
}

#[test]
fn parameter_and_return_type_indices() {
    let typedex = typedex();
    assert_eq!(
        typedex
            .methods_with_parameter_types(&["java.lang.String", "int"])
            .unwrap(),
        set(&["app.Service.find(java.lang.String,int)"])
    );
    assert_eq!(
        typedex.methods_with_parameter_types(&[]).unwrap(),
        set(&["app.Service.clear()"])
    );
    assert_eq!(
        typedex.methods_with_parameter_tagged("app.NotNull").unwrap(),
        set(&["app.Service.find(java.lang.String,int)"])
    );
    assert_eq!(
        typedex.methods_with_return_type("app.Item").unwrap(),
        set(&["app.Service.find(java.lang.String,int)"])
    );
    assert_eq!(
        typedex.methods_with_return_type("void").unwrap(),
        set(&["app.Service.<init>(app.Repository)", "app.Service.clear()"])
    );
}

#[test]
fn parameter_names_are_recorded_only_when_compiled_in() {
    let typedex = typedex();
    assert_eq!(
        typedex
            .param_names_of("app.Service.find(java.lang.String,int)")
            .unwrap(),
        vec!["key", "limit"]
    );
    assert_eq!(
        typedex
            .param_names_of("app.Service.<init>(app.Repository)")
            .unwrap(),
        vec!["repository"]
    );
    assert!(typedex.param_names_of("app.Service.clear()").unwrap().is_empty());
    assert!(
        !typedex
            .store()
            .index("ParameterNames")
            .unwrap()
            .contains_key("app.Service.clear()")
    );
}

#[test]
fn type_elements_list_members() {
    let typedex = typedex();
    assert_eq!(
        typedex.members_of("app.Service").unwrap(),
        set(&[
            "<init>(app.Repository)",
            "@app.Component",
            "clear()",
            "find(java.lang.String,int)",
            "repository",
        ])
    );
    assert!(
        typedex
            .store()
            .index("TypeElements")
            .unwrap()
            .contains("app.Service", "")
    );
}

#[test]
fn result_filters_limit_recorded_keys() {
    let scanner = MemberTagsScanner::with_result_filter(Filter::exclude("app\\.Inject").unwrap());
    let builder = service();
    let entry = Entry::from_bytes(builder.relative_path(), builder.build());
    let descriptor = describe(&builder);
    let context = ScanContext {
        filter: Filter::accept_all(),
        resolver: pool_of(&[]),
    };
    scanner
        .scan(
            &ScanInput {
                entry: &entry,
                descriptor: Some(&descriptor),
            },
            &context,
        )
        .unwrap();
    assert!(scanner.keys().is_empty());
}

#[test]
fn type_elements_can_leave_out_member_kinds() {
    let builder = service();
    let entry = Entry::from_bytes(builder.relative_path(), builder.build());
    let descriptor = describe(&builder);
    let context = ScanContext {
        filter: Filter::accept_all(),
        resolver: pool_of(&[]),
    };
    let input = ScanInput {
        entry: &entry,
        descriptor: Some(&descriptor),
    };
    let recorded = |scanner: TypeElementsScanner| {
        scanner.scan(&input, &context).unwrap();
        scanner.values_of("app.Service")
    };

    let no_fields = recorded(TypeElementsScanner::new().without_fields());
    assert!(!no_fields.contains("repository"));
    assert!(no_fields.contains("clear()"));
    assert!(no_fields.contains("@app.Component"));

    let no_methods = recorded(TypeElementsScanner::new().without_methods());
    assert!(no_methods.contains("repository"));
    assert!(!no_methods.contains("clear()"));
    assert!(!no_methods.contains("<init>(app.Repository)"));

    let type_only = recorded(
        TypeElementsScanner::new()
            .without_fields()
            .without_methods()
            .without_tags(),
    );
    assert_eq!(type_only, std::collections::HashSet::from([String::new()]));
}
