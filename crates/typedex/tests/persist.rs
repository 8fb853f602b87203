mod common;

use tempfile::tempdir;
use typedex::{
    Collector, Filter, Format, INHERITED, ScanConfig, ScannerKind, SourceLocator, Typedex,
    TypedexError,
};
use typedex_classfile::fixtures::{AnnotationSpec, ClassBuilder, MethodSpec};

use common::{init_tracing, jar_bytes, set, write_classes, write_file};

fn scanned(builders: &[ClassBuilder]) -> (tempfile::TempDir, Typedex) {
    let temp = tempdir().unwrap();
    write_classes(temp.path(), builders);
    write_file(temp.path(), "app/app.properties", b"name=app");
    let config = ScanConfig::for_locators([temp.path()]).with_scanners([
        ScannerKind::SubTypes,
        ScannerKind::TypeTags,
        ScannerKind::MemberTags,
        ScannerKind::Resources,
        ScannerKind::TypeElements,
    ]);
    let typedex = Typedex::scan(config).unwrap();
    (temp, typedex)
}

fn app_types() -> Vec<ClassBuilder> {
    vec![
        ClassBuilder::annotation_type("app.Marker").annotate(AnnotationSpec::new(INHERITED)),
        ClassBuilder::new("app.Parent")
            .annotate(AnnotationSpec::new("app.Marker"))
            .method(MethodSpec::new("run", "()V").annotate(AnnotationSpec::new("app.Marker"))),
        ClassBuilder::new("app.Child").extends("app.Parent"),
    ]
}

#[test]
fn saved_documents_load_back_in_both_formats() {
    init_tracing();
    let (_sources, typedex) = scanned(&app_types());
    let out = tempdir().unwrap();

    for format in [Format::Xml, Format::Json] {
        let path = out
            .path()
            .join("nested/dir")
            .join(format!("app-reflections.{}", format.extension()));
        let written = typedex.save(&path, format).unwrap();
        assert_eq!(written, path);

        let loaded = Typedex::load(&path).unwrap();
        assert_eq!(loaded.store(), typedex.store());
        assert_eq!(
            loaded.types_tagged_with("app.Marker", false).unwrap(),
            set(&["app.Child", "app.Parent"])
        );
        assert_eq!(
            loaded.methods_tagged_with("app.Marker").unwrap(),
            set(&["app.Parent.run()"])
        );
    }
}

#[test]
fn collector_merges_documents_from_directories_and_archives() {
    init_tracing();
    let (_app_sources, app) = scanned(&app_types());
    let (_lib_sources, lib) = scanned(&[
        ClassBuilder::new("lib.Base"),
        ClassBuilder::new("lib.Impl").extends("lib.Base"),
    ]);

    let out = tempdir().unwrap();
    let exploded = out.path().join("exploded");
    app.save(
        exploded.join("META-INF/reflections/app-reflections.xml"),
        Format::Xml,
    )
    .unwrap();
    write_file(&exploded, "META-INF/reflections/notes.txt", b"not an index");
    write_file(&exploded, "other/ignored-reflections.xml", b"<broken");

    let document = Format::Json.encode(lib.store()).unwrap();
    let jar = out.path().join("lib.jar");
    std::fs::write(
        &jar,
        jar_bytes(&[(
            "META-INF/reflections/lib-reflections.json".to_string(),
            document.into_bytes(),
        )]),
    )
    .unwrap();

    let collected = Collector::new()
        .collect(&[SourceLocator::from_path(&exploded), SourceLocator::from_path(&jar)])
        .unwrap();

    let mut expected = app.store().clone();
    expected.merge(lib.store());
    assert_eq!(collected.store(), &expected);
    assert_eq!(collected.subtypes_of("lib.Base").unwrap(), set(&["lib.Impl"]));
    assert_eq!(
        collected.subtypes_of("app.Parent").unwrap(),
        set(&["app.Child"])
    );
}

#[test]
fn collector_honors_custom_prefix_and_name_filter() {
    let (_sources, app) = scanned(&app_types());
    let out = tempdir().unwrap();
    app.save(out.path().join("indices/app.json"), Format::Json)
        .unwrap();
    app.save(out.path().join("indices/skip.xml"), Format::Xml)
        .unwrap();

    let collected = Collector::new()
        .with_prefix("indices/")
        .with_name_filter(Filter::include(r".*\.json").unwrap())
        .collect(&[SourceLocator::from_path(out.path())])
        .unwrap();
    assert_eq!(collected.store(), app.store());
}

#[test]
fn one_malformed_document_fails_the_collection() {
    let (_sources, app) = scanned(&app_types());
    let out = tempdir().unwrap();
    app.save(
        out.path().join("META-INF/reflections/app-reflections.xml"),
        Format::Xml,
    )
    .unwrap();
    write_file(
        out.path(),
        "META-INF/reflections/broken-reflections.json",
        b"{\"SubTypes\": [",
    );

    let err = Collector::new()
        .collect(&[SourceLocator::from_path(out.path())])
        .unwrap_err();
    match err {
        TypedexError::Decode { origin, .. } => {
            assert_eq!(origin, "META-INF/reflections/broken-reflections.json");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn nothing_to_collect_is_an_empty_index() {
    let out = tempdir().unwrap();
    let collected = Collector::new()
        .collect(&[SourceLocator::from_path(out.path())])
        .unwrap();
    assert!(collected.store().is_empty());
}
