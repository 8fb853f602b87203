use typedex_classfile::fixtures::{AnnotationSpec, ClassBuilder, FixtureValue, MethodSpec};

use super::{index, pool_of, set, store};
use crate::descriptor::INHERITED;
use crate::query::Typedex;
use crate::tag::{TagInstance, TagValue};

fn hierarchy() -> Vec<ClassBuilder> {
    vec![
        ClassBuilder::annotation_type("app.Marker").annotate(AnnotationSpec::new(INHERITED)),
        ClassBuilder::annotation_type("app.Plain"),
        ClassBuilder::new("app.Parent")
            .annotate(AnnotationSpec::new("app.Marker"))
            .annotate(AnnotationSpec::new("app.Plain")),
        ClassBuilder::new("app.Child").extends("app.Parent"),
        ClassBuilder::new("app.GrandChild").extends("app.Child"),
        ClassBuilder::interface("app.Tagged").annotate(AnnotationSpec::new("app.Marker")),
        ClassBuilder::new("app.Impl").implements("app.Tagged"),
    ]
}

fn typedex() -> Typedex {
    Typedex::new(store(vec![
        (
            "TypeTags",
            index(&[
                (INHERITED, "app.Marker"),
                ("app.Marker", "app.Parent"),
                ("app.Plain", "app.Parent"),
                ("app.Marker", "app.Tagged"),
            ]),
        ),
        (
            "SubTypes",
            index(&[
                ("app.Parent", "app.Child"),
                ("app.Child", "app.GrandChild"),
                ("app.Tagged", "app.Impl"),
                ("java.lang.annotation.Annotation", "app.Marker"),
                ("java.lang.annotation.Annotation", "app.Plain"),
            ]),
        ),
    ]))
    .with_resolver(pool_of(&hierarchy()))
}

#[test]
fn inherited_tag_reaches_subclasses_either_way() {
    let typedex = typedex();
    let expected = set(&["app.Child", "app.GrandChild", "app.Parent"]);
    let honored = typedex.types_tagged_with("app.Marker", true).unwrap();
    let ignored = typedex.types_tagged_with("app.Marker", false).unwrap();
    assert!(expected.is_subset(&honored));
    assert!(expected.is_subset(&ignored));
}

#[test]
fn honoring_inheritance_skips_interface_implementors() {
    let typedex = typedex();
    assert_eq!(
        typedex.types_tagged_with("app.Marker", true).unwrap(),
        set(&["app.Child", "app.GrandChild", "app.Parent", "app.Tagged"])
    );
    assert_eq!(
        typedex.types_tagged_with("app.Marker", false).unwrap(),
        set(&[
            "app.Child",
            "app.GrandChild",
            "app.Impl",
            "app.Parent",
            "app.Tagged"
        ])
    );
}

#[test]
fn non_inheritable_tags_stay_put_when_honored() {
    let typedex = typedex();
    assert_eq!(
        typedex.types_tagged_with("app.Plain", true).unwrap(),
        set(&["app.Parent"])
    );
    assert_eq!(
        typedex.types_tagged_with("app.Plain", false).unwrap(),
        set(&["app.Child", "app.GrandChild", "app.Parent"])
    );
}

#[test]
fn meta_tags_propagate_without_inheritance() {
    let typedex = Typedex::new(store(vec![
        (
            "TypeTags",
            index(&[
                ("app.Stereotype", "app.Service"),
                ("app.Service", "app.Billing"),
            ]),
        ),
        ("SubTypes", index(&[("app.Billing", "app.BillingImpl")])),
    ]));
    assert_eq!(
        typedex.types_tagged_with("app.Stereotype", false).unwrap(),
        set(&["app.Billing", "app.BillingImpl", "app.Service"])
    );
    assert_eq!(
        typedex.types_tagged_with("app.Stereotype", true).unwrap(),
        set(&["app.Service"])
    );
}

#[test]
fn tag_instances_match_on_member_values() {
    let builders = vec![
        ClassBuilder::annotation_type("app.Named").method(
            MethodSpec::new("order", "()I")
                .access(typedex_classfile::ACC_PUBLIC | typedex_classfile::ACC_ABSTRACT)
                .default_value(FixtureValue::Int(0)),
        ),
        ClassBuilder::new("app.First").annotate(
            AnnotationSpec::new("app.Named").value("value", FixtureValue::Str("first".into())),
        ),
        ClassBuilder::new("app.Second").annotate(
            AnnotationSpec::new("app.Named")
                .value("value", FixtureValue::Str("second".into()))
                .value("order", FixtureValue::Int(2)),
        ),
        ClassBuilder::new("app.FirstChild").extends("app.First"),
    ];
    let typedex = Typedex::new(store(vec![
        (
            "TypeTags",
            index(&[("app.Named", "app.First"), ("app.Named", "app.Second")]),
        ),
        ("SubTypes", index(&[("app.First", "app.FirstChild")])),
    ]))
    .with_resolver(pool_of(&builders));

    let first = TagInstance::new("app.Named").with("value", TagValue::String("first".into()));
    assert_eq!(
        typedex.types_tagged_with_instance(&first, false).unwrap(),
        set(&["app.First", "app.FirstChild"])
    );
    // The declared default fills in the unset member on both sides.
    let explicit_default = first.clone().with("order", TagValue::Int(0));
    assert_eq!(
        typedex.types_tagged_with_instance(&explicit_default, true).unwrap(),
        set(&["app.First"])
    );
    let second = TagInstance::new("app.Named")
        .with("value", TagValue::String("second".into()))
        .with("order", TagValue::Int(2));
    assert_eq!(
        typedex.types_tagged_with_instance(&second, false).unwrap(),
        set(&["app.Second"])
    );
    let nobody = TagInstance::new("app.Named").with("value", TagValue::String("none".into()));
    assert!(typedex.types_tagged_with_instance(&nobody, false).unwrap().is_empty());
}

#[test]
fn subtypes_with_their_own_instance_are_left_out() {
    let builders = vec![
        ClassBuilder::annotation_type("app.Named").annotate(AnnotationSpec::new(INHERITED)),
        ClassBuilder::new("app.First").annotate(
            AnnotationSpec::new("app.Named").value("value", FixtureValue::Str("first".into())),
        ),
        ClassBuilder::new("app.FirstChild").extends("app.First"),
        ClassBuilder::new("app.Other").extends("app.First").annotate(
            AnnotationSpec::new("app.Named").value("value", FixtureValue::Str("other".into())),
        ),
        ClassBuilder::new("app.OtherChild").extends("app.Other"),
    ];
    let typedex = Typedex::new(store(vec![
        (
            "TypeTags",
            index(&[
                (INHERITED, "app.Named"),
                ("app.Named", "app.First"),
                ("app.Named", "app.Other"),
            ]),
        ),
        (
            "SubTypes",
            index(&[
                ("app.First", "app.FirstChild"),
                ("app.First", "app.Other"),
                ("app.Other", "app.OtherChild"),
            ]),
        ),
    ]))
    .with_resolver(pool_of(&builders));

    let first = TagInstance::new("app.Named").with("value", TagValue::String("first".into()));
    for honor_inherited in [true, false] {
        // OtherChild stays: it carries no tag of its own.
        assert_eq!(
            typedex
                .types_tagged_with_instance(&first, honor_inherited)
                .unwrap(),
            set(&["app.First", "app.FirstChild", "app.OtherChild"]),
            "honor_inherited={honor_inherited}"
        );
    }
    let other = TagInstance::new("app.Named").with("value", TagValue::String("other".into()));
    assert_eq!(
        typedex.types_tagged_with_instance(&other, true).unwrap(),
        set(&["app.Other", "app.OtherChild"])
    );
}
