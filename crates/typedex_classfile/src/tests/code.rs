use crate::fixtures::{ClassBuilder, CodeSpec, Insn, MethodSpec};
use crate::{ReferenceKind, code_references, parse_class};

fn single_method(code: CodeSpec) -> crate::ClassFile {
    let bytes = ClassBuilder::new("app.Foo")
        .method(MethodSpec::new("bar", "(Ljava/lang/String;)V").code(code))
        .build();
    parse_class(&bytes).unwrap()
}

#[test]
fn pairs_new_with_its_constructor() {
    let class = single_method(
        CodeSpec::new(2, 2)
            .line(42)
            .op(Insn::new_object("app.Baz"))
            .op(Insn::Dup)
            .op(Insn::invoke_special("app.Baz", "<init>", "()V"))
            .op(Insn::Pop)
            .line(43)
            .op(Insn::Return),
    );
    let method = &class.methods[0];
    let refs = code_references(method.code.as_ref().unwrap(), &class.constant_pool).unwrap();

    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].kind, ReferenceKind::NewObject);
    assert_eq!(refs[0].owner, "app/Baz");
    assert_eq!(refs[0].name, "<init>");
    assert_eq!(refs[0].descriptor, "()V");
    assert_eq!(refs[0].pc, 0);
    assert_eq!(refs[0].line, Some(42));
}

#[test]
fn nested_construction_pairs_innermost_first() {
    let class = single_method(
        CodeSpec::new(4, 2)
            .line(5)
            .op(Insn::new_object("app.Outer"))
            .op(Insn::Dup)
            .line(6)
            .op(Insn::new_object("app.Inner"))
            .op(Insn::Dup)
            .op(Insn::invoke_special("app.Inner", "<init>", "()V"))
            .line(7)
            .op(Insn::invoke_special("app.Outer", "<init>", "(Lapp/Inner;)V"))
            .op(Insn::Return),
    );
    let refs = code_references(class.methods[0].code.as_ref().unwrap(), &class.constant_pool)
        .unwrap();
    let summary: Vec<_> = refs
        .iter()
        .map(|r| (r.kind, r.owner.as_str(), r.line))
        .collect();
    assert_eq!(
        summary,
        vec![
            (ReferenceKind::NewObject, "app/Outer", Some(5)),
            (ReferenceKind::NewObject, "app/Inner", Some(6)),
        ]
    );
}

#[test]
fn classifies_calls_and_field_access() {
    let class = single_method(
        CodeSpec::new(3, 2)
            .line(1)
            .op(Insn::ALoad(0))
            .op(Insn::invoke_special("java.lang.Object", "<init>", "()V"))
            .line(2)
            .op(Insn::ALoad(0))
            .op(Insn::get_field("app.Foo", "count", "I"))
            .op(Insn::Pop)
            .line(3)
            .op(Insn::get_static("app.Config", "NAME", "Ljava/lang/String;"))
            .op(Insn::invoke_interface("app.Sink", "accept", "(Ljava/lang/Object;)V"))
            .line(4)
            .op(Insn::invoke_static("app.Util", "helper", "()V"))
            .op(Insn::Return),
    );
    let refs = code_references(class.methods[0].code.as_ref().unwrap(), &class.constant_pool)
        .unwrap();
    let kinds: Vec<_> = refs.iter().map(|r| r.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ReferenceKind::ConstructorCall,
            ReferenceKind::FieldAccess {
                write: false,
                is_static: false
            },
            ReferenceKind::FieldAccess {
                write: false,
                is_static: true
            },
            ReferenceKind::MethodCall,
            ReferenceKind::MethodCall,
        ]
    );
    assert!(refs[3].interface);
    assert_eq!(refs[4].line, Some(4));
}
