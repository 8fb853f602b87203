//! Minimal class-file writer for building test inputs.
//!
//! Names are accepted in source form (`a.b.C`) and converted to internal form
//! when written; descriptors are taken verbatim.

use std::collections::HashMap;

use crate::descriptor::internal_name;
use crate::model::{ACC_ABSTRACT, ACC_ANNOTATION, ACC_INTERFACE, ACC_PUBLIC};

const ACC_SUPER: u16 = 0x0020;
const JAVA_8: u16 = 52;

#[derive(Debug, Clone)]
pub enum FixtureValue {
    Int(i32),
    Long(i64),
    Bool(bool),
    Str(String),
    Enum(String, String),
    Class(String),
    Array(Vec<FixtureValue>),
}

#[derive(Debug, Clone)]
pub struct AnnotationSpec {
    type_name: String,
    visible: bool,
    values: Vec<(String, FixtureValue)>,
}

impl AnnotationSpec {
    pub fn new(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            visible: true,
            values: Vec::new(),
        }
    }

    pub fn invisible(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn value(mut self, name: &str, value: FixtureValue) -> Self {
        self.values.push((name.to_string(), value));
        self
    }
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    name: String,
    descriptor: String,
    access_flags: u16,
    annotations: Vec<AnnotationSpec>,
}

impl FieldSpec {
    pub fn new(name: &str, descriptor: &str) -> Self {
        Self {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            access_flags: ACC_PUBLIC,
            annotations: Vec::new(),
        }
    }

    pub fn access(mut self, flags: u16) -> Self {
        self.access_flags = flags;
        self
    }

    pub fn annotate(mut self, annotation: AnnotationSpec) -> Self {
        self.annotations.push(annotation);
        self
    }
}

#[derive(Debug, Clone)]
pub struct MemberSpec {
    owner: String,
    name: String,
    descriptor: String,
}

#[derive(Debug, Clone)]
pub enum Insn {
    New(String),
    Dup,
    Pop,
    AconstNull,
    ALoad(u8),
    Return,
    AReturn,
    InvokeSpecial(MemberSpec),
    InvokeVirtual(MemberSpec),
    InvokeStatic(MemberSpec),
    InvokeInterface(MemberSpec),
    GetField(MemberSpec),
    PutField(MemberSpec),
    GetStatic(MemberSpec),
    PutStatic(MemberSpec),
    LdcString(String),
    Raw(Vec<u8>),
}

fn member(owner: &str, name: &str, descriptor: &str) -> MemberSpec {
    MemberSpec {
        owner: owner.to_string(),
        name: name.to_string(),
        descriptor: descriptor.to_string(),
    }
}

impl Insn {
    pub fn new_object(class: &str) -> Self {
        Insn::New(class.to_string())
    }

    pub fn invoke_special(owner: &str, name: &str, descriptor: &str) -> Self {
        Insn::InvokeSpecial(member(owner, name, descriptor))
    }

    pub fn invoke_virtual(owner: &str, name: &str, descriptor: &str) -> Self {
        Insn::InvokeVirtual(member(owner, name, descriptor))
    }

    pub fn invoke_static(owner: &str, name: &str, descriptor: &str) -> Self {
        Insn::InvokeStatic(member(owner, name, descriptor))
    }

    pub fn invoke_interface(owner: &str, name: &str, descriptor: &str) -> Self {
        Insn::InvokeInterface(member(owner, name, descriptor))
    }

    pub fn get_field(owner: &str, name: &str, descriptor: &str) -> Self {
        Insn::GetField(member(owner, name, descriptor))
    }

    pub fn put_field(owner: &str, name: &str, descriptor: &str) -> Self {
        Insn::PutField(member(owner, name, descriptor))
    }

    pub fn get_static(owner: &str, name: &str, descriptor: &str) -> Self {
        Insn::GetStatic(member(owner, name, descriptor))
    }

    pub fn put_static(owner: &str, name: &str, descriptor: &str) -> Self {
        Insn::PutStatic(member(owner, name, descriptor))
    }
}

#[derive(Debug, Clone)]
pub struct CodeSpec {
    max_stack: u16,
    max_locals: u16,
    instructions: Vec<(Option<u16>, Insn)>,
    locals: Vec<(String, String, u16)>,
    pending_line: Option<u16>,
}

impl CodeSpec {
    pub fn new(max_stack: u16, max_locals: u16) -> Self {
        Self {
            max_stack,
            max_locals,
            instructions: Vec::new(),
            locals: Vec::new(),
            pending_line: None,
        }
    }

    /// Starts a line-table entry at the next instruction.
    pub fn line(mut self, line: u16) -> Self {
        self.pending_line = Some(line);
        self
    }

    pub fn op(mut self, insn: Insn) -> Self {
        let line = self.pending_line.take();
        self.instructions.push((line, insn));
        self
    }

    pub fn local(mut self, name: &str, descriptor: &str, slot: u16) -> Self {
        self.locals
            .push((name.to_string(), descriptor.to_string(), slot));
        self
    }
}

#[derive(Debug, Clone)]
pub struct MethodSpec {
    name: String,
    descriptor: String,
    access_flags: u16,
    annotations: Vec<AnnotationSpec>,
    parameter_annotations: Vec<Vec<AnnotationSpec>>,
    parameter_names: Option<Vec<String>>,
    default_value: Option<FixtureValue>,
    code: Option<CodeSpec>,
}

impl MethodSpec {
    pub fn new(name: &str, descriptor: &str) -> Self {
        Self {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            access_flags: ACC_PUBLIC,
            annotations: Vec::new(),
            parameter_annotations: Vec::new(),
            parameter_names: None,
            default_value: None,
            code: None,
        }
    }

    /// A public no-arg constructor calling `super_name.<init>()`.
    pub fn default_constructor(super_name: &str) -> Self {
        Self::new("<init>", "()V").code(
            CodeSpec::new(1, 1)
                .op(Insn::ALoad(0))
                .op(Insn::invoke_special(super_name, "<init>", "()V"))
                .op(Insn::Return)
                .local("this", "Ljava/lang/Object;", 0),
        )
    }

    pub fn access(mut self, flags: u16) -> Self {
        self.access_flags = flags;
        self
    }

    pub fn annotate(mut self, annotation: AnnotationSpec) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn parameter_annotation(mut self, index: usize, annotation: AnnotationSpec) -> Self {
        if self.parameter_annotations.len() <= index {
            self.parameter_annotations.resize_with(index + 1, Vec::new);
        }
        self.parameter_annotations[index].push(annotation);
        self
    }

    pub fn parameter_names(mut self, names: &[&str]) -> Self {
        self.parameter_names = Some(names.iter().map(|name| name.to_string()).collect());
        self
    }

    pub fn default_value(mut self, value: FixtureValue) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn code(mut self, code: CodeSpec) -> Self {
        self.code = Some(code);
        self
    }
}

#[derive(Debug, Clone)]
pub struct ClassBuilder {
    name: String,
    super_name: Option<String>,
    interfaces: Vec<String>,
    access_flags: u16,
    annotations: Vec<AnnotationSpec>,
    fields: Vec<FieldSpec>,
    methods: Vec<MethodSpec>,
}

impl ClassBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            super_name: Some("java.lang.Object".to_string()),
            interfaces: Vec::new(),
            access_flags: ACC_PUBLIC | ACC_SUPER,
            annotations: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn interface(name: &str) -> Self {
        Self::new(name).access(ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT)
    }

    pub fn annotation_type(name: &str) -> Self {
        Self::new(name)
            .access(ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT | ACC_ANNOTATION)
            .implements("java.lang.annotation.Annotation")
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Archive or directory path of the compiled record, e.g. `a/b/C.class`.
    pub fn relative_path(&self) -> String {
        format!("{}.class", internal_name(&self.name))
    }

    pub fn extends(mut self, name: &str) -> Self {
        self.super_name = Some(name.to_string());
        self
    }

    pub fn without_super(mut self) -> Self {
        self.super_name = None;
        self
    }

    pub fn implements(mut self, name: &str) -> Self {
        self.interfaces.push(name.to_string());
        self
    }

    pub fn access(mut self, flags: u16) -> Self {
        self.access_flags = flags;
        self
    }

    pub fn annotate(mut self, annotation: AnnotationSpec) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn method(mut self, method: MethodSpec) -> Self {
        self.methods.push(method);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut pool = PoolWriter::default();
        let mut body = Vec::new();

        put_u2(&mut body, self.access_flags);
        put_u2(&mut body, pool.class(&self.name));
        let super_index = match &self.super_name {
            Some(name) => pool.class(name),
            None => 0,
        };
        put_u2(&mut body, super_index);
        put_u2(&mut body, self.interfaces.len() as u16);
        for interface in &self.interfaces {
            put_u2(&mut body, pool.class(interface));
        }

        put_u2(&mut body, self.fields.len() as u16);
        for field in &self.fields {
            put_u2(&mut body, field.access_flags);
            put_u2(&mut body, pool.utf8(&field.name));
            put_u2(&mut body, pool.utf8(&field.descriptor));
            let attributes = annotation_attributes(&mut pool, &field.annotations);
            write_attributes(&mut body, attributes);
        }

        put_u2(&mut body, self.methods.len() as u16);
        for method in &self.methods {
            put_u2(&mut body, method.access_flags);
            put_u2(&mut body, pool.utf8(&method.name));
            put_u2(&mut body, pool.utf8(&method.descriptor));
            let attributes = method_attributes(&mut pool, method);
            write_attributes(&mut body, attributes);
        }

        let attributes = annotation_attributes(&mut pool, &self.annotations);
        write_attributes(&mut body, attributes);

        let mut out = Vec::with_capacity(body.len() + pool.bytes.len() + 10);
        out.extend_from_slice(&0xCAFEBABEu32.to_be_bytes());
        put_u2(&mut out, 0);
        put_u2(&mut out, JAVA_8);
        put_u2(&mut out, pool.next);
        out.extend_from_slice(&pool.bytes);
        out.extend_from_slice(&body);
        out
    }
}

fn method_attributes(pool: &mut PoolWriter, method: &MethodSpec) -> Vec<(u16, Vec<u8>)> {
    let mut attributes = annotation_attributes(pool, &method.annotations);

    if !method.parameter_annotations.is_empty() {
        let mut body = vec![method.parameter_annotations.len() as u8];
        for annotations in &method.parameter_annotations {
            put_u2(&mut body, annotations.len() as u16);
            for annotation in annotations {
                write_annotation(pool, &mut body, annotation);
            }
        }
        attributes.push((pool.utf8("RuntimeVisibleParameterAnnotations"), body));
    }

    if let Some(names) = &method.parameter_names {
        let mut body = vec![names.len() as u8];
        for name in names {
            put_u2(&mut body, pool.utf8(name));
            put_u2(&mut body, 0);
        }
        attributes.push((pool.utf8("MethodParameters"), body));
    }

    if let Some(value) = &method.default_value {
        let mut body = Vec::new();
        write_value(pool, &mut body, value);
        attributes.push((pool.utf8("AnnotationDefault"), body));
    }

    if let Some(code) = &method.code {
        attributes.push((pool.utf8("Code"), code_attribute(pool, code)));
    }

    attributes
}

fn code_attribute(pool: &mut PoolWriter, spec: &CodeSpec) -> Vec<u8> {
    let mut code = Vec::new();
    let mut lines = Vec::new();
    for (line, insn) in &spec.instructions {
        if let Some(line) = line {
            lines.push((code.len() as u16, *line));
        }
        encode_insn(pool, &mut code, insn);
    }

    let mut nested = Vec::new();
    if !lines.is_empty() {
        let mut body = Vec::new();
        put_u2(&mut body, lines.len() as u16);
        for (start_pc, line) in &lines {
            put_u2(&mut body, *start_pc);
            put_u2(&mut body, *line);
        }
        nested.push((pool.utf8("LineNumberTable"), body));
    }
    if !spec.locals.is_empty() {
        let mut body = Vec::new();
        put_u2(&mut body, spec.locals.len() as u16);
        for (name, descriptor, slot) in &spec.locals {
            put_u2(&mut body, 0);
            put_u2(&mut body, code.len() as u16);
            put_u2(&mut body, pool.utf8(name));
            put_u2(&mut body, pool.utf8(descriptor));
            put_u2(&mut body, *slot);
        }
        nested.push((pool.utf8("LocalVariableTable"), body));
    }

    let mut body = Vec::new();
    put_u2(&mut body, spec.max_stack);
    put_u2(&mut body, spec.max_locals);
    body.extend_from_slice(&(code.len() as u32).to_be_bytes());
    body.extend_from_slice(&code);
    put_u2(&mut body, 0);
    write_attributes(&mut body, nested);
    body
}

fn encode_insn(pool: &mut PoolWriter, code: &mut Vec<u8>, insn: &Insn) {
    match insn {
        Insn::New(class) => {
            code.push(0xbb);
            put_u2(code, pool.class(class));
        }
        Insn::Dup => code.push(0x59),
        Insn::Pop => code.push(0x57),
        Insn::AconstNull => code.push(0x01),
        Insn::ALoad(slot) => match slot {
            0..=3 => code.push(0x2a + slot),
            _ => code.extend_from_slice(&[0x19, *slot]),
        },
        Insn::Return => code.push(0xb1),
        Insn::AReturn => code.push(0xb0),
        Insn::InvokeSpecial(m) => member_insn(pool, code, 0xb7, m, false),
        Insn::InvokeVirtual(m) => member_insn(pool, code, 0xb6, m, false),
        Insn::InvokeStatic(m) => member_insn(pool, code, 0xb8, m, false),
        Insn::InvokeInterface(m) => {
            member_insn(pool, code, 0xb9, m, true);
            let args = crate::descriptor::parse_method_descriptor(&m.descriptor)
                .map(|ty| ty.parameter_slots().sum::<usize>())
                .unwrap_or(0);
            code.extend_from_slice(&[(args + 1) as u8, 0]);
        }
        Insn::GetStatic(m) => field_insn(pool, code, 0xb2, m),
        Insn::PutStatic(m) => field_insn(pool, code, 0xb3, m),
        Insn::GetField(m) => field_insn(pool, code, 0xb4, m),
        Insn::PutField(m) => field_insn(pool, code, 0xb5, m),
        Insn::LdcString(value) => {
            code.push(0x13);
            put_u2(code, pool.string(value));
        }
        Insn::Raw(bytes) => code.extend_from_slice(bytes),
    }
}

fn member_insn(pool: &mut PoolWriter, code: &mut Vec<u8>, opcode: u8, m: &MemberSpec, interface: bool) {
    code.push(opcode);
    let index = if interface {
        pool.member_ref(11, &m.owner, &m.name, &m.descriptor)
    } else {
        pool.member_ref(10, &m.owner, &m.name, &m.descriptor)
    };
    put_u2(code, index);
}

fn field_insn(pool: &mut PoolWriter, code: &mut Vec<u8>, opcode: u8, m: &MemberSpec) {
    code.push(opcode);
    put_u2(code, pool.member_ref(9, &m.owner, &m.name, &m.descriptor));
}

fn annotation_attributes(
    pool: &mut PoolWriter,
    annotations: &[AnnotationSpec],
) -> Vec<(u16, Vec<u8>)> {
    let mut attributes = Vec::new();
    for (visible, attribute) in [
        (true, "RuntimeVisibleAnnotations"),
        (false, "RuntimeInvisibleAnnotations"),
    ] {
        let selected: Vec<_> = annotations
            .iter()
            .filter(|annotation| annotation.visible == visible)
            .collect();
        if selected.is_empty() {
            continue;
        }
        let mut body = Vec::new();
        put_u2(&mut body, selected.len() as u16);
        for annotation in selected {
            write_annotation(pool, &mut body, annotation);
        }
        attributes.push((pool.utf8(attribute), body));
    }
    attributes
}

fn write_annotation(pool: &mut PoolWriter, out: &mut Vec<u8>, annotation: &AnnotationSpec) {
    put_u2(out, pool.utf8(&type_descriptor(&annotation.type_name)));
    put_u2(out, annotation.values.len() as u16);
    for (name, value) in &annotation.values {
        put_u2(out, pool.utf8(name));
        write_value(pool, out, value);
    }
}

fn write_value(pool: &mut PoolWriter, out: &mut Vec<u8>, value: &FixtureValue) {
    match value {
        FixtureValue::Int(value) => {
            out.push(b'I');
            put_u2(out, pool.integer(*value));
        }
        FixtureValue::Long(value) => {
            out.push(b'J');
            put_u2(out, pool.long(*value));
        }
        FixtureValue::Bool(value) => {
            out.push(b'Z');
            put_u2(out, pool.integer(*value as i32));
        }
        FixtureValue::Str(value) => {
            out.push(b's');
            put_u2(out, pool.utf8(value));
        }
        FixtureValue::Enum(type_name, constant) => {
            out.push(b'e');
            put_u2(out, pool.utf8(&type_descriptor(type_name)));
            put_u2(out, pool.utf8(constant));
        }
        FixtureValue::Class(name) => {
            out.push(b'c');
            put_u2(out, pool.utf8(&type_descriptor(name)));
        }
        FixtureValue::Array(values) => {
            out.push(b'[');
            put_u2(out, values.len() as u16);
            for value in values {
                write_value(pool, out, value);
            }
        }
    }
}

fn type_descriptor(name: &str) -> String {
    format!("L{};", internal_name(name))
}

fn write_attributes(out: &mut Vec<u8>, attributes: Vec<(u16, Vec<u8>)>) {
    put_u2(out, attributes.len() as u16);
    for (name_index, body) in attributes {
        put_u2(out, name_index);
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        out.extend_from_slice(&body);
    }
}

fn put_u2(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

#[derive(Debug, Hash, PartialEq, Eq)]
enum PoolKey {
    Utf8(String),
    Integer(i32),
    Long(i64),
    Class(String),
    String(String),
    NameAndType(String, String),
    Member(u8, String, String, String),
}

struct PoolWriter {
    bytes: Vec<u8>,
    next: u16,
    interned: HashMap<PoolKey, u16>,
}

impl Default for PoolWriter {
    fn default() -> Self {
        Self {
            bytes: Vec::new(),
            next: 1,
            interned: HashMap::new(),
        }
    }
}

impl PoolWriter {
    fn intern(&mut self, key: PoolKey, slots: u16, encode: impl FnOnce(&mut Self) -> Vec<u8>) -> u16 {
        if let Some(index) = self.interned.get(&key) {
            return *index;
        }
        let encoded = encode(self);
        let index = self.next;
        self.bytes.extend_from_slice(&encoded);
        self.next += slots;
        self.interned.insert(key, index);
        index
    }

    fn utf8(&mut self, value: &str) -> u16 {
        self.intern(PoolKey::Utf8(value.to_string()), 1, |_| {
            let mut out = vec![1];
            put_u2(&mut out, value.len() as u16);
            out.extend_from_slice(value.as_bytes());
            out
        })
    }

    fn integer(&mut self, value: i32) -> u16 {
        self.intern(PoolKey::Integer(value), 1, |_| {
            let mut out = vec![3];
            out.extend_from_slice(&value.to_be_bytes());
            out
        })
    }

    fn long(&mut self, value: i64) -> u16 {
        self.intern(PoolKey::Long(value), 2, |_| {
            let mut out = vec![5];
            out.extend_from_slice(&value.to_be_bytes());
            out
        })
    }

    fn class(&mut self, name: &str) -> u16 {
        let internal = internal_name(name);
        self.intern(PoolKey::Class(internal.clone()), 1, |pool| {
            let name_index = pool.utf8(&internal);
            let mut out = vec![7];
            put_u2(&mut out, name_index);
            out
        })
    }

    fn string(&mut self, value: &str) -> u16 {
        self.intern(PoolKey::String(value.to_string()), 1, |pool| {
            let string_index = pool.utf8(value);
            let mut out = vec![8];
            put_u2(&mut out, string_index);
            out
        })
    }

    fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        self.intern(
            PoolKey::NameAndType(name.to_string(), descriptor.to_string()),
            1,
            |pool| {
                let name_index = pool.utf8(name);
                let descriptor_index = pool.utf8(descriptor);
                let mut out = vec![12];
                put_u2(&mut out, name_index);
                put_u2(&mut out, descriptor_index);
                out
            },
        )
    }

    fn member_ref(&mut self, tag: u8, owner: &str, name: &str, descriptor: &str) -> u16 {
        self.intern(
            PoolKey::Member(tag, owner.to_string(), name.to_string(), descriptor.to_string()),
            1,
            |pool| {
                let class_index = pool.class(owner);
                let nat_index = pool.name_and_type(name, descriptor);
                let mut out = vec![tag];
                put_u2(&mut out, class_index);
                put_u2(&mut out, nat_index);
                out
            },
        )
    }
}
