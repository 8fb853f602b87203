use crate::constant_pool::ConstantPool;
use crate::descriptor::binary_name;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_PROTECTED: u16 = 0x0004;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_FINAL: u16 = 0x0010;
pub const ACC_SYNTHETIC: u16 = 0x1000;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;
pub const ACC_ANNOTATION: u16 = 0x2000;
pub const ACC_ENUM: u16 = 0x4000;

/// A compiled type record as laid out in the class file, with names kept in
/// internal form and annotations decoded.
#[derive(Debug, Clone)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub access_flags: u16,
    pub this_class: String,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
    pub annotations: Vec<Annotation>,
    pub constant_pool: ConstantPool,
}

impl ClassFile {
    /// Source-style qualified name, e.g. `a.b.Outer$Inner`.
    pub fn name(&self) -> String {
        binary_name(&self.this_class)
    }

    pub fn super_name(&self) -> Option<String> {
        self.super_class.as_deref().map(binary_name)
    }

    pub fn interface_names(&self) -> Vec<String> {
        self.interfaces.iter().map(|name| binary_name(name)).collect()
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags & ACC_INTERFACE != 0
    }

    pub fn is_annotation(&self) -> bool {
        self.access_flags & ACC_ANNOTATION != 0
    }

    pub fn method(&self, name: &str, descriptor: &str) -> Option<&MethodInfo> {
        self.methods
            .iter()
            .find(|method| method.name == name && method.descriptor == descriptor)
    }

    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|field| field.name == name)
    }
}

#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
    pub annotations: Vec<Annotation>,
    /// Indexed by declared parameter position; may be shorter than the
    /// descriptor's parameter list when the compiler omitted synthetic slots.
    pub parameter_annotations: Vec<Vec<Annotation>>,
    /// Names from the `MethodParameters` attribute, when compiled with `-parameters`.
    pub parameter_names: Option<Vec<Option<String>>>,
    pub annotation_default: Option<ElementValue>,
    pub code: Option<Code>,
}

impl MethodInfo {
    pub fn is_static(&self) -> bool {
        self.access_flags & ACC_STATIC != 0
    }

    pub fn is_constructor(&self) -> bool {
        self.name == "<init>"
    }

    pub fn is_initializer(&self) -> bool {
        self.name == "<clinit>"
    }
}

#[derive(Debug, Clone, Default)]
pub struct Code {
    pub max_stack: u16,
    pub max_locals: u16,
    pub bytecode: Vec<u8>,
    pub line_numbers: Vec<LineNumber>,
    pub local_variables: Vec<LocalVariable>,
}

impl Code {
    /// Source line of the instruction at `pc`, if the line table covers it.
    pub fn line_at(&self, pc: usize) -> Option<u16> {
        self.line_numbers
            .iter()
            .filter(|entry| entry.start_pc as usize <= pc)
            .max_by_key(|entry| entry.start_pc)
            .map(|entry| entry.line)
    }

    /// Name of the local bound to `slot` at method entry.
    pub fn local_name(&self, slot: u16) -> Option<&str> {
        self.local_variables
            .iter()
            .filter(|local| local.index == slot)
            .min_by_key(|local| local.start_pc)
            .map(|local| local.name.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineNumber {
    pub start_pc: u16,
    pub line: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVariable {
    pub start_pc: u16,
    pub length: u16,
    pub name: String,
    pub descriptor: String,
    pub index: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    /// Source-style annotation type name.
    pub type_name: String,
    pub visible: bool,
    pub elements: Vec<(String, ElementValue)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Boolean(bool),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Enum { type_name: String, constant: String },
    Class(String),
    Annotation(Box<Annotation>),
    Array(Vec<ElementValue>),
}
