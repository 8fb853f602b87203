use serde::{Deserialize, Serialize};
use typedex_classfile::{
    ACC_STATIC, ClassFile, ClassParseError, MethodInfo, MethodType, parse_field_descriptor,
    parse_method_descriptor,
};

use crate::tag::{TagInstance, TagValue};

/// The universal root type.
pub const OBJECT: &str = "java.lang.Object";
/// Meta-tag marking a tag as inherited by subclasses.
pub const INHERITED: &str = "java.lang.annotation.Inherited";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeKind {
    Class,
    Interface,
    Annotation,
    Enum,
}

/// Backend-neutral shape of one compiled type.
///
/// `super_class` is the immediate declared supertype only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub name: String,
    pub kind: TypeKind,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub tags: Vec<TagInstance>,
    pub fields: Vec<FieldDescriptor>,
    pub methods: Vec<MethodDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub type_name: String,
    /// `Owner.field`
    pub key: String,
    pub tags: Vec<TagInstance>,
    pub is_static: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDescriptor {
    pub name: String,
    /// Raw JVM descriptor, e.g. `(Ljava/lang/String;)V`.
    pub descriptor: String,
    pub parameter_types: Vec<String>,
    pub parameter_tags: Vec<Vec<TagInstance>>,
    /// Present only when the record carries parameter names or a local
    /// variable table covering every parameter.
    pub parameter_names: Option<Vec<String>>,
    pub return_type: String,
    /// `Owner.name(p1,p2)`
    pub signature: String,
    pub tags: Vec<TagInstance>,
    pub is_static: bool,
    /// Declared default of an annotation member.
    pub default_value: Option<TagValue>,
}

impl MethodDescriptor {
    pub fn is_constructor(&self) -> bool {
        self.name == "<init>"
    }
}

pub fn method_signature(owner: &str, name: &str, parameter_types: &[String]) -> String {
    format!("{owner}.{name}({})", parameter_types.join(","))
}

pub fn field_key(owner: &str, name: &str) -> String {
    format!("{owner}.{name}")
}

/// Splits a method signature or field key into owner and member parts.
pub fn split_member_key(key: &str) -> Option<(&str, &str)> {
    let head = match key.find('(') {
        Some(paren) => &key[..paren],
        None => key,
    };
    let dot = head.rfind('.')?;
    Some((&key[..dot], &key[dot + 1..]))
}

impl TypeDescriptor {
    pub fn from_class_file(class: &ClassFile) -> Result<Self, ClassParseError> {
        let name = class.name();
        let kind = if class.is_annotation() {
            TypeKind::Annotation
        } else if class.is_interface() {
            TypeKind::Interface
        } else if class.access_flags & typedex_classfile::ACC_ENUM != 0 {
            TypeKind::Enum
        } else {
            TypeKind::Class
        };

        let fields = class
            .fields
            .iter()
            .map(|field| {
                Ok(FieldDescriptor {
                    key: field_key(&name, &field.name),
                    name: field.name.clone(),
                    type_name: parse_field_descriptor(&field.descriptor)?,
                    tags: field.annotations.iter().map(TagInstance::from).collect(),
                    is_static: field.access_flags & ACC_STATIC != 0,
                })
            })
            .collect::<Result<Vec<_>, ClassParseError>>()?;

        let methods = class
            .methods
            .iter()
            .filter(|method| !method.is_initializer())
            .map(|method| method_descriptor(&name, method))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            super_class: class.super_name(),
            interfaces: class.interface_names(),
            tags: class.annotations.iter().map(TagInstance::from).collect(),
            name,
            kind,
            fields,
            methods,
        })
    }

    pub fn is_interface(&self) -> bool {
        matches!(self.kind, TypeKind::Interface | TypeKind::Annotation)
    }

    pub fn tag_names(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(|tag| tag.type_name.as_str())
    }

    pub fn tag(&self, type_name: &str) -> Option<&TagInstance> {
        self.tags.iter().find(|tag| tag.type_name == type_name)
    }

    /// Immediate supertype followed by the declared interfaces.
    pub fn supertypes(&self) -> impl Iterator<Item = &str> {
        self.super_class
            .as_deref()
            .into_iter()
            .chain(self.interfaces.iter().map(String::as_str))
    }

    pub fn method_by_signature(&self, signature: &str) -> Option<&MethodDescriptor> {
        self.methods
            .iter()
            .find(|method| method.signature == signature)
    }

    pub fn method(&self, name: &str, descriptor: &str) -> Option<&MethodDescriptor> {
        self.methods
            .iter()
            .find(|method| method.name == name && method.descriptor == descriptor)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Member defaults when this type is a tag type.
    pub fn tag_defaults(&self) -> impl Iterator<Item = (&str, &TagValue)> {
        self.methods.iter().filter_map(|method| {
            method
                .default_value
                .as_ref()
                .map(|value| (method.name.as_str(), value))
        })
    }
}

fn method_descriptor(owner: &str, method: &MethodInfo) -> Result<MethodDescriptor, ClassParseError> {
    let ty = parse_method_descriptor(&method.descriptor)?;
    let parameter_tags = align_parameter_tags(method, ty.parameters.len());
    let parameter_names = parameter_names(method, &ty);
    Ok(MethodDescriptor {
        signature: method_signature(owner, &method.name, &ty.parameters),
        name: method.name.clone(),
        descriptor: method.descriptor.clone(),
        parameter_tags,
        parameter_names,
        return_type: ty.return_type,
        parameter_types: ty.parameters,
        tags: method.annotations.iter().map(TagInstance::from).collect(),
        is_static: method.is_static(),
        default_value: method.annotation_default.as_ref().map(TagValue::from),
    })
}

/// Parameter annotation tables may omit leading synthetic parameters, so
/// they are aligned to the end of the parameter list.
fn align_parameter_tags(method: &MethodInfo, parameters: usize) -> Vec<Vec<TagInstance>> {
    let mut aligned = vec![Vec::new(); parameters];
    let declared = method.parameter_annotations.len().min(parameters);
    let offset = parameters - declared;
    let skipped = method.parameter_annotations.len() - declared;
    for (position, annotations) in method
        .parameter_annotations
        .iter()
        .skip(skipped)
        .enumerate()
    {
        aligned[offset + position] = annotations.iter().map(TagInstance::from).collect();
    }
    aligned
}

fn parameter_names(method: &MethodInfo, ty: &MethodType) -> Option<Vec<String>> {
    if let Some(names) = &method.parameter_names {
        if names.len() == ty.parameters.len() {
            if let Some(names) = names.iter().cloned().collect::<Option<Vec<_>>>() {
                return Some(names);
            }
        }
    }

    let code = method.code.as_ref()?;
    if code.local_variables.is_empty() {
        return None;
    }
    let mut slot: u16 = if method.is_static() { 0 } else { 1 };
    let mut names = Vec::with_capacity(ty.parameters.len());
    for width in ty.parameter_slots() {
        names.push(code.local_name(slot)?.to_string());
        slot += width as u16;
    }
    Some(names)
}
