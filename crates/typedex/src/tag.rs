use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use typedex_classfile::{Annotation, ElementValue};

/// An applied metadata tag: the tag type plus its member values, ordered by
/// member name so that equality and hashing are structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TagInstance {
    pub type_name: String,
    pub members: BTreeMap<String, TagValue>,
}

/// Value of one tag member. Floating point values are kept as raw bits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TagValue {
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(u32),
    Double(u64),
    Boolean(bool),
    String(String),
    Enum { type_name: String, constant: String },
    Class(String),
    Tag(Box<TagInstance>),
    Array(Vec<TagValue>),
}

impl TagInstance {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            members: BTreeMap::new(),
        }
    }

    pub fn with(mut self, member: impl Into<String>, value: TagValue) -> Self {
        self.members.insert(member.into(), value);
        self
    }

    /// Fills members the instance does not set from `defaults`.
    pub fn with_defaults<'a>(
        mut self,
        defaults: impl IntoIterator<Item = (&'a str, &'a TagValue)>,
    ) -> Self {
        for (member, value) in defaults {
            self.members
                .entry(member.to_string())
                .or_insert_with(|| value.clone());
        }
        self
    }
}

impl From<&Annotation> for TagInstance {
    fn from(annotation: &Annotation) -> Self {
        Self {
            type_name: annotation.type_name.clone(),
            members: annotation
                .elements
                .iter()
                .map(|(name, value)| (name.clone(), TagValue::from(value)))
                .collect(),
        }
    }
}

impl From<&ElementValue> for TagValue {
    fn from(value: &ElementValue) -> Self {
        match value {
            ElementValue::Byte(v) => TagValue::Byte(*v),
            ElementValue::Char(v) => TagValue::Char(*v),
            ElementValue::Short(v) => TagValue::Short(*v),
            ElementValue::Int(v) => TagValue::Int(*v),
            ElementValue::Boolean(v) => TagValue::Boolean(*v),
            ElementValue::Long(v) => TagValue::Long(*v),
            ElementValue::Float(v) => TagValue::Float(v.to_bits()),
            ElementValue::Double(v) => TagValue::Double(v.to_bits()),
            ElementValue::String(v) => TagValue::String(v.clone()),
            ElementValue::Enum {
                type_name,
                constant,
            } => TagValue::Enum {
                type_name: type_name.clone(),
                constant: constant.clone(),
            },
            ElementValue::Class(name) => TagValue::Class(name.clone()),
            ElementValue::Annotation(annotation) => {
                TagValue::Tag(Box::new(TagInstance::from(annotation.as_ref())))
            }
            ElementValue::Array(values) => {
                TagValue::Array(values.iter().map(TagValue::from).collect())
            }
        }
    }
}
