//! Structural reader for compiled JVM type records.
//!
//! Parses the class-file format without loading or linking any referenced
//! type: constant pool, hierarchy, members, annotation attributes, debug
//! tables and method bytecode.

mod bytecode;
mod constant_pool;
mod descriptor;
mod error;
mod model;
mod parser;
mod reader;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub use bytecode::{CodeReference, ReferenceKind, code_references};
pub use constant_pool::{Constant, ConstantPool, MemberRef};
pub use descriptor::{
    MethodType, binary_name, internal_name, parse_field_descriptor, parse_method_descriptor,
};
pub use error::ClassParseError;
pub use model::*;
pub use parser::parse_class;
