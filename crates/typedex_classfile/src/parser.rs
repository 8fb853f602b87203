use crate::constant_pool::{Constant, ConstantPool};
use crate::descriptor::{binary_name, parse_field_descriptor};
use crate::error::ClassParseError;
use crate::model::{
    Annotation, ClassFile, Code, ElementValue, FieldInfo, LineNumber, LocalVariable, MethodInfo,
};
use crate::reader::ClassReader;

pub fn parse_class(bytes: &[u8]) -> Result<ClassFile, ClassParseError> {
    let mut reader = ClassReader::new(bytes);
    reader.expect_magic()?;
    let minor_version = reader.read_u2()?;
    let major_version = reader.read_u2()?;
    let constant_pool = ConstantPool::parse(&mut reader)?;

    let access_flags = reader.read_u2()?;
    let this_index = reader.read_u2()?;
    let super_index = reader.read_u2()?;
    let this_class = constant_pool.class_name(this_index)?.to_string();
    let super_class = match super_index {
        0 => None,
        index => Some(constant_pool.class_name(index)?.to_string()),
    };

    let interfaces_count = reader.read_u2()?;
    let mut interfaces = Vec::with_capacity(interfaces_count as usize);
    for _ in 0..interfaces_count {
        let index = reader.read_u2()?;
        interfaces.push(constant_pool.class_name(index)?.to_string());
    }

    let fields_count = reader.read_u2()?;
    let mut fields = Vec::with_capacity(fields_count as usize);
    for _ in 0..fields_count {
        fields.push(parse_field(&mut reader, &constant_pool)?);
    }

    let methods_count = reader.read_u2()?;
    let mut methods = Vec::with_capacity(methods_count as usize);
    for _ in 0..methods_count {
        methods.push(parse_method(&mut reader, &constant_pool)?);
    }

    let mut annotations = Vec::new();
    let attributes_count = reader.read_u2()?;
    for _ in 0..attributes_count {
        let (name, body) = read_attribute(&mut reader, &constant_pool)?;
        match name {
            "RuntimeVisibleAnnotations" => {
                annotations.extend(parse_annotations(body, &constant_pool, true)?)
            }
            "RuntimeInvisibleAnnotations" => {
                annotations.extend(parse_annotations(body, &constant_pool, false)?)
            }
            _ => {}
        }
    }

    Ok(ClassFile {
        minor_version,
        major_version,
        access_flags,
        this_class,
        super_class,
        interfaces,
        fields,
        methods,
        annotations,
        constant_pool,
    })
}

fn read_attribute<'p, 'd>(
    reader: &mut ClassReader<'d>,
    pool: &'p ConstantPool,
) -> Result<(&'p str, &'d [u8]), ClassParseError> {
    let name_index = reader.read_u2()?;
    let length = reader.read_u4()? as usize;
    let name = pool.utf8(name_index)?;
    Ok((name, reader.read_slice(length)?))
}

fn parse_field(
    reader: &mut ClassReader<'_>,
    pool: &ConstantPool,
) -> Result<FieldInfo, ClassParseError> {
    let access_flags = reader.read_u2()?;
    let name = pool.utf8(reader.read_u2()?)?.to_string();
    let descriptor = pool.utf8(reader.read_u2()?)?.to_string();

    let mut annotations = Vec::new();
    let attributes_count = reader.read_u2()?;
    for _ in 0..attributes_count {
        let (attribute, body) = read_attribute(reader, pool)?;
        match attribute {
            "RuntimeVisibleAnnotations" => annotations.extend(parse_annotations(body, pool, true)?),
            "RuntimeInvisibleAnnotations" => {
                annotations.extend(parse_annotations(body, pool, false)?)
            }
            _ => {}
        }
    }

    Ok(FieldInfo {
        access_flags,
        name,
        descriptor,
        annotations,
    })
}

fn parse_method(
    reader: &mut ClassReader<'_>,
    pool: &ConstantPool,
) -> Result<MethodInfo, ClassParseError> {
    let access_flags = reader.read_u2()?;
    let name = pool.utf8(reader.read_u2()?)?.to_string();
    let descriptor = pool.utf8(reader.read_u2()?)?.to_string();

    let mut method = MethodInfo {
        access_flags,
        name,
        descriptor,
        annotations: Vec::new(),
        parameter_annotations: Vec::new(),
        parameter_names: None,
        annotation_default: None,
        code: None,
    };

    let attributes_count = reader.read_u2()?;
    for _ in 0..attributes_count {
        let (attribute, body) = read_attribute(reader, pool)?;
        match attribute {
            "RuntimeVisibleAnnotations" => method
                .annotations
                .extend(parse_annotations(body, pool, true)?),
            "RuntimeInvisibleAnnotations" => method
                .annotations
                .extend(parse_annotations(body, pool, false)?),
            "RuntimeVisibleParameterAnnotations" => {
                merge_parameter_annotations(
                    &mut method.parameter_annotations,
                    parse_parameter_annotations(body, pool, true)?,
                );
            }
            "RuntimeInvisibleParameterAnnotations" => {
                merge_parameter_annotations(
                    &mut method.parameter_annotations,
                    parse_parameter_annotations(body, pool, false)?,
                );
            }
            "MethodParameters" => method.parameter_names = Some(parse_method_parameters(body, pool)?),
            "AnnotationDefault" => {
                let mut sub_reader = ClassReader::new(body);
                method.annotation_default = Some(parse_element_value(&mut sub_reader, pool, 0)?);
            }
            "Code" => method.code = Some(parse_code(body, pool)?),
            _ => {}
        }
    }

    Ok(method)
}

fn merge_parameter_annotations(target: &mut Vec<Vec<Annotation>>, parsed: Vec<Vec<Annotation>>) {
    if target.len() < parsed.len() {
        target.resize_with(parsed.len(), Vec::new);
    }
    for (slot, annotations) in target.iter_mut().zip(parsed) {
        slot.extend(annotations);
    }
}

fn parse_code(body: &[u8], pool: &ConstantPool) -> Result<Code, ClassParseError> {
    let mut reader = ClassReader::new(body);
    let max_stack = reader.read_u2()?;
    let max_locals = reader.read_u2()?;
    let code_length = reader.read_u4()? as usize;
    let bytecode = reader.read_slice(code_length)?.to_vec();
    let exception_table_length = reader.read_u2()? as usize;
    reader.skip(exception_table_length * 8)?;

    let mut code = Code {
        max_stack,
        max_locals,
        bytecode,
        ..Code::default()
    };

    let attributes_count = reader.read_u2()?;
    for _ in 0..attributes_count {
        let (attribute, attribute_body) = read_attribute(&mut reader, pool)?;
        let mut sub_reader = ClassReader::new(attribute_body);
        match attribute {
            "LineNumberTable" => {
                let count = sub_reader.read_u2()?;
                for _ in 0..count {
                    code.line_numbers.push(LineNumber {
                        start_pc: sub_reader.read_u2()?,
                        line: sub_reader.read_u2()?,
                    });
                }
            }
            "LocalVariableTable" => {
                let count = sub_reader.read_u2()?;
                for _ in 0..count {
                    let start_pc = sub_reader.read_u2()?;
                    let length = sub_reader.read_u2()?;
                    let name = pool.utf8(sub_reader.read_u2()?)?.to_string();
                    let descriptor = pool.utf8(sub_reader.read_u2()?)?.to_string();
                    let index = sub_reader.read_u2()?;
                    code.local_variables.push(LocalVariable {
                        start_pc,
                        length,
                        name,
                        descriptor,
                        index,
                    });
                }
            }
            _ => {}
        }
    }

    Ok(code)
}

fn parse_method_parameters(
    body: &[u8],
    pool: &ConstantPool,
) -> Result<Vec<Option<String>>, ClassParseError> {
    let mut reader = ClassReader::new(body);
    let count = reader.read_u1()?;
    let mut names = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name_index = reader.read_u2()?;
        let _access_flags = reader.read_u2()?;
        names.push(match name_index {
            0 => None,
            index => Some(pool.utf8(index)?.to_string()),
        });
    }
    Ok(names)
}

fn parse_parameter_annotations(
    body: &[u8],
    pool: &ConstantPool,
    visible: bool,
) -> Result<Vec<Vec<Annotation>>, ClassParseError> {
    let mut reader = ClassReader::new(body);
    let parameters = reader.read_u1()?;
    let mut result = Vec::with_capacity(parameters as usize);
    for _ in 0..parameters {
        result.push(read_annotation_list(&mut reader, pool, visible)?);
    }
    Ok(result)
}

fn parse_annotations(
    body: &[u8],
    pool: &ConstantPool,
    visible: bool,
) -> Result<Vec<Annotation>, ClassParseError> {
    let mut reader = ClassReader::new(body);
    read_annotation_list(&mut reader, pool, visible)
}

fn read_annotation_list(
    reader: &mut ClassReader<'_>,
    pool: &ConstantPool,
    visible: bool,
) -> Result<Vec<Annotation>, ClassParseError> {
    let count = reader.read_u2()?;
    let mut annotations = Vec::with_capacity(count as usize);
    for _ in 0..count {
        annotations.push(parse_annotation(reader, pool, visible, 0)?);
    }
    Ok(annotations)
}

fn parse_annotation(
    reader: &mut ClassReader<'_>,
    pool: &ConstantPool,
    visible: bool,
    depth: usize,
) -> Result<Annotation, ClassParseError> {
    let type_name = parse_field_descriptor(pool.utf8(reader.read_u2()?)?)?;
    let pairs = reader.read_u2()?;
    let mut elements = Vec::with_capacity(pairs as usize);
    for _ in 0..pairs {
        let name = pool.utf8(reader.read_u2()?)?.to_string();
        let value = parse_element_value(reader, pool, depth + 1)?;
        elements.push((name, value));
    }
    Ok(Annotation {
        type_name,
        visible,
        elements,
    })
}

/// Nesting limit for annotation and array element values.
const MAX_ELEMENT_DEPTH: usize = 64;

fn parse_element_value(
    reader: &mut ClassReader<'_>,
    pool: &ConstantPool,
    depth: usize,
) -> Result<ElementValue, ClassParseError> {
    if depth > MAX_ELEMENT_DEPTH {
        return Err(ClassParseError::MalformedAttribute {
            attribute: "element_value",
            reason: format!("nested deeper than {MAX_ELEMENT_DEPTH} levels"),
        });
    }
    let tag = reader.read_u1()?;
    let value = match tag {
        b'B' | b'C' | b'S' | b'I' | b'Z' => {
            let index = reader.read_u2()?;
            let Constant::Integer(value) = pool.get(index)? else {
                return Err(ClassParseError::InvalidConstantIndex { index });
            };
            let value = *value;
            match tag {
                b'B' => ElementValue::Byte(value as i8),
                b'C' => ElementValue::Char(value as u16),
                b'S' => ElementValue::Short(value as i16),
                b'Z' => ElementValue::Boolean(value != 0),
                _ => ElementValue::Int(value),
            }
        }
        b'J' => {
            let index = reader.read_u2()?;
            match pool.get(index)? {
                Constant::Long(value) => ElementValue::Long(*value),
                _ => return Err(ClassParseError::InvalidConstantIndex { index }),
            }
        }
        b'F' => {
            let index = reader.read_u2()?;
            match pool.get(index)? {
                Constant::Float(value) => ElementValue::Float(*value),
                _ => return Err(ClassParseError::InvalidConstantIndex { index }),
            }
        }
        b'D' => {
            let index = reader.read_u2()?;
            match pool.get(index)? {
                Constant::Double(value) => ElementValue::Double(*value),
                _ => return Err(ClassParseError::InvalidConstantIndex { index }),
            }
        }
        b's' => ElementValue::String(pool.utf8(reader.read_u2()?)?.to_string()),
        b'e' => {
            let type_name = parse_field_descriptor(pool.utf8(reader.read_u2()?)?)?;
            let constant = pool.utf8(reader.read_u2()?)?.to_string();
            ElementValue::Enum {
                type_name,
                constant,
            }
        }
        b'c' => {
            let descriptor = pool.utf8(reader.read_u2()?)?;
            let name = if descriptor == "V" {
                "void".to_string()
            } else {
                parse_field_descriptor(descriptor).unwrap_or_else(|_| binary_name(descriptor))
            };
            ElementValue::Class(name)
        }
        b'@' => ElementValue::Annotation(Box::new(parse_annotation(reader, pool, true, depth)?)),
        b'[' => {
            let count = reader.read_u2()?;
            let mut values = Vec::with_capacity(count as usize);
            for _ in 0..count {
                values.push(parse_element_value(reader, pool, depth + 1)?);
            }
            ElementValue::Array(values)
        }
        other => {
            return Err(ClassParseError::MalformedAttribute {
                attribute: "element_value",
                reason: format!("unknown tag '{}'", other as char),
            });
        }
    };
    Ok(value)
}
