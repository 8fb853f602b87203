use crate::error::ClassParseError;

/// Parameter and return types of a method descriptor, as source-style names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodType {
    pub parameters: Vec<String>,
    pub return_type: String,
}

impl MethodType {
    /// Local-variable slot width of each parameter (`long`/`double` take two).
    pub fn parameter_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.parameters
            .iter()
            .map(|name| if name == "long" || name == "double" { 2 } else { 1 })
    }
}

/// Converts an internal name (`a/b/C`) or an array class name (`[La/b/C;`) to
/// its source-style form.
pub fn binary_name(internal: &str) -> String {
    if internal.starts_with('[') {
        if let Ok(name) = parse_field_descriptor(internal) {
            return name;
        }
    }
    internal.replace('/', ".")
}

/// Converts a source-style name back to the internal form.
pub fn internal_name(binary: &str) -> String {
    binary.replace('.', "/")
}

pub fn parse_field_descriptor(descriptor: &str) -> Result<String, ClassParseError> {
    let mut parser = DescriptorParser::new(descriptor);
    let ty = parser.parse_type()?;
    if parser.remaining() != 0 {
        return Err(ClassParseError::InvalidDescriptor(descriptor.to_string()));
    }
    Ok(ty)
}

pub fn parse_method_descriptor(descriptor: &str) -> Result<MethodType, ClassParseError> {
    let mut parser = DescriptorParser::new(descriptor);
    parser.expect(b'(')?;
    let mut parameters = Vec::new();
    while !parser.peek(b')')? {
        parameters.push(parser.parse_type()?);
    }
    parser.expect(b')')?;
    let return_type = if parser.peek(b'V')? {
        parser.pos += 1;
        "void".to_string()
    } else {
        parser.parse_type()?
    };

    if parser.remaining() != 0 {
        return Err(ClassParseError::InvalidDescriptor(descriptor.to_string()));
    }

    Ok(MethodType {
        parameters,
        return_type,
    })
}

struct DescriptorParser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> DescriptorParser<'a> {
    fn new(descriptor: &'a str) -> Self {
        Self {
            bytes: descriptor.as_bytes(),
            pos: 0,
        }
    }

    fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.pos)
    }

    fn peek(&self, ch: u8) -> Result<bool, ClassParseError> {
        match self.bytes.get(self.pos) {
            Some(byte) => Ok(*byte == ch),
            None => Err(ClassParseError::InvalidDescriptor(
                "descriptor ended early".into(),
            )),
        }
    }

    fn expect(&mut self, ch: u8) -> Result<(), ClassParseError> {
        if !self.peek(ch)? {
            return Err(ClassParseError::InvalidDescriptor(format!(
                "expected '{}' in descriptor",
                ch as char
            )));
        }
        self.pos += 1;
        Ok(())
    }

    fn parse_type(&mut self) -> Result<String, ClassParseError> {
        let Some(&start) = self.bytes.get(self.pos) else {
            return Err(ClassParseError::InvalidDescriptor(
                "descriptor ended early".into(),
            ));
        };
        let primitive = match start {
            b'B' => "byte",
            b'C' => "char",
            b'D' => "double",
            b'F' => "float",
            b'I' => "int",
            b'J' => "long",
            b'S' => "short",
            b'Z' => "boolean",
            b'L' => return self.parse_reference_type(),
            b'[' => return self.parse_array_type(),
            _ => {
                return Err(ClassParseError::InvalidDescriptor(format!(
                    "unexpected descriptor tag '{}'",
                    start as char
                )));
            }
        };
        self.pos += 1;
        Ok(primitive.to_string())
    }

    fn parse_reference_type(&mut self) -> Result<String, ClassParseError> {
        self.expect(b'L')?;
        let start = self.pos;
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b';' {
            self.pos += 1;
        }
        if self.pos >= self.bytes.len() {
            return Err(ClassParseError::InvalidDescriptor(
                "unterminated reference descriptor".into(),
            ));
        }
        let name = String::from_utf8(self.bytes[start..self.pos].to_vec())?;
        self.pos += 1;
        Ok(name.replace('/', "."))
    }

    fn parse_array_type(&mut self) -> Result<String, ClassParseError> {
        let mut dimensions = 0;
        while self.remaining() > 0 && self.bytes[self.pos] == b'[' {
            dimensions += 1;
            self.pos += 1;
        }
        let mut element = self.parse_type()?;
        for _ in 0..dimensions {
            element.push_str("[]");
        }
        Ok(element)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_descriptor_uses_source_names() {
        let parsed = parse_method_descriptor("(Ljava/lang/String;I[[JLa/b/Outer$Inner;)V").unwrap();
        assert_eq!(
            parsed.parameters,
            vec!["java.lang.String", "int", "long[][]", "a.b.Outer$Inner"]
        );
        assert_eq!(parsed.return_type, "void");
        assert_eq!(parsed.parameter_slots().collect::<Vec<_>>(), vec![1, 1, 1, 1]);
    }

    #[test]
    fn wide_primitives_take_two_slots() {
        let parsed = parse_method_descriptor("(JDI)Z").unwrap();
        assert_eq!(parsed.parameter_slots().collect::<Vec<_>>(), vec![2, 2, 1]);
        assert_eq!(parsed.return_type, "boolean");
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(parse_field_descriptor("IX").is_err());
        assert!(parse_method_descriptor("(Ljava/lang/String)V").is_err());
    }

    #[test]
    fn array_class_names_become_source_names() {
        assert_eq!(binary_name("[Ljava/lang/Object;"), "java.lang.Object[]");
        assert_eq!(binary_name("a/b/C"), "a.b.C");
    }
}
