use crate::constant_pool::ConstantPool;
use crate::error::ClassParseError;
use crate::model::Code;

const OP_TABLESWITCH: u8 = 0xaa;
const OP_LOOKUPSWITCH: u8 = 0xab;
const OP_GETSTATIC: u8 = 0xb2;
const OP_PUTSTATIC: u8 = 0xb3;
const OP_GETFIELD: u8 = 0xb4;
const OP_PUTFIELD: u8 = 0xb5;
const OP_INVOKEVIRTUAL: u8 = 0xb6;
const OP_INVOKESPECIAL: u8 = 0xb7;
const OP_INVOKESTATIC: u8 = 0xb8;
const OP_INVOKEINTERFACE: u8 = 0xb9;
const OP_NEW: u8 = 0xbb;
const OP_WIDE: u8 = 0xc4;
const OP_IINC: u8 = 0x84;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    /// `new T(..)`: reported at the `new` instruction with the matching constructor.
    NewObject,
    /// `super(..)`/`this(..)` inside a constructor.
    ConstructorCall,
    MethodCall,
    FieldAccess { write: bool, is_static: bool },
}

/// One member referenced from a method body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeReference {
    pub kind: ReferenceKind,
    /// Internal owner name as written in the constant pool.
    pub owner: String,
    pub name: String,
    pub descriptor: String,
    pub interface: bool,
    pub pc: usize,
    pub line: Option<u16>,
}

/// Walks the instruction stream of `code` and reports every object
/// construction, constructor call, method invocation and field access.
///
/// A `new` is paired with the next `invokespecial <init>` on the same owner;
/// an `<init>` call with no pending `new` is a constructor chain call.
pub fn code_references(
    code: &Code,
    pool: &ConstantPool,
) -> Result<Vec<CodeReference>, ClassParseError> {
    let bytes = code.bytecode.as_slice();
    let mut references = Vec::new();
    let mut pending_new: Vec<(String, usize)> = Vec::new();
    let mut pc = 0;

    while pc < bytes.len() {
        let opcode = bytes[pc];
        let length = instruction_length(bytes, pc)?;
        if pc + length > bytes.len() {
            return Err(ClassParseError::UnexpectedEof);
        }
        let operand = || u16::from_be_bytes([bytes[pc + 1], bytes[pc + 2]]);

        match opcode {
            OP_NEW => {
                pending_new.push((pool.class_name(operand())?.to_string(), pc));
            }
            OP_GETSTATIC | OP_PUTSTATIC | OP_GETFIELD | OP_PUTFIELD => {
                let member = pool.member_ref(operand())?;
                references.push(CodeReference {
                    kind: ReferenceKind::FieldAccess {
                        write: matches!(opcode, OP_PUTSTATIC | OP_PUTFIELD),
                        is_static: matches!(opcode, OP_GETSTATIC | OP_PUTSTATIC),
                    },
                    owner: member.owner.to_string(),
                    name: member.name.to_string(),
                    descriptor: member.descriptor.to_string(),
                    interface: false,
                    pc,
                    line: code.line_at(pc),
                });
            }
            OP_INVOKEVIRTUAL | OP_INVOKESPECIAL | OP_INVOKESTATIC | OP_INVOKEINTERFACE => {
                let member = pool.member_ref(operand())?;
                let (kind, origin) = if opcode == OP_INVOKESPECIAL && member.name == "<init>" {
                    match pending_new.last() {
                        Some((owner, new_pc)) if owner == member.owner => {
                            let new_pc = *new_pc;
                            pending_new.pop();
                            (ReferenceKind::NewObject, new_pc)
                        }
                        _ => (ReferenceKind::ConstructorCall, pc),
                    }
                } else {
                    (ReferenceKind::MethodCall, pc)
                };
                references.push(CodeReference {
                    kind,
                    owner: member.owner.to_string(),
                    name: member.name.to_string(),
                    descriptor: member.descriptor.to_string(),
                    interface: member.interface,
                    pc: origin,
                    line: code.line_at(origin),
                });
            }
            _ => {}
        }

        pc += length;
    }

    references.sort_by_key(|reference| reference.pc);
    Ok(references)
}

fn instruction_length(bytes: &[u8], pc: usize) -> Result<usize, ClassParseError> {
    let opcode = bytes[pc];
    let length = match opcode {
        0x00..=0x0f => 1,
        0x10 => 2,
        0x11 => 3,
        0x12 => 2,
        0x13 | 0x14 => 3,
        0x15..=0x19 => 2,
        0x1a..=0x35 => 1,
        0x36..=0x3a => 2,
        0x3b..=0x83 => 1,
        OP_IINC => 3,
        0x85..=0x98 => 1,
        0x99..=0xa8 => 3,
        0xa9 => 2,
        OP_TABLESWITCH => {
            let base = switch_operands(pc);
            let low = read_i32(bytes, base + 4)?;
            let high = read_i32(bytes, base + 8)?;
            let cases = (high as i64 - low as i64 + 1).max(0) as usize;
            base - pc + 12 + cases * 4
        }
        OP_LOOKUPSWITCH => {
            let base = switch_operands(pc);
            let pairs = read_i32(bytes, base + 4)?.max(0) as usize;
            base - pc + 8 + pairs * 8
        }
        0xac..=0xb1 => 1,
        0xb2..=0xb8 => 3,
        0xb9 | 0xba => 5,
        0xbb => 3,
        0xbc => 2,
        0xbd => 3,
        0xbe | 0xbf => 1,
        0xc0 | 0xc1 => 3,
        0xc2 | 0xc3 => 1,
        OP_WIDE => match bytes.get(pc + 1) {
            Some(&OP_IINC) => 6,
            Some(_) => 4,
            None => return Err(ClassParseError::UnexpectedEof),
        },
        0xc5 => 4,
        0xc6 | 0xc7 => 3,
        0xc8 | 0xc9 => 5,
        0xca | 0xfe | 0xff => 1,
        other => return Err(ClassParseError::UnsupportedOpcode { opcode: other, pc }),
    };
    Ok(length)
}

/// Offset of the first 4-byte aligned operand after a switch opcode.
fn switch_operands(pc: usize) -> usize {
    let after = pc + 1;
    after + (4 - after % 4) % 4
}

fn read_i32(bytes: &[u8], at: usize) -> Result<i32, ClassParseError> {
    let slice = bytes.get(at..at + 4).ok_or(ClassParseError::UnexpectedEof)?;
    Ok(i32::from_be_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tableswitch_length_accounts_for_padding() {
        // pc 1: tableswitch, two padding bytes, default, low=0, high=1, two offsets.
        let mut bytes = vec![0x00, OP_TABLESWITCH, 0, 0];
        bytes.extend_from_slice(&8i32.to_be_bytes());
        bytes.extend_from_slice(&0i32.to_be_bytes());
        bytes.extend_from_slice(&1i32.to_be_bytes());
        bytes.extend_from_slice(&4i32.to_be_bytes());
        bytes.extend_from_slice(&4i32.to_be_bytes());
        assert_eq!(instruction_length(&bytes, 1).unwrap(), 3 + 12 + 8);
    }

    #[test]
    fn wide_iinc_is_six_bytes() {
        let bytes = [OP_WIDE, OP_IINC, 0, 1, 0, 1];
        assert_eq!(instruction_length(&bytes, 0).unwrap(), 6);
    }

    #[test]
    fn unknown_opcode_is_reported() {
        let bytes = [0xcb];
        assert!(matches!(
            instruction_length(&bytes, 0),
            Err(ClassParseError::UnsupportedOpcode { opcode: 0xcb, pc: 0 })
        ));
    }
}
