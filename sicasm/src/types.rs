use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Highest addressable byte of the 24-bit address space.
pub const MAX_ADDRESS: u32 = 0xFF_FFFF;
pub const DEFAULT_MAX_LABEL_LEN: usize = 10;
pub const MAX_OPCODE: u8 = 63;

static REGISTER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^R(?:[1-9]|1[0-6])$").expect("register pattern is valid"));

/// Returns the register number for tokens `R1`..`R16` (uppercase `R` only).
pub fn register_number(token: &str) -> Option<u8> {
    if REGISTER_RE.is_match(token) {
        token[1..].parse().ok()
    } else {
        None
    }
}

pub fn is_register(token: &str) -> bool {
    REGISTER_RE.is_match(token)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum OperandLength {
    One = 1,
    Two = 2,
    Four = 4,
}

impl OperandLength {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(OperandLength::One),
            2 => Some(OperandLength::Two),
            4 => Some(OperandLength::Four),
            _ => None,
        }
    }

    pub fn bytes(self) -> u32 {
        self as u32
    }
}

/// Raw instruction definition as it arrives from a table text: every field is
/// still a string. `code` and `length` are hexadecimal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionDto {
    pub name: String,
    pub code: String,
    pub length: String,
}

impl InstructionDto {
    pub fn new(name: &str, code: &str, length: &str) -> Self {
        Self {
            name: name.to_string(),
            code: code.to_string(),
            length: length.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionDef {
    pub name: String,
    pub opcode: u8,
    pub length: OperandLength,
}

impl InstructionDef {
    pub fn new(name: &str, opcode: u8, length: OperandLength) -> Self {
        Self {
            name: name.to_string(),
            opcode,
            length,
        }
    }

    /// Opcode shifted into the high six bits, addressing mode 0.
    pub fn opcode_byte(&self) -> u8 {
        self.opcode << 2
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DirectiveKind {
    Start,
    End,
    Word,
    Byte,
    Resw,
    Resb,
}

impl DirectiveKind {
    pub const ALL: [DirectiveKind; 6] = [
        DirectiveKind::Start,
        DirectiveKind::End,
        DirectiveKind::Word,
        DirectiveKind::Byte,
        DirectiveKind::Resb,
        DirectiveKind::Resw,
    ];

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "START" => Some(DirectiveKind::Start),
            "END" => Some(DirectiveKind::End),
            "WORD" => Some(DirectiveKind::Word),
            "BYTE" => Some(DirectiveKind::Byte),
            "RESW" => Some(DirectiveKind::Resw),
            "RESB" => Some(DirectiveKind::Resb),
            _ => None,
        }
    }

    pub fn to_str(self) -> &'static str {
        match self {
            DirectiveKind::Start => "START",
            DirectiveKind::End => "END",
            DirectiveKind::Word => "WORD",
            DirectiveKind::Byte => "BYTE",
            DirectiveKind::Resw => "RESW",
            DirectiveKind::Resb => "RESB",
        }
    }
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

/// A source or intermediate line split into its grammatical slots.
///
/// `label` and `mnemonic` are uppercased; operands are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedLine {
    pub label: Option<String>,
    pub mnemonic: String,
    pub operand1: Option<String>,
    pub operand2: Option<String>,
}

impl ClassifiedLine {
    pub fn operand_count(&self) -> usize {
        self.operand1.is_some() as usize + self.operand2.is_some() as usize
    }
}

/// Run state of one first pass, handed to the second pass read-only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyState {
    pub location_counter: u32,
    pub start_address: u32,
    pub end_address: u32,
    pub start_seen: bool,
    pub end_seen: bool,
}

impl AssemblyState {
    pub fn program_length(&self) -> u32 {
        self.location_counter.saturating_sub(self.start_address)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolEntry {
    pub name: String,
    pub address: u32,
}

impl fmt::Display for SymbolEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:06X}", self.name, self.address)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "form", content = "value")]
pub enum InstructionOperands {
    None,
    /// Register tokens exactly as written (`R1`..`R16`)
    Registers(String, String),
    Byte(u8),
    Address(u32),
    /// Symbolic reference, resolved by the second pass
    Symbol(String),
}

/// One line of first-pass output. Carries integers; text is produced only
/// by `Display`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IntermediateLine {
    Start { label: String, address: u32 },
    Word { address: u32, value: u32 },
    ByteValue { address: u32, value: u8 },
    /// `C"..."` kept verbatim, `X"..."` uppercased
    ByteLiteral { address: u32, literal: String },
    Resw { address: u32, count: u8 },
    Resb { address: u32, count: u8 },
    Instruction {
        address: u32,
        opcode_byte: u8,
        operands: InstructionOperands,
    },
}

impl IntermediateLine {
    /// Address of the line; the start line reports the program start.
    pub fn address(&self) -> u32 {
        match self {
            IntermediateLine::Start { address, .. }
            | IntermediateLine::Word { address, .. }
            | IntermediateLine::ByteValue { address, .. }
            | IntermediateLine::ByteLiteral { address, .. }
            | IntermediateLine::Resw { address, .. }
            | IntermediateLine::Resb { address, .. }
            | IntermediateLine::Instruction { address, .. } => *address,
        }
    }
}

impl fmt::Display for IntermediateLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntermediateLine::Start { label, address } => {
                write!(f, "{} START {:06X}", label, address)
            }
            IntermediateLine::Word { address, value } => {
                write!(f, "{:06X} WORD {:06X}", address, value)
            }
            IntermediateLine::ByteValue { address, value } => {
                write!(f, "{:06X} BYTE {:02X}", address, value)
            }
            IntermediateLine::ByteLiteral { address, literal } => {
                write!(f, "{:06X} BYTE {}", address, literal)
            }
            IntermediateLine::Resw { address, count } => {
                write!(f, "{:06X} RESW {:02X}", address, count)
            }
            IntermediateLine::Resb { address, count } => {
                write!(f, "{:06X} RESB {:02X}", address, count)
            }
            IntermediateLine::Instruction {
                address,
                opcode_byte,
                operands,
            } => {
                write!(f, "{:06X} {:02X}", address, opcode_byte)?;
                match operands {
                    InstructionOperands::None => Ok(()),
                    InstructionOperands::Registers(r1, r2) => write!(f, " {} {}", r1, r2),
                    InstructionOperands::Byte(value) => write!(f, " {:02X}", value),
                    InstructionOperands::Address(value) => write!(f, " {:06X}", value),
                    InstructionOperands::Symbol(label) => write!(f, " {}", label),
                }
            }
        }
    }
}

/// One line of second-pass output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ObjectRecord {
    Header { name: String, start: u32, length: u32 },
    Text { label: String, length: u32, payload: String },
    /// Length-only text record emitted for RESB/RESW
    Reserve { label: String, length: u32 },
    End { address: u32 },
}

impl fmt::Display for ObjectRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectRecord::Header {
                name,
                start,
                length,
            } => write!(f, "H {} {:06X} {:06X}", name, start, length),
            ObjectRecord::Text {
                label,
                length,
                payload,
            } => write!(f, "T {} {:02X} {}", label, length, payload),
            ObjectRecord::Reserve { label, length } => write!(f, "T {} {:02X}", label, length),
            ObjectRecord::End { address } => write!(f, "E {:06X}", address),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssemblerOptions {
    pub max_address: u32,
    pub max_label_len: usize,
    /// Start every first pass from an empty symbol table
    pub clear_symbols_on_first_pass: bool,
}

impl Default for AssemblerOptions {
    fn default() -> Self {
        Self {
            max_address: MAX_ADDRESS,
            max_label_len: DEFAULT_MAX_LABEL_LEN,
            clear_symbols_on_first_pass: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_tokens() {
        assert_eq!(register_number("R1"), Some(1));
        assert_eq!(register_number("R16"), Some(16));
        assert_eq!(register_number("R0"), None);
        assert_eq!(register_number("R17"), None);
        assert_eq!(register_number("R01"), None);
        assert_eq!(register_number("r3"), None);
    }

    #[test]
    fn test_intermediate_display() {
        let line = IntermediateLine::Word {
            address: 0x100,
            value: 64,
        };
        assert_eq!(line.to_string(), "000100 WORD 000040");

        let line = IntermediateLine::Instruction {
            address: 0x103,
            opcode_byte: 0x05,
            operands: InstructionOperands::Symbol("L1".to_string()),
        };
        assert_eq!(line.to_string(), "000103 05 L1");

        let line = IntermediateLine::Instruction {
            address: 0x10,
            opcode_byte: 0x10,
            operands: InstructionOperands::Registers("R1".to_string(), "R2".to_string()),
        };
        assert_eq!(line.to_string(), "000010 10 R1 R2");
    }

    #[test]
    fn test_object_record_display() {
        let header = ObjectRecord::Header {
            name: "PROG".to_string(),
            start: 0x100,
            length: 0x1A,
        };
        assert_eq!(header.to_string(), "H PROG 000100 00001A");

        let reserve = ObjectRecord::Reserve {
            label: "000110".to_string(),
            length: 0x2FD,
        };
        assert_eq!(reserve.to_string(), "T 000110 2FD");
        assert_eq!(ObjectRecord::End { address: 0x100 }.to_string(), "E 000100");
    }

    #[test]
    fn test_directive_lookup_is_case_insensitive() {
        assert_eq!(DirectiveKind::from_str("resw"), Some(DirectiveKind::Resw));
        assert_eq!(DirectiveKind::from_str("Start"), Some(DirectiveKind::Start));
        assert_eq!(DirectiveKind::from_str("JMP"), None);
    }
}
