use crate::tokenizer::{join_tokens, tokenize};
use crate::types::{InstructionDef, InstructionDto, OperandLength, MAX_OPCODE};
use log::debug;
use sicasm_common::{AssemblerError, ErrorKind};
use std::collections::HashSet;

impl TryFrom<&InstructionDto> for InstructionDef {
    type Error = AssemblerError;

    fn try_from(dto: &InstructionDto) -> Result<Self, Self::Error> {
        let row = format!("{} {} {}", dto.name, dto.code, dto.length);
        let invalid = |message: &str| {
            AssemblerError::new(ErrorKind::InvalidInstruction, message, row.clone())
        };

        check_name(&dto.name).map_err(invalid)?;

        let opcode = u32::from_str_radix(&dto.code, 16)
            .map_err(|_| invalid("Instruction code must be a hexadecimal integer"))?;
        if opcode > MAX_OPCODE as u32 {
            return Err(invalid(OPCODE_RANGE));
        }

        let length = u32::from_str_radix(&dto.length, 16)
            .map_err(|_| invalid("Instruction length must be a hexadecimal integer"))?;
        let length = OperandLength::from_u32(length)
            .ok_or_else(|| invalid("Instruction length must be 1, 2 or 4"))?;

        Ok(InstructionDef {
            name: dto.name.clone(),
            opcode: opcode as u8,
            length,
        })
    }
}

const OPCODE_RANGE: &str = "Instruction code must be between 00 and 3F";

fn check_name(name: &str) -> Result<(), &'static str> {
    let mut chars = name.chars();
    match chars.next() {
        None => Err("Instruction name must not be empty"),
        Some(first) if !first.is_ascii_alphabetic() => {
            Err("Instruction name must start with a Latin letter")
        }
        Some(_) if !chars.all(|c| c.is_ascii_alphanumeric()) => {
            Err("Instruction name must consist of Latin letters and digits")
        }
        Some(_) => Ok(()),
    }
}

/// Name and opcode rules for a definition that did not come through
/// `TryFrom<&InstructionDto>`.
fn check_def(def: &InstructionDef) -> Result<(), AssemblerError> {
    let row = || format!("{} {:02X} {}", def.name, def.opcode, def.length.bytes());
    check_name(&def.name)
        .map_err(|message| AssemblerError::new(ErrorKind::InvalidInstruction, message, row()))?;
    if def.opcode > MAX_OPCODE {
        return Err(AssemblerError::new(
            ErrorKind::InvalidInstruction,
            OPCODE_RANGE,
            row(),
        ));
    }
    Ok(())
}

/// Parse an instruction table text: one `<name> <code> <length>` row per line.
pub fn parse_instruction_table(text: &str) -> Result<Vec<InstructionDto>, AssemblerError> {
    tokenize(text)
        .into_iter()
        .map(|line| match line.as_slice() {
            [name, code, length] => Ok(InstructionDto::new(name, code, length)),
            _ => Err(AssemblerError::malformed(
                "Instruction row must be <name> <code> <length>",
                join_tokens(&line),
            )),
        })
        .collect()
}

/// The set of instructions the assembler accepts. Names and opcodes are
/// unique; names compare case-insensitively.
#[derive(Debug, Clone)]
pub struct InstructionTable {
    instructions: Vec<InstructionDef>,
}

impl InstructionTable {
    /// Validate definitions and build a table. Nothing is kept on failure.
    pub fn from_dtos(dtos: &[InstructionDto]) -> Result<Self, AssemblerError> {
        let instructions = dtos
            .iter()
            .map(InstructionDef::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_defs(instructions)
    }

    /// Build a table from already typed definitions. They are checked against
    /// the same name and opcode rules as text rows.
    pub fn from_defs(instructions: Vec<InstructionDef>) -> Result<Self, AssemblerError> {
        for def in &instructions {
            check_def(def)?;
        }

        let mut names = HashSet::new();
        if let Some(dup) = instructions
            .iter()
            .find(|def| !names.insert(def.name.to_uppercase()))
        {
            return Err(AssemblerError::new(
                ErrorKind::DuplicateName,
                "All instruction names must be unique",
                dup.name.clone(),
            ));
        }

        let mut codes = HashSet::new();
        if let Some(dup) = instructions.iter().find(|def| !codes.insert(def.opcode)) {
            return Err(AssemblerError::new(
                ErrorKind::DuplicateOpcode,
                "All instruction codes must be unique",
                format!("{} {:02X}", dup.name, dup.opcode),
            ));
        }

        debug!("Instruction table built with {} entries", instructions.len());
        Ok(Self { instructions })
    }

    pub fn get(&self, name: &str) -> Option<&InstructionDef> {
        self.instructions
            .iter()
            .find(|def| def.name.eq_ignore_ascii_case(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &InstructionDef> {
        self.instructions.iter()
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Render the table in the same text form `parse_instruction_table` reads.
    pub fn to_text(&self) -> String {
        self.instructions
            .iter()
            .map(|def| format!("{} {:02X} {}", def.name, def.opcode, def.length.bytes()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for InstructionTable {
    fn default() -> Self {
        Self {
            instructions: vec![
                InstructionDef::new("JMP", 0x01, OperandLength::Four),
                InstructionDef::new("LOADR1", 0x02, OperandLength::Four),
                InstructionDef::new("LOADR2", 0x03, OperandLength::Four),
                InstructionDef::new("ADD", 0x04, OperandLength::Two),
                InstructionDef::new("SAVER1", 0x05, OperandLength::Four),
                InstructionDef::new("INT", 0x06, OperandLength::Two),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dto(name: &str, code: &str, length: &str) -> InstructionDto {
        InstructionDto::new(name, code, length)
    }

    #[test]
    fn test_default_table() {
        let table = InstructionTable::default();
        assert_eq!(table.len(), 6);
        let jmp = table.get("jmp").unwrap();
        assert_eq!(jmp.opcode, 1);
        assert_eq!(jmp.length, OperandLength::Four);
        assert_eq!(table.get("add").unwrap().length, OperandLength::Two);
    }

    #[test]
    fn test_opcode_parsed_as_hex() {
        let table = InstructionTable::from_dtos(&[dto("HALT", "3F", "1"), dto("MOV", "1a", "2")])
            .unwrap();
        assert_eq!(table.get("HALT").unwrap().opcode, 63);
        assert_eq!(table.get("MOV").unwrap().opcode, 0x1A);
    }

    #[test]
    fn test_duplicate_name_case_insensitive() {
        let err = InstructionTable::from_dtos(&[dto("JMP", "1", "4"), dto("jmp", "2", "4")])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateName);
    }

    #[test]
    fn test_duplicate_opcode() {
        let err = InstructionTable::from_dtos(&[dto("JMP", "1", "4"), dto("CALL", "01", "4")])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateOpcode);
    }

    #[test]
    fn test_invalid_definitions() {
        for bad in [
            dto("1JMP", "1", "4"),
            dto("JM_P", "1", "4"),
            dto("JMP", "40", "4"),
            dto("JMP", "zz", "4"),
            dto("JMP", "1", "3"),
            dto("JMP", "1", "0"),
        ] {
            let err = InstructionTable::from_dtos(&[bad]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInstruction);
        }
    }

    #[test]
    fn test_typed_definitions_checked() {
        let err = InstructionTable::from_defs(vec![
            InstructionDef::new("BIG", 64, OperandLength::One),
            InstructionDef::new("ZERO", 0, OperandLength::One),
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInstruction);
        assert_eq!(err.line(), "BIG 40 1");

        let bad_name = InstructionDef::new("NO-OP", 1, OperandLength::One);
        let err = InstructionTable::from_defs(vec![bad_name]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInstruction);

        let halt = InstructionDef::new("HALT", 63, OperandLength::One);
        let table = InstructionTable::from_defs(vec![halt]).unwrap();
        assert_eq!(table.get("halt").unwrap().opcode_byte(), 0xFC);
    }

    #[test]
    fn test_parse_table_text() {
        let dtos = parse_instruction_table("JMP 01 4\n\nADD 04 2\n").unwrap();
        assert_eq!(dtos, vec![dto("JMP", "01", "4"), dto("ADD", "04", "2")]);

        let err = parse_instruction_table("JMP 01").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedLine);
        assert_eq!(err.line(), "JMP 01");
    }

    #[test]
    fn test_text_round_trip() {
        let table = InstructionTable::default();
        let rows = parse_instruction_table(&table.to_text()).unwrap();
        let reparsed = InstructionTable::from_dtos(&rows).unwrap();
        assert_eq!(reparsed.iter().collect::<Vec<_>>(), table.iter().collect::<Vec<_>>());
    }
}
