//! Second pass: turns the intermediate listing into object records, resolving
//! symbolic operands against the finished symbol table.

use crate::classifier::classify_intermediate;
use crate::first_pass::{char_literal, hex_literal};
use crate::symbols::SymbolTable;
use crate::tokenizer::join_tokens;
use crate::types::{register_number, AssemblyState, ClassifiedLine, DirectiveKind, ObjectRecord};
use log::{debug, info};
use sicasm_common::{AssemblerError, ErrorKind};

const MODE_IMMEDIATE: u8 = 0;
const MODE_DIRECT: u8 = 1;

/// Run the second pass over the re-tokenized intermediate lines.
///
/// The first line must be the START line; it becomes the header record.
pub fn run(
    lines: &[Vec<String>],
    symbols: &SymbolTable,
    state: &AssemblyState,
) -> Result<Vec<ObjectRecord>, AssemblerError> {
    let (first, rest) = lines.split_first().ok_or_else(|| {
        AssemblerError::new(ErrorKind::EmptyProgram, "No intermediate lines to assemble", "")
    })?;

    let header = classify_intermediate(first)?;
    let mut records = Vec::with_capacity(lines.len() + 1);
    records.push(ObjectRecord::Header {
        name: header.label.unwrap_or_default(),
        start: state.start_address,
        length: state.program_length(),
    });

    for tokens in rest {
        let text = join_tokens(tokens);
        let line = classify_intermediate(tokens)?;
        let record = encode_line(&line, symbols, &text)?;
        debug!("{} -> {}", text, record);
        records.push(record);
    }

    if state.end_address < state.start_address || state.end_address > state.location_counter {
        return Err(AssemblerError::new(
            ErrorKind::InvalidEntryPoint,
            format!("Invalid program entry point {:06X}", state.end_address),
            "",
        ));
    }
    records.push(ObjectRecord::End {
        address: state.end_address,
    });

    info!("Second pass: {} object records", records.len());
    Ok(records)
}

fn encode_line(
    line: &ClassifiedLine,
    symbols: &SymbolTable,
    text: &str,
) -> Result<ObjectRecord, AssemblerError> {
    let label = line.label.clone().unwrap_or_default();
    let text_record = |length: usize, payload: String| ObjectRecord::Text {
        label: label.clone(),
        length: length as u32,
        payload,
    };

    match DirectiveKind::from_str(&line.mnemonic) {
        Some(DirectiveKind::Word) => {
            let operand = required_operand(line, text)?;
            Ok(text_record(3, operand.to_string()))
        }
        Some(DirectiveKind::Byte) => {
            let operand = required_operand(line, text)?;
            if let Some(value) = parse_hex_byte(operand) {
                Ok(text_record(1, format!("{:02X}", value)))
            } else if let Some(chars) = char_literal(operand) {
                let payload: String = chars.bytes().map(|b| format!("{:02X}", b)).collect();
                Ok(text_record(chars.len(), payload))
            } else if let Some(digits) = hex_literal(operand) {
                Ok(text_record(digits.len(), digits.to_string()))
            } else {
                Err(AssemblerError::invalid_operand(
                    "Cannot convert operand to a byte string",
                    text,
                ))
            }
        }
        Some(kind @ (DirectiveKind::Resb | DirectiveKind::Resw)) => {
            let operand = required_operand(line, text)?;
            // The first pass writes counts as two hex digits, 01..FF.
            let count = u8::from_str_radix(operand, 16)
                .ok()
                .filter(|&count| count != 0)
                .ok_or_else(|| {
                    AssemblerError::invalid_operand("Reserve count must be between 01 and FF", text)
                })?;
            let count = u32::from(count);
            let length = if kind == DirectiveKind::Resw { count * 3 } else { count };
            Ok(ObjectRecord::Reserve { label, length })
        }
        _ => encode_instruction(line, symbols, text, label),
    }
}

fn encode_instruction(
    line: &ClassifiedLine,
    symbols: &SymbolTable,
    text: &str,
    label: String,
) -> Result<ObjectRecord, AssemblerError> {
    let opcode = &line.mnemonic;
    let opcode_byte = u8::from_str_radix(opcode, 16).map_err(|_| {
        AssemblerError::new(ErrorKind::UnknownMnemonic, "Unknown instruction code", text)
    })?;

    let (length, payload) = match opcode_byte & 0x03 {
        MODE_IMMEDIATE => match (&line.operand1, &line.operand2) {
            (None, None) => (1, opcode.clone()),
            (Some(r1), Some(r2)) => {
                let (r1, r2) = register_number(r1)
                    .zip(register_number(r2))
                    .ok_or_else(|| {
                        AssemblerError::invalid_operand("Expected two registers", text)
                    })?;
                (2, format!("{}{:X}{:X}", opcode, r1, r2))
            }
            (Some(operand), None) => (operand.len() / 2, format!("{}{}", opcode, operand)),
            (None, Some(_)) => {
                return Err(AssemblerError::malformed("First operand is empty", text));
            }
        },
        MODE_DIRECT => {
            let name = required_operand(line, text)?;
            let symbol = symbols.get(name).ok_or_else(|| {
                AssemblerError::new(
                    ErrorKind::UndefinedSymbol,
                    "Label not found in the symbol table",
                    text,
                )
            })?;
            (4, format!("{}{:06X}", opcode, symbol.address))
        }
        _ => {
            return Err(AssemblerError::new(
                ErrorKind::UnknownAddressingMode,
                "Unknown addressing mode",
                text,
            ));
        }
    };

    Ok(ObjectRecord::Text {
        label,
        length: length as u32,
        payload,
    })
}

fn required_operand<'l>(line: &'l ClassifiedLine, text: &str) -> Result<&'l str, AssemblerError> {
    line.operand1
        .as_deref()
        .ok_or_else(|| AssemblerError::malformed("First operand is empty", text))
}

/// One or two hex digits, as written by the first pass for `BYTE n`.
fn parse_hex_byte(token: &str) -> Option<u8> {
    if token.is_empty() || token.len() > 2 || !token.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u8::from_str_radix(token, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tokenize;

    fn state(start: u32, end: u32, lc: u32) -> AssemblyState {
        AssemblyState {
            location_counter: lc,
            start_address: start,
            end_address: end,
            start_seen: true,
            end_seen: true,
        }
    }

    fn encode(
        listing: &str,
        symbols: &SymbolTable,
        state: &AssemblyState,
    ) -> Result<Vec<String>, AssemblerError> {
        run(&tokenize(listing), symbols, state)
            .map(|records| records.iter().map(|r| r.to_string()).collect())
    }

    #[test]
    fn test_symbol_resolution() {
        let mut symbols = SymbolTable::new();
        symbols.insert("L1", 0x107);
        let records = encode(
            "PROG START 000100\n000100 WORD 000040\n000103 05 l1\n000107 10 R1 R16",
            &symbols,
            &state(0x100, 0x100, 0x109),
        )
        .unwrap();

        assert_eq!(
            records,
            vec![
                "H PROG 000100 000009",
                "T 000100 03 000040",
                "T 000103 04 05000107",
                "T 000107 02 10110",
                "E 000100",
            ]
        );
    }

    #[test]
    fn test_byte_and_reserve_records() {
        let listing = r#"P START 000010
000010 BYTE FF
000011 BYTE C"HI"
000013 BYTE X"0A1B"
000017 RESB 02
000019 RESW 02"#;
        let records = encode(listing, &SymbolTable::new(), &state(0x10, 0x10, 0x1F)).unwrap();
        assert_eq!(
            records,
            vec![
                "H P 000010 00000F",
                "T 000010 01 FF",
                "T 000011 02 4849",
                "T 000013 04 0A1B",
                "T 000017 02",
                "T 000019 06",
                "E 000010",
            ]
        );
    }

    #[test]
    fn test_immediate_operands() {
        let listing = "P START 000010\n000010 18 21\n000012 08 001000\n000016 FC";
        let records = encode(listing, &SymbolTable::new(), &state(0x10, 0x10, 0x17)).unwrap();
        assert_eq!(records[1], "T 000010 01 1821");
        assert_eq!(records[2], "T 000012 03 08001000");
        assert_eq!(records[3], "T 000016 01 FC");
    }

    #[test]
    fn test_undefined_symbol() {
        let listing = "P START 000010\n000010 05 NOWHERE";
        let err = encode(listing, &SymbolTable::new(), &state(0x10, 0x10, 0x14)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UndefinedSymbol);
        assert_eq!(err.line(), "000010 05 NOWHERE");
    }

    #[test]
    fn test_unknown_addressing_mode() {
        let listing = "P START 000010\n000010 06 X";
        let err = encode(listing, &SymbolTable::new(), &state(0x10, 0x10, 0x14)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownAddressingMode);
    }

    #[test]
    fn test_unknown_opcode_text() {
        let listing = "P START 000010\n000010 ZZ";
        let err = encode(listing, &SymbolTable::new(), &state(0x10, 0x10, 0x11)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownMnemonic);
    }

    #[test]
    fn test_entry_point_bounds() {
        let listing = "P START 000010\n000010 WORD 000001";
        let err = encode(listing, &SymbolTable::new(), &state(0x10, 0x0F, 0x13)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidEntryPoint);
        let err = encode(listing, &SymbolTable::new(), &state(0x10, 0x14, 0x13)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidEntryPoint);

        let records = encode(listing, &SymbolTable::new(), &state(0x10, 0x13, 0x13)).unwrap();
        assert_eq!(records.last().unwrap(), "E 000013");
    }

    #[test]
    fn test_reserve_count_out_of_range() {
        let st = state(0x10, 0x10, 0x13);
        for listing in [
            "P START 000010\n000010 RESW FFFFFFFF",
            "P START 000010\n000010 RESB 100",
            "P START 000010\n000010 RESB 00",
            "P START 000010\n000010 RESW ZZ",
        ] {
            let err = encode(listing, &SymbolTable::new(), &st).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidOperand);
        }

        let records = encode("P START 000010\n000010 RESW FF", &SymbolTable::new(), &st).unwrap();
        assert_eq!(records[1], "T 000010 2FD");
    }

    #[test]
    fn test_empty_listing() {
        let err = run(&[], &SymbolTable::new(), &AssemblyState::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyProgram);
    }
}
