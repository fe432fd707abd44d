//! First pass: assigns addresses, fills the symbol table and produces the
//! intermediate listing.
//!
//! The pass is fail-fast. On error nothing is returned except the error, so a
//! caller never sees a half-built listing.

use crate::classifier::LineClassifier;
use crate::instructions::InstructionTable;
use crate::symbols::SymbolTable;
use crate::tokenizer::join_tokens;
use crate::types::*;
use log::{debug, info, warn};
use sicasm_common::{AssemblerError, ErrorKind};

#[derive(Debug, Clone)]
pub struct FirstPassOutput {
    pub lines: Vec<IntermediateLine>,
    pub state: AssemblyState,
}

impl FirstPassOutput {
    /// The listing as text, one line per intermediate line
    pub fn to_text(&self) -> String {
        self.lines
            .iter()
            .map(|line| line.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Run the first pass over tokenized source lines.
///
/// Labels are appended to `symbols`; the caller decides whether it starts
/// empty.
pub fn run(
    table: &InstructionTable,
    symbols: &mut SymbolTable,
    options: &AssemblerOptions,
    source: &[Vec<String>],
) -> Result<FirstPassOutput, AssemblerError> {
    let mut pass = FirstPass {
        classifier: LineClassifier::new(table, options.max_label_len),
        table,
        symbols,
        max_address: options.max_address,
        state: AssemblyState::default(),
        lines: Vec::new(),
    };

    for (index, tokens) in source.iter().enumerate() {
        let text = join_tokens(tokens);

        if !pass.state.start_seen && pass.state.location_counter != 0 {
            return Err(AssemblerError::new(
                ErrorKind::MissingStart,
                "START directive not found at the beginning of the program",
                text,
            ));
        }

        if pass.state.start_seen {
            pass.check_bound(pass.state.location_counter, &text)?;
        }

        if pass.state.end_seen {
            warn!("{} line(s) after END ignored", source.len() - index);
            break;
        }

        pass.process_line(tokens, &text)?;
    }

    if !pass.state.end_seen {
        return Err(AssemblerError::new(
            ErrorKind::MissingEntryPoint,
            "Program entry point not found (missing END)",
            "",
        ));
    }

    info!(
        "First pass: {} intermediate lines, {} symbols, program length {:06X}",
        pass.lines.len(),
        pass.symbols.len(),
        pass.state.program_length()
    );

    Ok(FirstPassOutput {
        lines: pass.lines,
        state: pass.state,
    })
}

struct FirstPass<'a> {
    classifier: LineClassifier<'a>,
    table: &'a InstructionTable,
    symbols: &'a mut SymbolTable,
    max_address: u32,
    state: AssemblyState,
    lines: Vec<IntermediateLine>,
}

impl<'a> FirstPass<'a> {
    fn process_line(&mut self, tokens: &[String], text: &str) -> Result<(), AssemblerError> {
        let line = self.classifier.classify(tokens)?;

        if let Some(label) = &line.label {
            if self.symbols.contains(label) {
                return Err(AssemblerError::new(
                    ErrorKind::DuplicateLabel,
                    "Label is already defined in the symbol table",
                    text,
                ));
            }
            if self.state.start_seen {
                self.symbols.insert(label, self.state.location_counter);
            }
        }

        let table = self.table;
        let emitted = if let Some(directive) = DirectiveKind::from_str(&line.mnemonic) {
            self.directive(directive, &line, text)?
        } else if let Some(def) = table.get(&line.mnemonic) {
            Some(self.instruction(def, &line, text)?)
        } else {
            return Err(AssemblerError::new(
                ErrorKind::UnknownMnemonic,
                "Unknown instruction",
                text,
            ));
        };

        if let Some(emitted) = emitted {
            debug!("{:06X}: {}", emitted.address(), emitted);
            self.lines.push(emitted);
        }
        Ok(())
    }

    fn check_bound(&self, address: u32, text: &str) -> Result<(), AssemblerError> {
        if address > self.max_address {
            return Err(AssemblerError::overflow(text));
        }
        Ok(())
    }

    /// Reserve `size` bytes at the location counter and return their address.
    fn allocate(&mut self, size: usize, text: &str) -> Result<u32, AssemblerError> {
        let address = self.state.location_counter;
        let end = u32::try_from(size)
            .ok()
            .and_then(|size| address.checked_add(size))
            .ok_or_else(|| AssemblerError::overflow(text))?;
        self.check_bound(end, text)?;
        self.state.location_counter = end;
        Ok(address)
    }

    fn directive(
        &mut self,
        directive: DirectiveKind,
        line: &ClassifiedLine,
        text: &str,
    ) -> Result<Option<IntermediateLine>, AssemblerError> {
        match directive {
            DirectiveKind::Start => self.start(line, text).map(Some),
            DirectiveKind::End => {
                self.end(line, text)?;
                Ok(None)
            }
            DirectiveKind::Word => {
                let operand = single_operand(line, text)?;
                let value = parse_decimal(operand)
                    .ok_or_else(|| {
                        AssemblerError::invalid_operand("Operand is not a number", text)
                    })?;
                if value < 1 || value > MAX_ADDRESS as i64 {
                    return Err(AssemblerError::invalid_operand(
                        format!("Operand out of range (1-{})", MAX_ADDRESS),
                        text,
                    ));
                }
                let address = self.allocate(3, text)?;
                Ok(Some(IntermediateLine::Word {
                    address,
                    value: value as u32,
                }))
            }
            DirectiveKind::Byte => {
                let operand = single_operand(line, text)?;
                self.byte(operand, text).map(Some)
            }
            DirectiveKind::Resw | DirectiveKind::Resb => {
                let operand = single_operand(line, text)?;
                let count = parse_decimal(operand)
                    .ok_or_else(|| {
                        AssemblerError::invalid_operand("Operand is not a number", text)
                    })?;
                if !(1..=255).contains(&count) {
                    return Err(AssemblerError::invalid_operand(
                        "Operand out of range (1-255)",
                        text,
                    ));
                }
                let count = count as u8;
                if directive == DirectiveKind::Resw {
                    let address = self.allocate(3 * count as usize, text)?;
                    Ok(Some(IntermediateLine::Resw { address, count }))
                } else {
                    let address = self.allocate(count as usize, text)?;
                    Ok(Some(IntermediateLine::Resb { address, count }))
                }
            }
        }
    }

    fn start(
        &mut self,
        line: &ClassifiedLine,
        text: &str,
    ) -> Result<IntermediateLine, AssemblerError> {
        let operand = single_operand(line, text)?;

        if self.state.location_counter != 0 || self.state.start_seen {
            return Err(AssemblerError::new(
                ErrorKind::DuplicateStart,
                "START must appear once, at the beginning of the source",
                text,
            ));
        }

        let address = parse_decimal(operand).ok_or_else(|| {
            AssemblerError::invalid_operand("Cannot convert operand to a start address", text)
        })?;
        if address < 0 || address > self.max_address as i64 {
            return Err(AssemblerError::overflow(text));
        }
        if address == 0 {
            return Err(AssemblerError::invalid_operand(
                "Program start address cannot be zero",
                text,
            ));
        }
        let label = line.label.clone().ok_or_else(|| {
            AssemblerError::malformed("START directive must be preceded by a label", text)
        })?;

        let address = address as u32;
        self.state.start_seen = true;
        self.state.start_address = address;
        self.state.location_counter = address;

        Ok(IntermediateLine::Start { label, address })
    }

    fn end(&mut self, line: &ClassifiedLine, text: &str) -> Result<(), AssemblerError> {
        if line.operand2.is_some() {
            return Err(AssemblerError::operand_count(
                "Expected at most one operand",
                text,
            ));
        }
        if !self.state.start_seen {
            return Err(AssemblerError::new(
                ErrorKind::MissingEntryPoint,
                "END found without a preceding START",
                text,
            ));
        }

        self.state.end_address = match &line.operand1 {
            None => self.state.start_address,
            Some(operand) => {
                let address = parse_decimal(operand).ok_or_else(|| {
                    AssemblerError::invalid_operand(
                        "Cannot convert operand to an entry address",
                        text,
                    )
                })?;
                if address < 0 || address > self.max_address as i64 {
                    return Err(AssemblerError::invalid_operand(
                        format!("Operand out of range (0-{})", self.max_address),
                        text,
                    ));
                }
                address as u32
            }
        };
        self.state.end_seen = true;
        Ok(())
    }

    fn byte(&mut self, operand: &str, text: &str) -> Result<IntermediateLine, AssemblerError> {
        if let Some(value) = parse_decimal(operand) {
            if !(0..=255).contains(&value) {
                return Err(AssemblerError::invalid_operand(
                    "Operand out of range (0-255)",
                    text,
                ));
            }
            let address = self.allocate(1, text)?;
            return Ok(IntermediateLine::ByteValue {
                address,
                value: value as u8,
            });
        }

        if let Some(symbols) = char_literal(operand) {
            let address = self.allocate(symbols.len(), text)?;
            return Ok(IntermediateLine::ByteLiteral {
                address,
                literal: operand.to_string(),
            });
        }

        // Advances by hex-digit count, not by decoded byte count.
        if let Some(digits) = hex_literal(operand) {
            let address = self.allocate(digits.len(), text)?;
            return Ok(IntermediateLine::ByteLiteral {
                address,
                literal: operand.to_uppercase(),
            });
        }

        Err(AssemblerError::invalid_operand(
            "Operand is neither a byte value nor a character or hex string",
            text,
        ))
    }

    fn instruction(
        &mut self,
        def: &InstructionDef,
        line: &ClassifiedLine,
        text: &str,
    ) -> Result<IntermediateLine, AssemblerError> {
        let opcode_byte = def.opcode_byte();

        match def.length {
            OperandLength::One => {
                if line.operand_count() != 0 {
                    return Err(AssemblerError::operand_count("Expected no operands", text));
                }
                let address = self.allocate(1, text)?;
                Ok(IntermediateLine::Instruction {
                    address,
                    opcode_byte,
                    operands: InstructionOperands::None,
                })
            }
            OperandLength::Two => match (&line.operand1, &line.operand2) {
                (None, _) => Err(AssemblerError::operand_count(
                    "Expected at least one operand",
                    text,
                )),
                (Some(r1), Some(r2)) => {
                    if !is_register(r1) || !is_register(r2) {
                        return Err(AssemblerError::invalid_operand(
                            "Expected two registers",
                            text,
                        ));
                    }
                    let address = self.allocate(2, text)?;
                    Ok(IntermediateLine::Instruction {
                        address,
                        opcode_byte,
                        operands: InstructionOperands::Registers(r1.clone(), r2.clone()),
                    })
                }
                (Some(operand), None) => {
                    let value = parse_decimal(operand).ok_or_else(|| {
                        AssemblerError::invalid_operand("Operand is not a number", text)
                    })?;
                    if !(0..=255).contains(&value) {
                        return Err(AssemblerError::invalid_operand(
                            "Operand out of range (0-255)",
                            text,
                        ));
                    }
                    let address = self.allocate(2, text)?;
                    Ok(IntermediateLine::Instruction {
                        address,
                        opcode_byte,
                        operands: InstructionOperands::Byte(value as u8),
                    })
                }
            },
            OperandLength::Four => {
                let operand = single_operand(line, text)?;

                if self.classifier.is_label(operand) {
                    let address = self.allocate(4, text)?;
                    return Ok(IntermediateLine::Instruction {
                        address,
                        opcode_byte: opcode_byte | 0x01,
                        operands: InstructionOperands::Symbol(operand.to_string()),
                    });
                }

                match parse_decimal(operand) {
                    Some(value) if (0..=MAX_ADDRESS as i64).contains(&value) => {
                        let address = self.allocate(4, text)?;
                        Ok(IntermediateLine::Instruction {
                            address,
                            opcode_byte,
                            operands: InstructionOperands::Address(value as u32),
                        })
                    }
                    _ => Err(AssemblerError::invalid_operand("Invalid operand value", text)),
                }
            }
        }
    }
}

fn single_operand<'l>(line: &'l ClassifiedLine, text: &str) -> Result<&'l str, AssemblerError> {
    match (&line.operand1, &line.operand2) {
        (Some(operand), None) => Ok(operand.as_str()),
        (None, _) => Err(AssemblerError::operand_count(
            "Expected one operand, found none",
            text,
        )),
        (Some(_), Some(_)) => Err(AssemblerError::operand_count(
            "Expected one operand, found two",
            text,
        )),
    }
}

/// Optionally signed decimal integer.
pub(crate) fn parse_decimal(token: &str) -> Option<i64> {
    token.parse::<i64>().ok()
}

fn has_prefix(token: &str, prefix: char) -> bool {
    let mut chars = token.chars();
    matches!(chars.next(), Some(c) if c.eq_ignore_ascii_case(&prefix)) && chars.next() == Some('"')
}

/// Contents of a `C"..."` literal: at least one ASCII character.
pub(crate) fn char_literal(token: &str) -> Option<&str> {
    if token.len() < 4 || !has_prefix(token, 'C') || !token.ends_with('"') || !token.is_ascii() {
        return None;
    }
    Some(&token[2..token.len() - 1])
}

/// Digits of an `X"..."` literal: a non-empty, even-length run of hex digits.
pub(crate) fn hex_literal(token: &str) -> Option<&str> {
    if token.len() < 3 || !has_prefix(token, 'X') || !token.ends_with('"') {
        return None;
    }
    let digits = &token[2..token.len() - 1];
    let valid = !digits.is_empty()
        && digits.len() % 2 == 0
        && digits.chars().all(|c| c.is_ascii_hexdigit());
    valid.then_some(digits)
}
