use crate::first_pass::{self, FirstPassOutput};
use crate::instructions::InstructionTable;
use crate::second_pass;
use crate::symbols::SymbolTable;
use crate::tokenizer::tokenize;
use crate::types::*;
use log::info;
use serde::{Deserialize, Serialize};
use sicasm_common::AssemblerError;

/// Everything one successful run produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assembly {
    pub intermediate: Vec<IntermediateLine>,
    pub symbols: Vec<SymbolEntry>,
    pub records: Vec<ObjectRecord>,
}

impl Assembly {
    pub fn intermediate_text(&self) -> String {
        join_lines(&self.intermediate)
    }

    pub fn object_text(&self) -> String {
        join_lines(&self.records)
    }
}

fn join_lines<T: ToString>(items: &[T]) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Two-pass assembler holding the instruction table, the symbol table and the
/// state of the last first pass.
pub struct SicAssembler {
    instructions: InstructionTable,
    symbols: SymbolTable,
    options: AssemblerOptions,
    state: AssemblyState,
}

impl SicAssembler {
    pub fn new(options: AssemblerOptions) -> Self {
        Self {
            instructions: InstructionTable::default(),
            symbols: SymbolTable::new(),
            options,
            state: AssemblyState::default(),
        }
    }

    /// Replace the instruction table. On error the current table is kept.
    pub fn set_instructions(
        &mut self,
        definitions: &[InstructionDto],
    ) -> Result<(), AssemblerError> {
        self.instructions = InstructionTable::from_dtos(definitions)?;
        info!("Instruction table replaced ({} entries)", self.instructions.len());
        Ok(())
    }

    pub fn reset_instructions(&mut self) {
        self.instructions = InstructionTable::default();
    }

    pub fn instructions(&self) -> &InstructionTable {
        &self.instructions
    }

    /// Run pass one. The symbol table and state are replaced only when the
    /// pass succeeds.
    pub fn first_pass(
        &mut self,
        lines: &[Vec<String>],
    ) -> Result<Vec<IntermediateLine>, AssemblerError> {
        let mut symbols = if self.options.clear_symbols_on_first_pass {
            SymbolTable::new()
        } else {
            self.symbols.clone()
        };
        let FirstPassOutput { lines, state } =
            first_pass::run(&self.instructions, &mut symbols, &self.options, lines)?;
        self.symbols = symbols;
        self.state = state;
        Ok(lines)
    }

    /// Encode tokenized intermediate lines using the symbol table and
    /// addresses left by the last successful first pass.
    pub fn second_pass(&self, lines: &[Vec<String>]) -> Result<Vec<ObjectRecord>, AssemblerError> {
        second_pass::run(lines, &self.symbols, &self.state)
    }

    pub fn reset_symbol_table(&mut self) {
        self.symbols.clear();
    }

    pub fn symbol_table(&self) -> &SymbolTable {
        &self.symbols
    }

    /// `(name, address as six hex digits)` pairs
    pub fn symbols_for_display(&self) -> Vec<(String, String)> {
        self.symbols.to_display_pairs()
    }

    pub fn state(&self) -> &AssemblyState {
        &self.state
    }

    /// Full pipeline: tokenize, first pass, re-tokenize the listing, second pass.
    pub fn assemble(&mut self, source: &str) -> Result<Assembly, AssemblerError> {
        let intermediate = self.first_pass(&tokenize(source))?;
        let listing = join_lines(&intermediate);
        let records = self.second_pass(&tokenize(&listing))?;

        Ok(Assembly {
            intermediate,
            symbols: self.symbols.entries().to_vec(),
            records,
        })
    }
}

impl Default for SicAssembler {
    fn default() -> Self {
        Self::new(AssemblerOptions::default())
    }
}
