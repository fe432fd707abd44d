pub mod types;
pub mod tokenizer;
pub mod instructions;
pub mod symbols;
pub mod classifier;
pub mod first_pass;
pub mod second_pass;
pub mod assembler;

pub use types::{
    AssemblerOptions, AssemblyState, ClassifiedLine, DirectiveKind, InstructionDef,
    InstructionDto, InstructionOperands, IntermediateLine, ObjectRecord, OperandLength,
    SymbolEntry, DEFAULT_MAX_LABEL_LEN, MAX_ADDRESS,
};

pub use assembler::{Assembly, SicAssembler};
pub use classifier::{classify_intermediate, LineClassifier};
pub use first_pass::FirstPassOutput;
pub use instructions::{parse_instruction_table, InstructionTable};
pub use symbols::SymbolTable;
pub use tokenizer::tokenize;

pub use sicasm_common::{AssemblerError, Diagnostic, ErrorKind};

// Re-export for convenience
pub fn assemble(source: &str) -> Result<Assembly, AssemblerError> {
    let mut assembler = SicAssembler::new(AssemblerOptions::default());
    assembler.assemble(source)
}
