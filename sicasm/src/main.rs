use clap::{Parser, Subcommand};
use sicasm::{
    parse_instruction_table, AssemblerError, AssemblerOptions, Diagnostic, DirectiveKind,
    SicAssembler,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "sicasm")]
#[command(about = "SIC/XE two-pass assembler")]
#[command(version)]
struct Cli {
    /// Show instruction and directive reference
    #[arg(short, long)]
    reference: bool,

    /// Instruction table file (`NAME CODE LENGTH` per line, hex values)
    #[arg(short, long, global = true)]
    table: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble a source file into object records
    Assemble {
        /// Input assembly file
        input: PathBuf,

        /// Output object file (defaults to <input>.obj or <input>.json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Also write the first-pass listing to this file
        #[arg(long)]
        intermediate: Option<PathBuf>,

        /// Print the symbol table
        #[arg(long)]
        symbols: bool,
    },

    /// Validate an assembly file
    Check {
        /// Input assembly file
        input: PathBuf,
    },
}

fn load_assembler(table: Option<&Path>) -> Result<SicAssembler, Box<dyn std::error::Error>> {
    let mut assembler = SicAssembler::new(AssemblerOptions::default());
    if let Some(path) = table {
        let text = fs::read_to_string(path)?;
        let definitions = parse_instruction_table(&text).unwrap_or_else(|e| fail(&e));
        assembler
            .set_instructions(&definitions)
            .unwrap_or_else(|e| fail(&e));
    }
    Ok(assembler)
}

fn fail(err: &AssemblerError) -> ! {
    eprintln!("{}", Diagnostic::from(err));
    std::process::exit(1);
}

fn print_reference(assembler: &SicAssembler) {
    println!("SIC/XE ASSEMBLER REFERENCE");
    println!("==========================\n");

    println!("INSTRUCTIONS");
    println!("------------");
    println!("{:<10} {:<6} {}", "NAME", "CODE", "LENGTH");
    for def in assembler.instructions().iter() {
        println!("{:<10} {:<6} {}", def.name, format!("{:02X}", def.opcode), def.length.bytes());
    }
    println!();

    println!("DIRECTIVES");
    println!("----------");
    for directive in DirectiveKind::ALL {
        let usage = match directive {
            DirectiveKind::Start => "label START addr   # Program start (decimal address)",
            DirectiveKind::End => "END [addr]         # Program end, optional entry point",
            DirectiveKind::Word => "WORD n             # 3-byte value (1-16777215)",
            DirectiveKind::Byte => "BYTE n|C\"..\"|X\"..\" # Byte value or string",
            DirectiveKind::Resb => "RESB n             # Reserve n bytes (1-255)",
            DirectiveKind::Resw => "RESW n             # Reserve n words (1-255)",
        };
        println!("{}", usage);
    }
    println!();

    println!("OPERANDS");
    println!("--------");
    println!("R1..R16              # Registers (length-2 instructions)");
    println!("0..255               # Byte value (length-2 instructions)");
    println!("label | 0..16777215  # Address (length-4 instructions)");
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::init();
    }

    let mut assembler = load_assembler(cli.table.as_deref())?;

    if cli.reference {
        print_reference(&assembler);
        return Ok(());
    }

    let command = cli.command.ok_or("No command provided. Use --help for usage information.")?;

    match command {
        Commands::Assemble {
            input,
            output,
            format,
            intermediate,
            symbols,
        } => {
            let source = fs::read_to_string(&input)?;
            let assembly = assembler.assemble(&source).unwrap_or_else(|e| fail(&e));

            let (contents, extension) = match format.as_str() {
                "text" => (assembly.object_text() + "\n", "obj"),
                "json" => (serde_json::to_string_pretty(&assembly)?, "json"),
                _ => {
                    eprintln!("Unknown format: {}", format);
                    std::process::exit(1);
                }
            };

            let output_path = output.unwrap_or_else(|| input.with_extension(extension));
            fs::write(&output_path, contents)?;
            println!("✓ Assembled to {}", output_path.display());

            if let Some(path) = intermediate {
                fs::write(&path, assembly.intermediate_text() + "\n")?;
                println!("✓ Intermediate listing written to {}", path.display());
            }

            println!("  Records: {}", assembly.records.len());
            println!("  Labels: {}", assembly.symbols.len());
            println!("  Program length: {:06X}", assembler.state().program_length());

            if symbols {
                println!("\nSymbol table:");
                for (name, address) in assembler.symbols_for_display() {
                    println!("  {} {}", name, address);
                }
            }
        }

        Commands::Check { input } => {
            let source = fs::read_to_string(&input)?;
            match assembler.assemble(&source) {
                Ok(assembly) => {
                    println!("✓ {} is valid", input.display());
                    println!("  Intermediate lines: {}", assembly.intermediate.len());
                    println!("  Labels: {}", assembly.symbols.len());
                    println!("  Program length: {:06X}", assembler.state().program_length());
                }
                Err(err) => {
                    eprintln!("✗ {} has errors:", input.display());
                    fail(&err);
                }
            }
        }
    }

    Ok(())
}
