//! Error handling for the SIC/XE assembler
//!
//! Every failure in the pipeline is a recoverable input error. The first one
//! encountered aborts the running pass, so a single `AssemblerError` is all a
//! caller ever receives.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Main assembler error type covering table setup and both passes.
///
/// `line` holds the offending source (or intermediate) line with its tokens
/// joined by single spaces. It is empty when the error is not tied to a line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssemblerError {
    #[error("{}", with_line(.message, .line))]
    MalformedLine { message: String, line: String },

    #[error("{}", with_line(.message, .line))]
    DuplicateLabel { message: String, line: String },

    #[error("{}", with_line(.message, .line))]
    DuplicateName { message: String, line: String },

    #[error("{}", with_line(.message, .line))]
    DuplicateOpcode { message: String, line: String },

    #[error("{}", with_line(.message, .line))]
    InvalidInstruction { message: String, line: String },

    #[error("{}", with_line(.message, .line))]
    MissingStart { message: String, line: String },

    #[error("{}", with_line(.message, .line))]
    DuplicateStart { message: String, line: String },

    #[error("{}", with_line(.message, .line))]
    MissingEntryPoint { message: String, line: String },

    #[error("{}", with_line(.message, .line))]
    InvalidEntryPoint { message: String, line: String },

    #[error("{}", with_line(.message, .line))]
    OperandCountMismatch { message: String, line: String },

    #[error("{}", with_line(.message, .line))]
    InvalidOperand { message: String, line: String },

    #[error("{}", with_line(.message, .line))]
    MemoryOverflow { message: String, line: String },

    #[error("{}", with_line(.message, .line))]
    UndefinedSymbol { message: String, line: String },

    #[error("{}", with_line(.message, .line))]
    UnknownAddressingMode { message: String, line: String },

    #[error("{}", with_line(.message, .line))]
    UnknownMnemonic { message: String, line: String },

    #[error("{}", with_line(.message, .line))]
    EmptyProgram { message: String, line: String },
}

fn with_line(message: &str, line: &str) -> String {
    if line.is_empty() {
        message.to_string()
    } else {
        format!("{}: {}", message, line)
    }
}

/// Field-less discriminant of [`AssemblerError`], handy for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    MalformedLine,
    DuplicateLabel,
    DuplicateName,
    DuplicateOpcode,
    InvalidInstruction,
    MissingStart,
    DuplicateStart,
    MissingEntryPoint,
    InvalidEntryPoint,
    OperandCountMismatch,
    InvalidOperand,
    MemoryOverflow,
    UndefinedSymbol,
    UnknownAddressingMode,
    UnknownMnemonic,
    EmptyProgram,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl AssemblerError {
    /// Build an error of the given kind
    pub fn new(kind: ErrorKind, message: impl Into<String>, line: impl Into<String>) -> Self {
        let message = message.into();
        let line = line.into();
        match kind {
            ErrorKind::MalformedLine => AssemblerError::MalformedLine { message, line },
            ErrorKind::DuplicateLabel => AssemblerError::DuplicateLabel { message, line },
            ErrorKind::DuplicateName => AssemblerError::DuplicateName { message, line },
            ErrorKind::DuplicateOpcode => AssemblerError::DuplicateOpcode { message, line },
            ErrorKind::InvalidInstruction => AssemblerError::InvalidInstruction { message, line },
            ErrorKind::MissingStart => AssemblerError::MissingStart { message, line },
            ErrorKind::DuplicateStart => AssemblerError::DuplicateStart { message, line },
            ErrorKind::MissingEntryPoint => AssemblerError::MissingEntryPoint { message, line },
            ErrorKind::InvalidEntryPoint => AssemblerError::InvalidEntryPoint { message, line },
            ErrorKind::OperandCountMismatch => {
                AssemblerError::OperandCountMismatch { message, line }
            }
            ErrorKind::InvalidOperand => AssemblerError::InvalidOperand { message, line },
            ErrorKind::MemoryOverflow => AssemblerError::MemoryOverflow { message, line },
            ErrorKind::UndefinedSymbol => AssemblerError::UndefinedSymbol { message, line },
            ErrorKind::UnknownAddressingMode => {
                AssemblerError::UnknownAddressingMode { message, line }
            }
            ErrorKind::UnknownMnemonic => AssemblerError::UnknownMnemonic { message, line },
            ErrorKind::EmptyProgram => AssemblerError::EmptyProgram { message, line },
        }
    }

    /// Create a malformed line error
    pub fn malformed(message: impl Into<String>, line: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedLine, message, line)
    }

    /// Create an invalid operand error
    pub fn invalid_operand(message: impl Into<String>, line: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidOperand, message, line)
    }

    /// Create an operand count error
    pub fn operand_count(message: impl Into<String>, line: impl Into<String>) -> Self {
        Self::new(ErrorKind::OperandCountMismatch, message, line)
    }

    /// Create a memory overflow error
    pub fn overflow(line: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::MemoryOverflow,
            "Allocated memory overflow",
            line,
        )
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AssemblerError::MalformedLine { .. } => ErrorKind::MalformedLine,
            AssemblerError::DuplicateLabel { .. } => ErrorKind::DuplicateLabel,
            AssemblerError::DuplicateName { .. } => ErrorKind::DuplicateName,
            AssemblerError::DuplicateOpcode { .. } => ErrorKind::DuplicateOpcode,
            AssemblerError::InvalidInstruction { .. } => ErrorKind::InvalidInstruction,
            AssemblerError::MissingStart { .. } => ErrorKind::MissingStart,
            AssemblerError::DuplicateStart { .. } => ErrorKind::DuplicateStart,
            AssemblerError::MissingEntryPoint { .. } => ErrorKind::MissingEntryPoint,
            AssemblerError::InvalidEntryPoint { .. } => ErrorKind::InvalidEntryPoint,
            AssemblerError::OperandCountMismatch { .. } => ErrorKind::OperandCountMismatch,
            AssemblerError::InvalidOperand { .. } => ErrorKind::InvalidOperand,
            AssemblerError::MemoryOverflow { .. } => ErrorKind::MemoryOverflow,
            AssemblerError::UndefinedSymbol { .. } => ErrorKind::UndefinedSymbol,
            AssemblerError::UnknownAddressingMode { .. } => ErrorKind::UnknownAddressingMode,
            AssemblerError::UnknownMnemonic { .. } => ErrorKind::UnknownMnemonic,
            AssemblerError::EmptyProgram { .. } => ErrorKind::EmptyProgram,
        }
    }

    /// Human-readable message without the offending line
    pub fn message(&self) -> &str {
        self.parts().0
    }

    /// The offending line, empty when the error is not tied to one
    pub fn line(&self) -> &str {
        self.parts().1
    }

    fn parts(&self) -> (&str, &str) {
        match self {
            AssemblerError::MalformedLine { message, line }
            | AssemblerError::DuplicateLabel { message, line }
            | AssemblerError::DuplicateName { message, line }
            | AssemblerError::DuplicateOpcode { message, line }
            | AssemblerError::InvalidInstruction { message, line }
            | AssemblerError::MissingStart { message, line }
            | AssemblerError::DuplicateStart { message, line }
            | AssemblerError::MissingEntryPoint { message, line }
            | AssemblerError::InvalidEntryPoint { message, line }
            | AssemblerError::OperandCountMismatch { message, line }
            | AssemblerError::InvalidOperand { message, line }
            | AssemblerError::MemoryOverflow { message, line }
            | AssemblerError::UndefinedSymbol { message, line }
            | AssemblerError::UnknownAddressingMode { message, line }
            | AssemblerError::UnknownMnemonic { message, line }
            | AssemblerError::EmptyProgram { message, line } => (message, line),
        }
    }
}

/// An assembler error flattened for a front-end to display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub message: String,
    pub line: Option<String>,
}

impl From<&AssemblerError> for Diagnostic {
    fn from(err: &AssemblerError) -> Self {
        let line = err.line();
        Self {
            kind: err.kind(),
            message: err.message().to_string(),
            line: (!line.is_empty()).then(|| line.to_string()),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error[{}]: {}", self.kind, self.message)?;

        if let Some(line) = &self.line {
            write!(f, "\n  --> {}", line)?;
        }

        Ok(())
    }
}
