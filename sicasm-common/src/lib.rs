//! SIC/XE Assembler - Common Types and Errors
//!
//! Shared error taxonomy and diagnostics used by the assembler core and its
//! front-ends.

pub mod error;

pub use error::{AssemblerError, Diagnostic, ErrorKind};
