//! Reaching-definitions dataflow analysis for stack-machine bytecode.
//!
//! Decode raw bytecode into a [`decode::Program`], run [`interp::analyze`]
//! over it, then render the annotated program with [`printer`].

pub mod decode;
pub mod error;
pub mod interp;
pub mod opcode;
pub mod pool;
pub mod printer;
pub mod stack;

pub use decode::{decode, Instruction, Opcode, Program};
pub use error::AnalysisError;
pub use interp::analyze;

/// Decode and analyze in one call — the common entry point for both the
/// CLI and library consumers.
pub fn analyze_bytecode(bytecode: &[u8]) -> Result<Program, AnalysisError> {
    let mut program = decode(bytecode);
    analyze(&mut program)?;
    Ok(program)
}
