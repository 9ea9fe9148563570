//! Analysis error type.
//!
//! Grounded on `examples/baron-chain-baron-EVM/bins/bcevme/src/cmd/
//! evmrunner.rs`'s `Errors` enum: a small closed `thiserror` enum with
//! `#[from]` for the one wrapped I/O case, rather than the teacher's
//! `Box<dyn Error>` (the analyzer's error set is fully known ahead of
//! time, and `AnalysisError` is returned from the library API itself,
//! not just from `main`).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("unresolvable indirect jump at pc {jump_pc}: producer at pc {producer_pc} is not a constant push")]
    UnresolvableJump { jump_pc: usize, producer_pc: usize },

    #[error("opcode at pc {pc} reports {writes} stack writes (expected 0 or 1)")]
    MalformedOpcode { pc: usize, writes: u8 },

    #[error("no instruction found at pc {0}")]
    NoSuchPc(usize),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
