//! Linear decoder: raw bytecode bytes to a sparse program map.
//!
//! Grounded on `examples/original_source/contract.go` (`NewProgram`) and
//! on the linear opcode-walking idiom in
//! `examples/baron-chain-baron-EVM/crates/interpreter/src/interpreter/
//! analysis.rs` (`analyze`), adapted to build the full instruction +
//! immediate map the interpreter needs rather than just a jumpdest
//! bitmap.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use alloy_primitives::U256;

use crate::opcode::{self, OpInfo};

/// A decoded opcode, tagged the way the data model in the spec describes
/// it: push/dup/swap carry their width, jump/jumpi/halt/invalid are
/// singletons, everything else retains its raw byte so metadata can
/// still be looked up through [`opcode::OPCODE_TABLE`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Opcode {
    Push(u8),
    Dup(u8),
    Swap(u8),
    Jump,
    JumpI,
    Halt,
    Invalid,
    Other(u8),
}

impl Opcode {
    fn decode(byte: u8) -> Self {
        if opcode::is_unassigned(byte) {
            return Opcode::Invalid;
        }
        let info = opcode::info(byte);
        if info.is_push {
            Opcode::Push(info.operand_size)
        } else if info.is_dup {
            Opcode::Dup(byte - opcode::DUP1 + 1)
        } else if info.is_swap {
            Opcode::Swap(byte - opcode::SWAP1 + 1)
        } else if info.is_jump {
            Opcode::Jump
        } else if info.is_jumpi {
            Opcode::JumpI
        } else if info.is_halt {
            Opcode::Halt
        } else {
            Opcode::Other(byte)
        }
    }

    #[inline]
    pub fn is_dup(&self) -> bool {
        matches!(self, Opcode::Dup(_))
    }

    #[inline]
    pub fn is_swap(&self) -> bool {
        matches!(self, Opcode::Swap(_))
    }

    #[inline]
    pub fn is_push(&self) -> bool {
        matches!(self, Opcode::Push(_))
    }

    /// Metadata for this opcode: reads, writes, operand size. `Invalid`
    /// is treated as a 0-reads/0-writes/0-operand instruction per spec.
    pub fn meta(&self, raw: u8) -> &'static OpInfo {
        match self {
            Opcode::Invalid => &INVALID_META,
            _ => opcode::info(raw),
        }
    }

    pub fn mnemonic(&self, raw: u8) -> &'static str {
        self.meta(raw).mnemonic
    }
}

static INVALID_META: OpInfo = OpInfo {
    mnemonic: "INVALID",
    operand_size: 0,
    stack_reads: 0,
    stack_writes: 0,
    is_push: false,
    is_dup: false,
    is_swap: false,
    is_halt: false,
    is_jump: false,
    is_jumpi: false,
};

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Opcode::Push(w) => write!(f, "PUSH{w}"),
            Opcode::Dup(k) => write!(f, "DUP{k}"),
            Opcode::Swap(k) => write!(f, "SWAP{k}"),
            Opcode::Jump => write!(f, "JUMP"),
            Opcode::JumpI => write!(f, "JUMPI"),
            Opcode::Halt => write!(f, "HALT"),
            Opcode::Invalid => write!(f, "INVALID"),
            Opcode::Other(raw) => write!(f, "{}", opcode::info(*raw).mnemonic),
        }
    }
}

/// A single decoded instruction, annotated in place by the interpreter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub pc: usize,
    pub opcode: Opcode,
    pub raw: u8,
    /// Present only for push instructions; the (possibly zero-padded)
    /// big-endian immediate.
    pub immediate: Option<U256>,
    /// Producer sets, one per operand slot (index 0 = top of stack on
    /// entry). Length always equals this instruction's stack-read count.
    pub reached_by: Vec<BTreeSet<usize>>,
    /// Consumer pcs that may read this instruction's output. Populated
    /// for every instruction except duplicates and swaps (see
    /// `crate::interp`).
    pub reaches: BTreeSet<usize>,
}

impl Instruction {
    pub fn operand_size(&self) -> usize {
        self.opcode.meta(self.raw).operand_size as usize
    }

    pub fn stack_reads(&self) -> usize {
        self.opcode.meta(self.raw).stack_reads as usize
    }

    pub fn stack_writes(&self) -> usize {
        self.opcode.meta(self.raw).stack_writes as usize
    }

    /// Byte length in the original code stream, used for the
    /// `pc += length()` stride.
    pub fn length(&self) -> usize {
        self.operand_size() + 1
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.immediate {
            Some(v) => write!(f, "{} {v:#x}", self.opcode),
            None => write!(f, "{}", self.opcode),
        }
    }
}

/// The decoded program: a sparse map from byte offset to instruction.
/// Keys are non-contiguous — a push of width `k` at pc `p` occupies pcs
/// `p..=p+k`, but only `p` is present.
#[derive(Clone, Debug, Default)]
pub struct Program {
    instructions: BTreeMap<usize, Instruction>,
    len: usize,
}

impl Program {
    pub fn get(&self, pc: usize) -> Option<&Instruction> {
        self.instructions.get(&pc)
    }

    pub fn get_mut(&mut self, pc: usize) -> Option<&mut Instruction> {
        self.instructions.get_mut(&pc)
    }

    pub fn contains(&self, pc: usize) -> bool {
        self.instructions.contains_key(&pc)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&usize, &Instruction)> {
        self.instructions.iter()
    }

    /// Byte length of the original code this program was decoded from.
    pub fn code_len(&self) -> usize {
        self.len
    }

    /// Iterate decoded instructions in ascending pc order, following the
    /// `pc += operand_size + 1` stride (as the external disassembler
    /// must, per spec §6).
    pub fn instructions_in_order(&self) -> impl Iterator<Item = &Instruction> {
        self.instructions.values()
    }
}

/// Decode a raw byte string into a [`Program`].
///
/// Truncated immediates are zero-padded (the machine's padding
/// semantics); unknown opcode bytes decode as [`Opcode::Invalid`] — a
/// 0-reads/0-writes instruction that [`crate::interp`] treats as
/// halting (no successors), the same as a real `STOP`/`RETURN`/
/// `SELFDESTRUCT`, since continuing to execute an undefined byte isn't
/// something a real machine would do.
pub fn decode(bytecode: &[u8]) -> Program {
    let mut instructions = BTreeMap::new();
    let mut i = 0usize;

    while i < bytecode.len() {
        let raw = bytecode[i];
        let opcode = Opcode::decode(raw);
        let info = opcode.meta(raw);
        let size = info.operand_size as usize;

        let immediate = if info.is_push {
            let mut buf = [0u8; 32];
            // Right-align the available bytes into a 32-byte big-endian
            // buffer; missing bytes (truncated immediate) stay zero.
            for j in 0..size {
                let src = i + 1 + j;
                if src < bytecode.len() {
                    buf[32 - size + j] = bytecode[src];
                }
            }
            Some(U256::from_be_bytes(buf))
        } else {
            None
        };

        instructions.insert(
            i,
            Instruction {
                pc: i,
                opcode,
                raw,
                immediate,
                reached_by: vec![BTreeSet::new(); info.stack_reads as usize],
                reaches: BTreeSet::new(),
            },
        );

        i += size + 1;
    }

    Program { instructions, len: bytecode.len() }
}
