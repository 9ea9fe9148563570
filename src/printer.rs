//! Disassembly printer.
//!
//! Keeps the teacher's `DafnyPrinter` shape — a small struct wrapping an
//! output buffer with `print`/`println` helpers — but emits plain
//! disassembly text instead of Dafny proof obligations. Resolving each
//! operand slot back to the instruction that produced it (rather than
//! just its pc) follows `examples/original_source/evmdis/main.go`.

use std::fmt::Write as _;

use serde::Serialize;

use crate::decode::{Instruction, Program};

pub struct Disassembler {
    out: String,
}

impl Disassembler {
    pub fn new() -> Self {
        Self { out: String::new() }
    }

    pub fn into_string(self) -> String {
        self.out
    }

    fn print(&mut self, s: &str) {
        self.out.push_str(s);
    }

    fn println(&mut self, s: &str) {
        self.out.push_str(s);
        self.out.push('\n');
    }

    /// Render every decoded instruction in ascending pc order, whether
    /// or not the analysis ever reached it (unreached pcs print with
    /// empty producer/consumer sets, per `evmdis`'s unconditional loop
    /// over every decoded instruction).
    pub fn print_program(&mut self, program: &Program) {
        for instr in program.instructions_in_order() {
            self.print_instruction(program, instr);
        }
    }

    pub fn print_instruction(&mut self, program: &Program, instr: &Instruction) {
        self.print(&format!("{:#06x}: {}", instr.pc, instr));
        if !instr.reached_by.is_empty() {
            self.print("  <-");
            for (slot, producers) in instr.reached_by.iter().enumerate() {
                self.print(&format!(" [{slot}]"));
                if producers.is_empty() {
                    self.print("{}");
                } else {
                    self.print("{");
                    for (i, &pc) in producers.iter().enumerate() {
                        if i != 0 {
                            self.print(",");
                        }
                        self.print_producer(program, pc);
                    }
                    self.print("}");
                }
            }
        }
        if !instr.reaches.is_empty() {
            self.print("  ->");
            for &pc in &instr.reaches {
                self.print(&format!(" {pc:#06x}"));
            }
        }
        self.println("");
    }

    fn print_producer(&mut self, program: &Program, pc: usize) {
        match program.get(pc) {
            Some(i) => {
                let _ = write!(self.out, "{i}@{pc:#06x}");
            }
            None => {
                let _ = write!(self.out, "?@{pc:#06x}");
            }
        }
    }
}

impl Default for Disassembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Render the program as plain disassembly text.
pub fn disassemble(program: &Program) -> String {
    let mut printer = Disassembler::new();
    printer.print_program(program);
    printer.into_string()
}

/// JSON-serializable view of one instruction, for `--format json`.
#[derive(Serialize)]
pub struct InstructionView {
    pub pc: usize,
    pub mnemonic: String,
    pub immediate: Option<String>,
    pub reached_by: Vec<Vec<usize>>,
    pub reaches: Vec<usize>,
}

impl InstructionView {
    pub fn from_instruction(instr: &Instruction) -> Self {
        Self {
            pc: instr.pc,
            mnemonic: instr.opcode.mnemonic(instr.raw).to_string(),
            immediate: instr.immediate.map(|v| format!("{v:#x}")),
            reached_by: instr
                .reached_by
                .iter()
                .map(|set| set.iter().copied().collect())
                .collect(),
            reaches: instr.reaches.iter().copied().collect(),
        }
    }
}

/// Render the program as a JSON array of [`InstructionView`]s.
pub fn to_json(program: &Program) -> serde_json::Result<String> {
    let views: Vec<InstructionView> = program
        .instructions_in_order()
        .map(InstructionView::from_instruction)
        .collect();
    serde_json::to_string_pretty(&views)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode;
    use crate::interp::analyze;

    #[test]
    fn disassembly_includes_pc_and_producers() {
        let mut program = decode(&[0x60, 0x01, 0x60, 0x02, 0x01]);
        analyze(&mut program).unwrap();
        let text = disassemble(&program);
        assert!(text.contains("0x0000: PUSH1 0x1"));
        assert!(text.contains("0x0004: ADD"));
        assert!(text.contains("<-"));
    }

    #[test]
    fn json_round_trips_through_serde() {
        let mut program = decode(&[0x60, 0x01, 0x60, 0x02, 0x01]);
        analyze(&mut program).unwrap();
        let json = to_json(&program).unwrap();
        assert!(json.contains("\"mnemonic\": \"ADD\""));
    }
}
