//! Worklist-driven abstract interpreter.
//!
//! Grounded on `examples/original_source/analyzer.go`'s `Analyze` (LIFO
//! worklist, `ReachingPool.Combine` for the growth check) but corrected
//! to variant B: the pool recorded for a popped state is the snapshot
//! of *that state's own* entry stack, never smuggled onto a successor.
//! The teacher's `analysis.rs` (`BytecodeAnalysis::from_insns`) is the
//! source for the overall "analyze once, annotate instructions" shape.

use std::collections::BTreeMap;

use crate::decode::{Opcode, Program};
use crate::error::AnalysisError;
use crate::pool::Pool;
use crate::stack::{FrameId, StackArena};

/// Maximum symbolic stack depth; states that would exceed it are
/// dropped rather than explored further (spec's overflow handling).
pub const MAX_STACK_DEPTH: usize = 1024;

type State = (usize, Option<FrameId>);

/// Run the analysis over `program`, annotating every reachable
/// instruction's `reached_by`/`reaches` in place. Entry point is pc 0
/// with an empty stack.
pub fn analyze(program: &mut Program) -> Result<(), AnalysisError> {
    let mut arena = StackArena::new();
    let mut pools: BTreeMap<usize, Pool> = BTreeMap::new();
    let mut worklist: Vec<State> = Vec::new();

    if program.contains(0) {
        worklist.push((0, None));
    }

    while let Some((pc, stack)) = worklist.pop() {
        let Some(instr) = program.get(pc) else {
            // Landed mid-immediate or past the end of the code; not a
            // valid instruction boundary, nothing to do with it.
            continue;
        };

        let snapshot = arena.snapshot(stack);
        let entry_pool = Pool::from(snapshot);

        let grown = match pools.get(&pc) {
            Some(existing) => {
                let joined = existing.join(&entry_pool);
                if &joined == existing {
                    false
                } else {
                    pools.insert(pc, joined);
                    true
                }
            }
            None => {
                pools.insert(pc, entry_pool);
                true
            }
        };
        if !grown {
            continue;
        }

        let opcode = instr.opcode;
        let reads = instr.stack_reads();
        let writes = instr.stack_writes();
        let length = instr.length();

        if writes > 1 {
            return Err(AnalysisError::MalformedOpcode { pc, writes: writes as u8 });
        }

        let successors = match opcode {
            // An unrecognised byte halts exploration too (spec.md §9):
            // treating it as a no-op fall-through would keep analyzing
            // past an instruction no real machine would execute.
            Opcode::Halt | Opcode::Invalid => Vec::new(),

            Opcode::Push(_) => match push_successor(&mut arena, stack, pc, pc + length) {
                Some(s) => vec![s],
                None => Vec::new(),
            },

            Opcode::Dup(k) => match arena.dup(stack, k as usize) {
                Some(new_stack) => state_within_cap(&arena, pc + length, new_stack).into_iter().collect(),
                None => Vec::new(),
            },

            Opcode::Swap(k) => match arena.swap(stack, k as usize) {
                Some(new_stack) => state_within_cap(&arena, pc + length, new_stack).into_iter().collect(),
                None => Vec::new(),
            },

            Opcode::Jump => {
                let Some(top) = stack else { continue };
                let producer_pc = arena.source(top);
                let target = resolve_jump_target(program, pc, producer_pc)?;
                let Some(after_pop) = arena.pop_n(stack, 1) else { continue };
                if program.contains(target) {
                    vec![(target, after_pop)]
                } else {
                    Vec::new()
                }
            }

            Opcode::JumpI => {
                let Some(top) = stack else { continue };
                let producer_pc = arena.source(top);
                let target = resolve_jump_target(program, pc, producer_pc)?;
                let Some(after_pop) = arena.pop_n(stack, 2) else { continue };
                let mut succ = vec![(pc + length, after_pop)];
                if program.contains(target) {
                    succ.push((target, after_pop));
                }
                succ
            }

            Opcode::Other(_) => {
                let Some(after_pop) = arena.pop_n(stack, reads) else { continue };
                if writes == 1 {
                    match push_successor(&mut arena, after_pop, pc, pc + length) {
                        Some(s) => vec![s],
                        None => Vec::new(),
                    }
                } else {
                    vec![(pc + length, after_pop)]
                }
            }
        };

        worklist.extend(successors);
    }

    materialize(program, &pools);
    Ok(())
}

fn push_successor(
    arena: &mut StackArena,
    stack: Option<FrameId>,
    source_pc: usize,
    next_pc: usize,
) -> Option<State> {
    let new_stack = arena.push(stack, source_pc);
    state_within_cap(arena, next_pc, new_stack)
}

fn state_within_cap(arena: &StackArena, pc: usize, stack: Option<FrameId>) -> Option<State> {
    if arena.depth(stack) > MAX_STACK_DEPTH {
        None
    } else {
        Some((pc, stack))
    }
}

/// Resolve a jump target from the pc that produced the value on top of
/// the stack at the jump site. `stack.rs`'s `dup`/`swap` always forward
/// the *original* producing instruction's pc rather than substituting
/// their own, so the producer seen here is transparently the real
/// value-producing instruction even across a dup/swap chain — no
/// recursive walk is needed to get past them.
///
/// A target that doesn't fit in a pc (e.g. a `PUSH32` of a huge
/// constant) is out of range by construction; it is reported as
/// `usize::MAX`, which `program.contains` is guaranteed to reject, the
/// same "not checked by the core, fails visibly downstream" path as any
/// other out-of-range target (spec §7).
fn resolve_jump_target(
    program: &Program,
    jump_pc: usize,
    producer_pc: usize,
) -> Result<usize, AnalysisError> {
    let producer = program.get(producer_pc);
    match producer.map(|i| (i.opcode, i.immediate)) {
        Some((Opcode::Push(_), Some(value))) => {
            Ok(value.checked_to::<u64>().map(|v| v as usize).unwrap_or(usize::MAX))
        }
        _ => Err(AnalysisError::UnresolvableJump { jump_pc, producer_pc }),
    }
}

/// Post-fixed-point pass: fill in `reached_by` from the final per-pc
/// pools, then derive each producer's `reaches` from who reads it. Dup
/// and swap read nothing (`stack_reads == 0`) by construction, so they
/// never appear as consumers here — the exclusion falls out of the
/// opcode metadata rather than needing special-casing.
fn materialize(program: &mut Program, pools: &BTreeMap<usize, Pool>) {
    let mut reaches: BTreeMap<usize, std::collections::BTreeSet<usize>> = BTreeMap::new();

    for (&pc, pool) in pools {
        let reads = match program.get(pc) {
            Some(i) => i.stack_reads(),
            None => continue,
        };
        let mut reached_by = Vec::with_capacity(reads);
        for slot in 0..reads {
            let producers = pool.slot(slot).cloned().unwrap_or_default();
            for &p in &producers {
                reaches.entry(p).or_default().insert(pc);
            }
            reached_by.push(producers);
        }
        if let Some(instr) = program.get_mut(pc) {
            instr.reached_by = reached_by;
        }
    }

    for (pc, consumers) in reaches {
        if let Some(instr) = program.get_mut(pc) {
            instr.reaches = consumers;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode;

    fn reached_by(program: &Program, pc: usize, slot: usize) -> Vec<usize> {
        program.get(pc).unwrap().reached_by[slot].iter().copied().collect()
    }

    fn reaches(program: &Program, pc: usize) -> Vec<usize> {
        program.get(pc).unwrap().reaches.iter().copied().collect()
    }

    #[test]
    fn push_add_reaches_and_reached_by() {
        // PUSH1 1; PUSH1 2; ADD
        let mut program = decode(&[0x60, 0x01, 0x60, 0x02, 0x01]);
        analyze(&mut program).unwrap();
        assert_eq!(reached_by(&program, 4, 0), vec![2]);
        assert_eq!(reached_by(&program, 4, 1), vec![0]);
        assert_eq!(reaches(&program, 0), vec![4]);
        assert_eq!(reaches(&program, 2), vec![4]);
    }

    #[test]
    fn dup_does_not_count_as_a_consumer() {
        // PUSH1 1; DUP1; ADD
        let mut program = decode(&[0x60, 0x01, 0x80, 0x01]);
        analyze(&mut program).unwrap();
        // ADD at pc 3 reads both slots from pc 0 (the original push),
        // never from the DUP at pc 2.
        assert_eq!(reached_by(&program, 3, 0), vec![0]);
        assert_eq!(reached_by(&program, 3, 1), vec![0]);
        assert_eq!(reaches(&program, 2), Vec::<usize>::new());
        assert_eq!(reaches(&program, 0), vec![3]);
    }

    #[test]
    fn swap_forwards_original_producers() {
        // PUSH1 1; PUSH1 2; SWAP1; ADD
        let mut program = decode(&[0x60, 0x01, 0x60, 0x02, 0x90, 0x01]);
        analyze(&mut program).unwrap();
        let mut got = reached_by(&program, 5, 0);
        got.sort();
        let mut got2 = reached_by(&program, 5, 1);
        got2.sort();
        assert_eq!(got, vec![0]);
        assert_eq!(got2, vec![2]);
        assert_eq!(reaches(&program, 4), Vec::<usize>::new());
    }

    #[test]
    fn unconditional_jump_leaves_dead_code_unannotated() {
        // PUSH1 5; JUMP; INVALID (dead); JUMPDEST; STOP
        let mut program = decode(&[0x60, 0x05, 0x56, 0x0c, 0x5b, 0x00]);
        analyze(&mut program).unwrap();
        assert_eq!(reached_by(&program, 2, 0), vec![0]);
        // pc 3 (dead INVALID byte) never got a pool entry.
        assert_eq!(program.get(3).unwrap().reached_by.len(), 0);
    }

    #[test]
    fn unrecognised_opcode_halts_exploration() {
        // INVALID (pc0) must not fall through to the PUSH/JUMP/POP
        // chain that follows it. If it wrongly fell through, pc1's
        // pushed value would flow through the jump to the POP at pc7
        // and show up in pc1's `reaches`; since it halts, none of that
        // code is ever visited.
        let bytes = [0x0c, 0x60, 0xaa, 0x60, 0x06, 0x56, 0x5b, 0x50];
        let mut program = decode(&bytes);
        analyze(&mut program).unwrap();
        assert_eq!(program.get(1).unwrap().reaches, Default::default());
        assert_eq!(program.get(7).unwrap().reached_by[0], Default::default());
    }

    #[test]
    fn huge_push_immediate_as_jump_target_does_not_panic() {
        // PUSH32 0xfff...f (larger than u64::MAX); JUMP
        let mut bytes = vec![0x7f];
        bytes.extend([0xff; 32]);
        bytes.push(0x56);
        let mut program = decode(&bytes);
        // Must not panic; the target is out of range and simply
        // unreachable, not a fatal error.
        analyze(&mut program).unwrap();
    }

    #[test]
    fn conditional_jump_explores_both_arms() {
        // PUSH1 1; PUSH1 8; JUMPI; PUSH1 0; STOP; JUMPDEST; STOP
        let bytes = [0x60, 0x01, 0x60, 0x08, 0x57, 0x60, 0x00, 0x00, 0x5b, 0x00];
        let mut program = decode(&bytes);
        analyze(&mut program).unwrap();
        // both the fallthrough (pc 5) and the jump target (pc 8) got reached
        assert!(program.get(5).is_some());
        assert!(program.get(8).is_some());
        assert_eq!(reached_by(&program, 4, 0), vec![2]);
        assert_eq!(reached_by(&program, 4, 1), vec![0]);
    }

    #[test]
    fn merge_point_joins_producers_from_both_arms() {
        // True arm keeps a value (pc 0) across the JUMPI and lands on
        // the JUMPDEST directly; the false arm drops it, pushes its own
        // value (pc 8), and jumps there unconditionally. Both arms
        // arrive at the same pc with one element on the stack, so the
        // final POP's single read slot must union both producers.
        let bytes = [
            0x60, 0xbb, // 0: PUSH1 0xbb  (kept across the branch on the true arm)
            0x60, 0x01, // 2: PUSH1 1     (condition)
            0x60, 0x0d, // 4: PUSH1 13    (branch target)
            0x57, // 6: JUMPI
            0x50, // 7: POP  (false arm drops pc0's value)
            0x60, 0xcc, // 8: PUSH1 0xcc  (false arm's own merge value)
            0x60, 0x0d, // 10: PUSH1 13   (jump target)
            0x56, // 12: JUMP
            0x5b, // 13: JUMPDEST (merge point)
            0x50, // 14: POP (merge consumer)
        ];
        let mut program = decode(&bytes);
        analyze(&mut program).unwrap();
        let mut producers = reached_by(&program, 14, 0);
        producers.sort();
        assert_eq!(producers, vec![0, 8]);
    }
}
