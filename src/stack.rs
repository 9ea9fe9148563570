//! Persistent symbolic operand stack.
//!
//! The original analyzer (`examples/original_source/analyzer.go`,
//! `stackFrame`) represents the stack as a garbage-collected cons-list so
//! that many concurrent abstract states can cheaply share tails. Per
//! spec §9, the natural re-architecture without a tracing collector is
//! an arena of immutable frame records referenced by index; the chain
//! is then `{source_pc, up: Option<FrameId>, height}`. The arena lives
//! for one [`crate::interp::analyze`] call and is dropped wholesale
//! afterwards.

/// Index into a [`StackArena`]. Frames are never mutated or freed once
/// allocated; a chain is just a starting `FrameId` plus the arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameId(u32);

#[derive(Clone, Copy, Debug)]
struct Frame {
    source_pc: usize,
    up: Option<FrameId>,
    height: usize,
}

/// The arena backing every symbolic stack explored during one analysis
/// run. A stack is represented by `Option<FrameId>` (`None` = empty);
/// the arena owns the actual frame storage.
#[derive(Default)]
pub struct StackArena {
    frames: Vec<Frame>,
}

impl StackArena {
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    fn frame(&self, id: FrameId) -> Frame {
        self.frames[id.0 as usize]
    }

    fn alloc(&mut self, up: Option<FrameId>, source_pc: usize) -> FrameId {
        let height = match up {
            Some(u) => self.frame(u).height + 1,
            None => 0,
        };
        self.frames.push(Frame { source_pc, up, height });
        FrameId((self.frames.len() - 1) as u32)
    }

    /// Number of elements on the stack (0 for empty).
    pub fn depth(&self, top: Option<FrameId>) -> usize {
        match top {
            Some(id) => self.frame(id).height + 1,
            None => 0,
        }
    }

    /// The producer pc stored in the top slot.
    pub fn source(&self, top: FrameId) -> usize {
        self.frame(top).source_pc
    }

    /// Walk `n` frames up from `top` (`0` returns `top` itself).
    fn nth(&self, top: Option<FrameId>, n: usize) -> Option<FrameId> {
        let mut cur = top;
        for _ in 0..n {
            cur = cur.and_then(|id| self.frame(id).up);
        }
        cur
    }

    /// Push a new value produced by `source_pc` onto the stack.
    pub fn push(&mut self, top: Option<FrameId>, source_pc: usize) -> Option<FrameId> {
        Some(self.alloc(top, source_pc))
    }

    /// Pop `n` elements (used for "other" reads, and for the
    /// target/condition popped by jump/jumpi). Returns `None` if the
    /// stack underflows.
    pub fn pop_n(&self, top: Option<FrameId>, n: usize) -> Option<Option<FrameId>> {
        if self.depth(top) < n {
            return None;
        }
        Some(self.nth(top, n))
    }

    /// `DUP<k>`: copy the `k`-th-from-top element (1-indexed, so `k=1`
    /// duplicates the top itself) onto the top. Nothing is consumed.
    pub fn dup(&mut self, top: Option<FrameId>, k: usize) -> Option<Option<FrameId>> {
        debug_assert!(k >= 1);
        if self.depth(top) < k {
            return None;
        }
        let id = self.nth(top, k - 1)?;
        let source_pc = self.frame(id).source_pc;
        Some(self.push(top, source_pc))
    }

    /// `SWAP<k>`: exchange the top element with the `(k+1)`-th-from-top
    /// element (1-indexed). Mirrors `stackFrame.swap`/`replace` in the
    /// original Go source, reimplemented over the arena: walk down to
    /// the target slot rebuilding fresh frames above it while sharing
    /// the unaffected tail.
    pub fn swap(&mut self, top: Option<FrameId>, k: usize) -> Option<Option<FrameId>> {
        debug_assert!(k >= 1);
        if self.depth(top) <= k {
            return None;
        }
        let top_id = top.expect("non-empty per depth check");
        let top_source = self.frame(top_id).source_pc;
        let up = self.frame(top_id).up;
        let (new_up, old_source) = self.replace_at(up, k - 1, top_source);
        Some(self.push(new_up, old_source))
    }

    /// Replace the producer at 0-indexed depth `idx` (counted from the
    /// head of `node`) with `new_source`, returning the rebuilt chain
    /// and the value that was there. Every frame from `node` down to the
    /// target is freshly allocated; everything below it is shared.
    fn replace_at(
        &mut self,
        node: Option<FrameId>,
        idx: usize,
        new_source: usize,
    ) -> (Option<FrameId>, usize) {
        let id = node.expect("replace_at: index out of range");
        let frame = self.frame(id);
        if idx == 0 {
            let new_id = self.alloc(frame.up, new_source);
            (Some(new_id), frame.source_pc)
        } else {
            let (new_up, old) = self.replace_at(frame.up, idx - 1, new_source);
            let new_id = self.alloc(new_up, frame.source_pc);
            (Some(new_id), old)
        }
    }

    /// Snapshot the stack, top-down, as a sequence of producer pcs. Used
    /// by the interpreter to build this pc's reaching pool entry.
    pub fn snapshot(&self, top: Option<FrameId>) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.depth(top));
        let mut cur = top;
        while let Some(id) = cur {
            let frame = self.frame(id);
            out.push(frame.source_pc);
            cur = frame.up;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_snapshot() {
        let mut arena = StackArena::new();
        let s0 = arena.push(None, 0);
        let s1 = arena.push(s0, 2);
        assert_eq!(arena.snapshot(s1), vec![2, 0]);
        assert_eq!(arena.depth(s1), 2);
    }

    #[test]
    fn dup1_duplicates_top() {
        let mut arena = StackArena::new();
        let s0 = arena.push(None, 5); // PUSH1 5 at pc 0
        let s1 = arena.dup(s0, 1).unwrap(); // DUP1
        assert_eq!(arena.snapshot(s1), vec![5, 5]);
    }

    #[test]
    fn dup2_duplicates_second_from_top() {
        let mut arena = StackArena::new();
        let s0 = arena.push(None, 1);
        let s1 = arena.push(s0, 2);
        let s2 = arena.dup(s1, 2).unwrap();
        assert_eq!(arena.snapshot(s2), vec![1, 2, 1]);
    }

    #[test]
    fn swap1_exchanges_top_two() {
        let mut arena = StackArena::new();
        let s0 = arena.push(None, 1); // PUSH1 1 at pc 0
        let s1 = arena.push(s0, 2); // PUSH1 2 at pc 2
        let s2 = arena.swap(s1, 1).unwrap();
        assert_eq!(arena.snapshot(s2), vec![1, 2]);
    }

    #[test]
    fn swap_shares_tail_below_target() {
        let mut arena = StackArena::new();
        let s0 = arena.push(None, 0);
        let s1 = arena.push(s0, 1);
        let s2 = arena.push(s1, 2);
        let s3 = arena.swap(s2, 2).unwrap();
        assert_eq!(arena.snapshot(s3), vec![0, 1, 2]);
    }

    #[test]
    fn pop_underflow_detected() {
        let arena = StackArena::new();
        assert_eq!(arena.pop_n(None, 1), None);
    }

    #[test]
    fn dup_underflow_detected() {
        let mut arena = StackArena::new();
        let s0 = arena.push(None, 0);
        assert_eq!(arena.dup(s0, 2), None);
    }
}
