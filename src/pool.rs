//! Reaching-pool lattice: one producer set per stack slot.
//!
//! Grounded on `examples/original_source/analyzer.go`'s `ReachingPool`
//! type and its `Combine`/`Equal` methods. `Combine` there is a
//! slot-wise set union extended to the longer operand's length; `Equal`
//! compares lengths then slot contents. Rust's derived `PartialEq` on
//! `Vec<BTreeSet<usize>>` already implements that second part exactly,
//! so only `join` needs its own method.

use std::collections::BTreeSet;

/// A snapshot of which pcs may have produced each stack slot, indexed
/// top-down (slot 0 = top of stack).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Pool(pub Vec<BTreeSet<usize>>);

impl Pool {
    pub fn new(slots: Vec<BTreeSet<usize>>) -> Self {
        Self(slots)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Slot-wise union, extended to `max(self.depth(), other.depth())`.
    /// Mirrors `ReachingPool.Combine`.
    pub fn join(&self, other: &Pool) -> Pool {
        let len = self.0.len().max(other.0.len());
        let mut out = Vec::with_capacity(len);
        for i in 0..len {
            let mut slot = self.0.get(i).cloned().unwrap_or_default();
            if let Some(o) = other.0.get(i) {
                slot.extend(o.iter().copied());
            }
            out.push(slot);
        }
        Pool(out)
    }

    pub fn slot(&self, i: usize) -> Option<&BTreeSet<usize>> {
        self.0.get(i)
    }
}

impl From<Vec<usize>> for Pool {
    /// Build a pool from a top-down stack snapshot of producer pcs —
    /// each slot reaches from exactly the instruction that produced it.
    fn from(snapshot: Vec<usize>) -> Self {
        Pool(snapshot.into_iter().map(|pc| BTreeSet::from([pc])).collect())
    }
}
