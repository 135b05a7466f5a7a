//! Arena-backed binary max-heap of sync targets.
//!
//! Targets are stored in an arena; the heap array holds arena indices and a
//! parallel `positions` table maps each arena index back to its heap slot.
//! Position bookkeeping therefore never leaks into [`SyncTarget`] itself.
//!
//! Ordering: higher `height` first. Equal heights pop in acceptance order
//! (lower sequence number first).
//!
//! Every primitive here is total: out-of-range positions are ignored rather
//! than indexed, and popping an empty heap yields `None`.

use std::cmp::Reverse;

use crate::types::SyncTarget;

struct Slot {
    target: SyncTarget,
    seq: u64,
}

impl Slot {
    fn rank(&self) -> (u64, Reverse<u64>) {
        (self.target.height(), Reverse(self.seq))
    }
}

/// Max-heap of [`SyncTarget`]s keyed by height.
#[derive(Default)]
pub struct TargetHeap {
    /// Target storage. `None` marks a free cell.
    arena: Vec<Option<Slot>>,
    /// Free arena cells available for reuse.
    free: Vec<usize>,
    /// Heap order: heap position → arena index.
    heap: Vec<usize>,
    /// Arena index → heap position. `None` once the target has been popped.
    positions: Vec<Option<usize>>,
    /// Next acceptance sequence number.
    next_seq: u64,
}

impl TargetHeap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            arena: Vec::with_capacity(capacity),
            free: Vec::new(),
            heap: Vec::with_capacity(capacity),
            positions: Vec::with_capacity(capacity),
            next_seq: 0,
        }
    }

    /// Number of queued targets.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Insert a target and restore heap order.
    pub fn push(&mut self, target: SyncTarget) {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);

        let idx = self.alloc(Slot { target, seq });
        let pos = self.heap.len();
        self.heap.push(idx);
        self.set_position(idx, Some(pos));
        self.sift_up(pos);
    }

    /// Remove and return the highest target.
    pub fn pop(&mut self) -> Option<SyncTarget> {
        let last = self.heap.len().checked_sub(1)?;
        self.swap(0, last);
        let idx = self.heap.pop()?;
        self.set_position(idx, None);
        let slot = self.arena.get_mut(idx).and_then(Option::take)?;
        self.free.push(idx);
        if !self.heap.is_empty() {
            self.sift_down(0);
        }
        Some(slot.target)
    }

    /// The highest target, without removing it.
    pub fn peek(&self) -> Option<&SyncTarget> {
        self.slot_at(0).map(|slot| &slot.target)
    }

    /// Queued targets in heap-array order (not priority order).
    pub fn iter(&self) -> impl Iterator<Item = &SyncTarget> + '_ {
        self.heap
            .iter()
            .filter_map(|&idx| self.arena.get(idx).and_then(Option::as_ref))
            .map(|slot| &slot.target)
    }

    /// Drop every queued target.
    pub fn clear(&mut self) {
        self.arena.clear();
        self.free.clear();
        self.heap.clear();
        self.positions.clear();
    }

    // ─── internals ────────────────────────────────────────────────────────────

    fn alloc(&mut self, slot: Slot) -> usize {
        while let Some(idx) = self.free.pop() {
            if let Some(cell) = self.arena.get_mut(idx) {
                if cell.is_none() {
                    *cell = Some(slot);
                    return idx;
                }
            }
        }
        self.arena.push(Some(slot));
        self.positions.push(None);
        self.arena.len() - 1
    }

    fn slot_at(&self, pos: usize) -> Option<&Slot> {
        self.heap
            .get(pos)
            .and_then(|&idx| self.arena.get(idx))
            .and_then(Option::as_ref)
    }

    fn set_position(&mut self, idx: usize, pos: Option<usize>) {
        if let Some(entry) = self.positions.get_mut(idx) {
            *entry = pos;
        }
    }

    /// `true` if the target at heap position `a` must sit above the one at `b`.
    fn outranks(&self, a: usize, b: usize) -> bool {
        match (self.slot_at(a), self.slot_at(b)) {
            (Some(x), Some(y)) => x.rank() > y.rank(),
            _ => false,
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        if a == b || a >= self.heap.len() || b >= self.heap.len() {
            return;
        }
        self.heap.swap(a, b);
        let (ia, ib) = (self.heap[a], self.heap[b]);
        self.set_position(ia, Some(a));
        self.set_position(ib, Some(b));
    }

    fn sift_up(&mut self, mut pos: usize) {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if !self.outranks(pos, parent) {
                break;
            }
            self.swap(pos, parent);
            pos = parent;
        }
    }

    fn sift_down(&mut self, mut pos: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * pos + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let mut child = left;
            if right < len && self.outranks(right, left) {
                child = right;
            }
            if !self.outranks(child, pos) {
                break;
            }
            self.swap(pos, child);
            pos = child;
        }
    }

    /// Verify heap order and that the position table mirrors the heap array.
    #[cfg(test)]
    pub(crate) fn check_invariant(&self) -> Result<(), String> {
        for pos in 1..self.heap.len() {
            let parent = (pos - 1) / 2;
            if self.outranks(pos, parent) {
                return Err(format!("position {pos} outranks its parent {parent}"));
            }
        }
        for (pos, &idx) in self.heap.iter().enumerate() {
            if self.positions.get(idx).copied().flatten() != Some(pos) {
                return Err(format!("arena slot {idx} does not record heap position {pos}"));
            }
        }
        let live = self.arena.iter().filter(|cell| cell.is_some()).count();
        if live != self.heap.len() {
            return Err(format!("{live} live arena slots for {} heap entries", self.heap.len()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChainInfo, ChainOrigin, TipsetKey};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn target(cid: &str, height: u64) -> SyncTarget {
        SyncTarget::new(ChainInfo::new(TipsetKey::single(cid), height, ChainOrigin::Gossip))
    }

    fn drain_heights(heap: &mut TargetHeap) -> Vec<u64> {
        std::iter::from_fn(|| heap.pop()).map(|t| t.height()).collect()
    }

    #[test]
    fn pops_highest_first() {
        let mut heap = TargetHeap::new();
        for (i, h) in [5, 9, 1, 20, 3].into_iter().enumerate() {
            heap.push(target(&format!("t{i}"), h));
            heap.check_invariant().unwrap();
        }
        assert_eq!(heap.peek().map(SyncTarget::height), Some(20));
        assert_eq!(drain_heights(&mut heap), vec![20, 9, 5, 3, 1]);
    }

    #[test]
    fn empty_heap_is_total() {
        let mut heap = TargetHeap::new();
        assert!(heap.pop().is_none());
        assert!(heap.peek().is_none());
        assert_eq!(heap.len(), 0);
        heap.check_invariant().unwrap();
    }

    #[test]
    fn equal_heights_pop_in_acceptance_order() {
        let mut heap = TargetHeap::new();
        heap.push(target("first", 10));
        heap.push(target("high", 11));
        heap.push(target("second", 10));
        heap.push(target("third", 10));

        let order: Vec<String> = std::iter::from_fn(|| heap.pop())
            .map(|t| t.head().to_string())
            .collect();
        assert_eq!(order, vec!["{high}", "{first}", "{second}", "{third}"]);
    }

    #[test]
    fn arena_cells_are_reused() {
        let mut heap = TargetHeap::new();
        for round in 0..10 {
            heap.push(target(&format!("a{round}"), round));
            heap.push(target(&format!("b{round}"), round + 1));
            heap.pop();
            heap.pop();
        }
        assert!(heap.arena.len() <= 2);
        assert!(heap.is_empty());
    }

    #[test]
    fn randomized_interleaving_keeps_invariant() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut heap = TargetHeap::new();
        for i in 0..2_000 {
            if rng.gen_bool(0.6) {
                heap.push(target(&format!("r{i}"), rng.gen_range(0..50)));
            } else {
                heap.pop();
            }
            heap.check_invariant().unwrap();
        }
        let heights = drain_heights(&mut heap);
        assert!(heights.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn clear_empties_everything() {
        let mut heap = TargetHeap::with_capacity(4);
        heap.push(target("a", 1));
        heap.push(target("b", 2));
        assert_eq!(heap.iter().count(), 2);
        heap.clear();
        assert!(heap.is_empty());
        assert!(heap.peek().is_none());
        heap.check_invariant().unwrap();
    }
}
