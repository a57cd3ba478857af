//! Free-list `u32` ID allocator shared by the server's session table and the
//! client's route table (spec §4.5, §9).
//!
//! The reference implementation scans from 0 on every allocation and treats
//! `i + 1 > u32::MAX` as exhaustion, but the loop variable used for the
//! in-use check never reaches that boundary as written (spec §9 "Open
//! Questions"). Rather than transliterate the bug, released IDs are tracked
//! in a free set and handed out before the cursor advances, so no ID is ever
//! outstanding twice and exhaustion is a real, reachable condition.

use std::collections::BTreeSet;

/// Allocates small non-negative integers, reusing released values before
/// minting new ones.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: u32,
    free: BTreeSet<u32>,
    exhausted: bool,
}

impl IdAllocator {
    /// Creates an allocator that starts handing out IDs from 0.
    #[must_use]
    pub fn new() -> Self {
        Self { next: 0, free: BTreeSet::new(), exhausted: false }
    }

    /// Allocates the lowest available ID, preferring a released one over a
    /// fresh one. Returns `None` once the `u32` space is exhausted.
    pub fn allocate(&mut self) -> Option<u32> {
        if let Some(&id) = self.free.iter().next() {
            self.free.remove(&id);
            return Some(id);
        }

        if self.exhausted {
            return None;
        }

        let id = self.next;
        match self.next.checked_add(1) {
            Some(next) => self.next = next,
            None => self.exhausted = true,
        }
        Some(id)
    }

    /// Returns `id` to the free pool. Releasing an ID that was never
    /// allocated makes it allocatable, which callers must avoid.
    pub fn release(&mut self, id: u32) {
        self.free.insert(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_from_zero_upward() {
        let mut alloc = IdAllocator::new();
        assert_eq!(alloc.allocate(), Some(0));
        assert_eq!(alloc.allocate(), Some(1));
        assert_eq!(alloc.allocate(), Some(2));
    }

    #[test]
    fn released_ids_are_reused_before_new_ones() {
        let mut alloc = IdAllocator::new();
        let a = alloc.allocate().unwrap();
        let _b = alloc.allocate().unwrap();
        alloc.release(a);
        assert_eq!(alloc.allocate(), Some(a));
        assert_eq!(alloc.allocate(), Some(2));
    }

    #[test]
    fn never_returns_a_currently_allocated_id() {
        let mut alloc = IdAllocator::new();
        let mut live = std::collections::HashSet::new();
        for _ in 0..100 {
            let id = alloc.allocate().unwrap();
            assert!(live.insert(id), "id {id} handed out while still live");
            if id % 3 == 0 {
                alloc.release(id);
                live.remove(&id);
            }
        }
    }

    #[test]
    fn exhaustion_is_reachable() {
        let mut alloc = IdAllocator { next: u32::MAX, free: BTreeSet::new(), exhausted: false };
        assert_eq!(alloc.allocate(), Some(u32::MAX));
        assert_eq!(alloc.allocate(), None);
    }
}
