//! Liveness registry for views sharing one buffer.
//!
//! Every live view owns one slot in a [`LiveViews`] table. Slots are recycled
//! through a free list and carry a generation counter, so a stale
//! [`ViewHandle`] can never remove the view that reused its slot.
//!
//! The reclamation horizon is the smallest position among live views. It is
//! answered by a binary min-heap with lazy deletion: removing a view only
//! vacates its slot, and heap entries whose `(index, generation)` no longer
//! names an occupied slot are discarded when they surface at the top.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Handle to a registered view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewHandle {
    pub index: u32,
    pub generation: u32,
}

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    generation: u32,
    /// Absolute position of the view holding this slot, `None` when free.
    position: Option<u64>,
}

/// Heap entry: ordered by position first, ties broken by slot.
type Entry = Reverse<(u64, u32, u32)>;

/// Compact the heap once stale entries outnumber live ones by this factor.
const COMPACT_FACTOR: usize = 4;

/// Registry of live view positions with an exact minimum.
#[derive(Debug, Default)]
pub struct LiveViews {
    slots: Vec<Slot>,
    free: Vec<u32>,
    heap: BinaryHeap<Entry>,
    live: usize,
}

impl LiveViews {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live views.
    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Register a view at `position` and return its handle.
    pub fn insert(&mut self, position: u64) -> ViewHandle {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                let index = u32::try_from(self.slots.len()).expect("more than u32::MAX live views");
                self.slots.push(Slot::default());
                index
            }
        };

        let slot = &mut self.slots[index as usize];
        debug_assert!(slot.position.is_none(), "free list handed out a live slot");
        slot.generation = slot.generation.wrapping_add(1);
        slot.position = Some(position);

        let handle = ViewHandle {
            index,
            generation: slot.generation,
        };
        self.heap.push(Reverse((position, index, handle.generation)));
        self.live += 1;
        handle
    }

    /// Remove the view behind `handle`, returning its position.
    ///
    /// # Panics
    ///
    /// Panics if the handle does not name a live view. Each view deregisters
    /// exactly once, so this is an internal bookkeeping bug.
    pub fn remove(&mut self, handle: ViewHandle) -> u64 {
        let slot = self
            .slots
            .get_mut(handle.index as usize)
            .unwrap_or_else(|| panic!("view handle {:?} out of bounds", handle));
        assert_eq!(
            slot.generation, handle.generation,
            "stale view handle {:?}",
            handle
        );
        let position = slot
            .position
            .take()
            .unwrap_or_else(|| panic!("view handle {:?} already removed", handle));

        self.free.push(handle.index);
        self.live -= 1;

        if self.live == 0 {
            self.heap.clear();
        } else if self.heap.len() > COMPACT_FACTOR * self.live {
            self.compact();
        }
        position
    }

    /// Position of the view behind `handle`, if it is still live.
    #[cfg(test)]
    pub fn position(&self, handle: ViewHandle) -> Option<u64> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.position)
    }

    /// Smallest position among live views, `None` when empty.
    pub fn min(&mut self) -> Option<u64> {
        while let Some(&Reverse((position, index, generation))) = self.heap.peek() {
            if self.is_current(position, index, generation) {
                return Some(position);
            }
            self.heap.pop();
        }
        None
    }

    #[inline]
    fn is_current(&self, position: u64, index: u32, generation: u32) -> bool {
        let slot = &self.slots[index as usize];
        slot.generation == generation && slot.position == Some(position)
    }

    fn compact(&mut self) {
        let slots = &self.slots;
        self.heap.retain(|&Reverse((position, index, generation))| {
            let slot = &slots[index as usize];
            slot.generation == generation && slot.position == Some(position)
        });
    }
}
