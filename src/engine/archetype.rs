//! # Archetype Table and Entity Identity
//!
//! An archetype is one distinct unordered set of component types. Every
//! entity belongs to exactly one archetype for its whole lifetime; the
//! archetype record owns the identity state that makes entity handles
//! survive physical relocation:
//!
//! - `generation` — one counter per logical slot ever allocated, the sole
//!   liveness oracle for handles,
//! - `free_indices` — FIFO queue of logical slots released by destruction,
//! - `alive_count` — current population, which is also the occupancy of
//!   every component range the archetype owns.
//!
//! ## Design
//! - Member components are recorded as a contiguous run of
//!   [`ComponentRef`] entries in the context's shared ref table, sorted by
//!   component id. Sorting canonicalizes declaration (any permutation of
//!   the same set resolves to the same archetype) and enables binary-search
//!   lookup.
//! - Refs carry integer indices into the store and range tables, resolved
//!   once during `setup`. No pointers, no back-references.
//!
//! ## Invariants
//! - A logical index is either alive (generation matches the last handle
//!   issued for it), queued exactly once in `free_indices`, or never yet
//!   allocated (`>= generation.len()`).
//! - A dead handle's generation is strictly below the slot's current
//!   generation (modulo wrap-around of the 16-bit counter).
//! - `alive_count + free_indices.len() == generation.len()` at all times.

use std::collections::VecDeque;

use crate::engine::types::{ComponentId, Generation, LogicalIndex};

/// One member component of an archetype.
///
/// Cross-references are plain integer indices, resolved during `setup`:
/// `store_index` selects the component store, `range_index` the archetype's
/// range inside that store's range table.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ComponentRef {
    /// Id of the member component.
    pub(crate) component_id: ComponentId,

    /// Index of the component's store in the context store table.
    pub(crate) store_index: u16,

    /// Index of this archetype's range in the store's range table.
    pub(crate) range_index: u16,
}

/// One distinct set of component types and its entity identity state.
pub(crate) struct Archetype {
    /// First entry of this archetype's run in the shared ref table.
    pub(crate) refs_first: u32,

    /// Number of member components.
    pub(crate) refs_count: u32,

    /// Current number of live entities.
    pub(crate) alive_count: u32,

    /// Per-logical-slot generation counters; length is the high-water mark
    /// of slots ever allocated.
    pub(crate) generation: Vec<Generation>,

    /// Logical slots released by destruction, reused in FIFO order.
    pub(crate) free_indices: VecDeque<LogicalIndex>,
}

impl Archetype {
    pub(crate) fn new(refs_first: u32, refs_count: u32) -> Self {
        Self {
            refs_first,
            refs_count,
            alive_count: 0,
            generation: Vec::new(),
            free_indices: VecDeque::new(),
        }
    }

    /// Span of this archetype's entries in the shared ref table.
    #[inline]
    pub(crate) fn refs_span(&self) -> std::ops::Range<usize> {
        self.refs_first as usize..(self.refs_first + self.refs_count) as usize
    }

    /// Pops the oldest freed logical slot, if any.
    #[inline]
    pub(crate) fn take_free_index(&mut self) -> Option<LogicalIndex> {
        self.free_indices.pop_front()
    }

    /// Allocates a fresh logical slot past the high-water mark.
    ///
    /// The caller must grow the `logical_to_physical` table of every range
    /// the archetype owns by one entry in the same step.
    #[inline]
    pub(crate) fn allocate_fresh_index(&mut self) -> LogicalIndex {
        let index = self.generation.len() as LogicalIndex;
        self.generation.push(0);
        index
    }

    /// Retires a logical slot on destruction: bumps its generation so all
    /// outstanding handles die, and queues it for FIFO reuse.
    #[inline]
    pub(crate) fn retire_index(&mut self, index: LogicalIndex) {
        let slot = &mut self.generation[index as usize];
        *slot = slot.wrapping_add(1);
        self.free_indices.push_back(index);
    }

    /// Returns whether a handle with this generation and index is alive.
    #[inline]
    pub(crate) fn handle_alive(&self, generation: Generation, index: LogicalIndex) -> bool {
        self.generation
            .get(index as usize)
            .map_or(false, |current| *current == generation)
    }

    /// Kills every live entity without touching component storage.
    ///
    /// Every allocated slot's generation is bumped and the free queue is
    /// rebuilt in index order. Never-allocated indices are unaffected.
    pub(crate) fn reset(&mut self) {
        self.alive_count = 0;
        self.free_indices.clear();
        for (index, generation) in self.generation.iter_mut().enumerate() {
            *generation = generation.wrapping_add(1);
            self.free_indices.push_back(index as LogicalIndex);
        }
    }
}
