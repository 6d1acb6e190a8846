use super::entry::Entry;

// The capacity of a map created without an explicit capacity.
pub const DEFAULT_CAPACITY: usize = 15;

// Normalize a requested capacity to a valid (odd, non-zero) generation capacity.
#[inline]
pub fn initial_capacity(capacity: usize) -> usize {
    capacity.max(1) | 1
}

// Returns the capacity of the generation that replaces one of `capacity` slots.
//
// Generations grow by roughly half, and capacities are always odd.
#[inline]
pub fn next_capacity(capacity: usize) -> usize {
    capacity
        .checked_add(capacity / 2)
        .and_then(|capacity| capacity.checked_add(1))
        .map(|capacity| capacity | 1)
        .expect("hash table exceeded maximum capacity")
}

// A linear probe sequence that stops at the end of the slot array.
pub struct Probe {
    // The current index in the probe sequence.
    pub i: usize,
    // The number of slots.
    capacity: usize,
}

impl Probe {
    // Start probing for a hash in a generation of the given capacity.
    #[inline]
    pub fn start(hash: u64, capacity: usize) -> Probe {
        Probe {
            i: (hash % capacity as u64) as usize,
            capacity,
        }
    }

    // Whether the probe ran past the last slot.
    #[inline]
    pub fn exhausted(&self) -> bool {
        self.i >= self.capacity
    }

    // Move on to the next slot.
    #[inline]
    pub fn next(&mut self) {
        self.i += 1;
    }
}

// The contents of a slot, as seen by a walker looking for a given key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    // The slot was never written.
    Empty,
    // An empty slot that was closed after its generation retired.
    Sealed,
    // An entry with the given tag, and whether its key is the one being searched for.
    Occupied { tag: usize, matches: bool },
}

// What a walker does with the slot it is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    // The key is absent. An insert claims this empty slot.
    Vacant,
    // The key was removed here. An insert replaces the tombstone.
    Removed,
    // The slot holds the live value for the key.
    Found,
    // A live value in a retired generation, which must be copied forward before
    // the walk continues.
    Migrate,
    // An empty slot in a retired generation, which must be sealed before the
    // walk continues.
    Seal,
    // A tombstone for the key in a retired generation, which must be closed
    // before the walk continues.
    Bury,
    // The key cannot be in this generation. Continue in the next one.
    Advance,
    // Keep probing.
    Next,
}

// Decide what to do with a slot.
//
// A key occupies at most one slot per generation: the first empty or matching
// slot of its probe sequence. Matching a tombstone or sentinel therefore ends
// the search in that generation.
pub fn decide(slot: Slot, retired: bool) -> Step {
    match slot {
        Slot::Empty if retired => Step::Seal,
        Slot::Empty => Step::Vacant,
        Slot::Sealed => Step::Advance,
        // Frozen values are only ever found in retired generations.
        Slot::Occupied { tag, .. } if tag == Entry::MIGRATING => Step::Migrate,
        Slot::Occupied { tag, .. } if tag == Entry::VALUE && retired => Step::Migrate,
        Slot::Occupied { matches: false, .. } => Step::Next,
        Slot::Occupied { tag, .. } if tag == Entry::VALUE => Step::Found,
        Slot::Occupied { tag, .. } if tag == Entry::TOMBSTONE && retired => Step::Bury,
        Slot::Occupied { tag, .. } if tag == Entry::TOMBSTONE => Step::Removed,
        Slot::Occupied { .. } => Step::Advance,
    }
}
