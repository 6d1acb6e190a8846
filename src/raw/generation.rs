use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicIsize, AtomicPtr, AtomicUsize, Ordering};

use super::entry::{for_each_in_chain, Entry, EntryStack};
use super::hazard::{HazardPointer, Registry};
use super::utils::{null_tagged, StrictProvenance, Tagged, Unpack};

// One fixed-capacity, open-addressed array of entry slots.
//
// A generation is retired once `next` is set. Retired generations never accept
// new entries, but keep answering for keys that have not been copied forward yet.
pub struct Generation<K, V> {
    // The slot array. The capacity is always odd.
    slots: Box<[AtomicPtr<Entry<K, V>>]>,
    // The number of live values in this generation.
    pub length: AtomicIsize,
    // The number of operations currently walking this generation.
    pub ref_count: AtomicUsize,
    // The generation that replaced this one, set at most once.
    pub next: AtomicPtr<Generation<K, V>>,
    // The link in the map's list of unlinked generations.
    pub link: AtomicPtr<Generation<K, V>>,
    // Cursor for incremental migration.
    pub migrated: AtomicUsize,
    // Whether every older generation has been freed.
    pub predecessor_freed: AtomicBool,
    // Entries replaced in a slot, waiting for their hazard pointers to clear.
    pub garbage: EntryStack<K, V>,
    // Uninitialized entry shells available for reuse.
    pub free: EntryStack<K, V>,
}

impl<K, V> Unpack for Generation<K, V> {
    const MASK: usize = !0;
}

impl<K, V> Generation<K, V> {
    // Allocate a generation with the given (odd) capacity.
    pub fn alloc(capacity: usize, predecessor_freed: bool) -> *mut Generation<K, V> {
        debug_assert!(capacity % 2 == 1);

        let slots = (0..capacity)
            .map(|_| AtomicPtr::new(ptr::null_mut()))
            .collect::<Box<[_]>>();

        Box::into_raw(Box::new(Generation {
            slots,
            length: AtomicIsize::new(0),
            ref_count: AtomicUsize::new(0),
            next: AtomicPtr::new(ptr::null_mut()),
            link: AtomicPtr::new(ptr::null_mut()),
            migrated: AtomicUsize::new(0),
            predecessor_freed: AtomicBool::new(predecessor_freed),
            garbage: EntryStack::new(),
            free: EntryStack::new(),
        }))
    }

    // Returns the number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    // Returns the slot at the given index.
    #[inline]
    pub fn slot(&self, i: usize) -> &AtomicPtr<Entry<K, V>> {
        &self.slots[i]
    }

    // Whether a newer generation has been linked after this one.
    #[inline]
    pub fn is_retired(&self) -> bool {
        !self.next.load(Ordering::SeqCst).is_null()
    }

    // Protect the entry in the given slot, returning the verified slot word.
    #[inline]
    pub fn protect_entry(&self, hazard: &HazardPointer, i: usize) -> Tagged<Entry<K, V>> {
        hazard.protect(self.slot(i))
    }

    // Create a live entry owned by this generation, reusing a free shell if possible.
    pub fn create_entry(&self, hash: u64, key: K, value: V) -> *mut Entry<K, V> {
        match self.free.pop() {
            // Safety: shells on the free list are uninitialized and unreachable.
            Some(shell) => unsafe { Entry::reuse(shell, hash, key, value, self) },
            None => Entry::boxed(hash, key, value, self),
        }
    }

    // Return an entry that was never published to this generation's free list,
    // handing back its key and value.
    //
    // # Safety
    //
    // The entry must be initialized and unreachable by other threads.
    pub unsafe fn reclaim_unpublished(&self, entry: *mut Entry<K, V>) -> (K, V) {
        unsafe {
            let pair = Entry::take(entry);
            self.free.push(entry);
            pair
        }
    }

    // Install a new entry into an empty slot.
    //
    // # Safety
    //
    // `new` must be an initialized, unpublished entry.
    pub unsafe fn install(&self, i: usize, new: *mut Entry<K, V>) -> Result<(), *mut Entry<K, V>> {
        debug_assert!(ptr::eq(unsafe { (*new).owner }, self));

        match self.slot(i).compare_exchange(
            ptr::null_mut(),
            new,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => {
                self.length.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            Err(found) => Err(found),
        }
    }

    // Close an empty slot of a retired generation to inserts.
    pub fn seal(&self, i: usize) {
        debug_assert!(self.is_retired());

        let _ = self.slot(i).compare_exchange(
            ptr::null_mut(),
            null_tagged(Entry::SENTINEL),
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    // Change the tag of an entry without replacing it.
    pub fn retag(&self, i: usize, current: Tagged<Entry<K, V>>, tag: usize) -> bool {
        self.slot(i)
            .compare_exchange(
                current.raw,
                current.with_tag(tag),
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    // Replace the entry in a slot with a new live entry.
    //
    // On success, the replaced entry is retired to the garbage list, and any
    // garbage no longer protected by a hazard pointer is recycled.
    //
    // # Safety
    //
    // `new` must be an initialized, unpublished entry, and `expected` must be
    // protected by the caller.
    pub unsafe fn replace_entry(
        &self,
        i: usize,
        expected: Tagged<Entry<K, V>>,
        new: *mut Entry<K, V>,
        registry: &Registry,
    ) -> Result<(), *mut Entry<K, V>> {
        debug_assert!(!expected.is_null());
        debug_assert!(ptr::eq(unsafe { (*new).owner }, self));

        if let Err(found) =
            self.slot(i)
                .compare_exchange(expected.raw, new, Ordering::SeqCst, Ordering::SeqCst)
        {
            return Err(found);
        }

        // Replacing a tombstone makes the key live again.
        if expected.tag() == Entry::TOMBSTONE {
            self.length.fetch_add(1, Ordering::SeqCst);
        }

        // Safety: the old entry is no longer reachable from the slot, and we
        // detach the garbage list before touching it.
        unsafe { self.recycle(expected.ptr, registry) };

        Ok(())
    }

    // Partition the garbage list into entries that are still protected and
    // entries that can be reused, then retire `replaced`.
    unsafe fn recycle(&self, replaced: *mut Entry<K, V>, registry: &Registry) {
        let garbage = self.garbage.take();

        let mut keep_first = replaced;
        let (mut free_first, mut free_last): (*mut Entry<K, V>, *mut Entry<K, V>) =
            (ptr::null_mut(), ptr::null_mut());

        unsafe {
            (*replaced).next.store(ptr::null_mut(), Ordering::Relaxed);

            for_each_in_chain(garbage, |entry| {
                if registry.is_protected(entry) {
                    (*entry).next.store(keep_first, Ordering::Relaxed);
                    keep_first = entry;
                } else {
                    Entry::drop_in_place(entry);

                    (*entry).next.store(free_first, Ordering::Relaxed);
                    free_first = entry;
                    if free_last.is_null() {
                        free_last = entry;
                    }
                }
            });

            self.garbage.push_chain(keep_first, replaced);
            self.free.push_chain(free_first, free_last);
        }
    }

    // Free a generation along with every entry it owns.
    //
    // # Safety
    //
    // The generation must be unreachable by any other thread.
    pub unsafe fn dealloc(generation: *mut Generation<K, V>) {
        let mut generation = unsafe { Box::from_raw(generation) };

        for slot in generation.slots.iter_mut() {
            let entry = slot.get_mut().unpack();
            if entry.is_null() {
                continue;
            }

            // Safety: entries in a slot are initialized, and owned by this generation.
            unsafe {
                Entry::drop_in_place(entry.ptr);
                Entry::dealloc(entry.ptr);
            }
        }

        unsafe {
            for_each_in_chain(*generation.garbage.get_mut(), |entry| {
                Entry::drop_in_place(entry);
                Entry::dealloc(entry);
            });

            for_each_in_chain(*generation.free.get_mut(), |entry| Entry::dealloc(entry));
        }
    }
}
