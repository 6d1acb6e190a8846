use std::mem::MaybeUninit;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use super::generation::Generation;
use super::utils::Unpack;

// A key-value pair stored in a generation's slot array.
//
// The kind of an entry lives in the tag bits of the slot that points at it, so
// that every state change of a slot is a single compare-and-swap.
#[repr(align(8))]
pub struct Entry<K, V> {
    // The hash of the key.
    pub hash: u64,
    // Initialized while the entry is reachable from a slot or a garbage list.
    pub key: MaybeUninit<K>,
    pub value: MaybeUninit<V>,
    // The generation whose slots and lists hold this entry.
    pub owner: *const Generation<K, V>,
    // The link in a garbage or free list.
    pub next: AtomicPtr<Entry<K, V>>,
}

impl Entry<(), ()> {
    // A live key-value pair.
    pub const VALUE: usize = 0b00;

    // The key was removed.
    pub const TOMBSTONE: usize = 0b01;

    // The value was copied to a newer generation. A null pointer with this tag
    // is a sealed slot, closed to inserts.
    pub const SENTINEL: usize = 0b10;

    // The value is frozen while it is copied to a newer generation. It is still
    // the authoritative value for the key.
    pub const MIGRATING: usize = 0b11;
}

impl<K, V> Unpack for Entry<K, V> {
    const MASK: usize = !(Entry::TOMBSTONE | Entry::SENTINEL);
}

impl<K, V> Entry<K, V> {
    // Allocate a new live entry.
    pub fn boxed(hash: u64, key: K, value: V, owner: *const Generation<K, V>) -> *mut Entry<K, V> {
        Box::into_raw(Box::new(Entry {
            hash,
            key: MaybeUninit::new(key),
            value: MaybeUninit::new(value),
            owner,
            next: AtomicPtr::new(ptr::null_mut()),
        }))
    }

    // Reinitialize an entry shell taken from a free list.
    //
    // # Safety
    //
    // The shell must be uninitialized and unreachable by other threads.
    pub unsafe fn reuse(
        shell: *mut Entry<K, V>,
        hash: u64,
        key: K,
        value: V,
        owner: *const Generation<K, V>,
    ) -> *mut Entry<K, V> {
        unsafe {
            (*shell).hash = hash;
            (*shell).key.write(key);
            (*shell).value.write(value);
            (*shell).owner = owner;
            (*shell).next.store(ptr::null_mut(), Ordering::Relaxed);
        }

        shell
    }

    // Move the key and value out of an entry, leaving an empty shell.
    //
    // # Safety
    //
    // The entry must be initialized and unreachable by other threads.
    pub unsafe fn take(entry: *mut Entry<K, V>) -> (K, V) {
        unsafe {
            (
                (*entry).key.assume_init_read(),
                (*entry).value.assume_init_read(),
            )
        }
    }

    // Drop the key and value of an entry, leaving an empty shell.
    //
    // # Safety
    //
    // The entry must be initialized and unreachable by other threads.
    pub unsafe fn drop_in_place(entry: *mut Entry<K, V>) {
        unsafe {
            (*entry).key.assume_init_drop();
            (*entry).value.assume_init_drop();
        }
    }

    // Deallocate an entry shell without touching its key or value.
    //
    // # Safety
    //
    // The entry must have been allocated with `Entry::boxed` and be unreachable
    // by other threads.
    pub unsafe fn dealloc(entry: *mut Entry<K, V>) {
        unsafe { drop(Box::from_raw(entry)) }
    }

    // Returns a reference to the key.
    //
    // # Safety
    //
    // The entry must be initialized and protected.
    #[inline]
    pub unsafe fn key(&self) -> &K {
        unsafe { self.key.assume_init_ref() }
    }

    // Returns a reference to the value.
    //
    // # Safety
    //
    // The entry must be initialized and protected.
    #[inline]
    pub unsafe fn value(&self) -> &V {
        unsafe { self.value.assume_init_ref() }
    }
}

// A lock-free stack of entries, linked through `Entry::next`.
//
// Entries are only ever removed by detaching the whole stack, so a pop never
// compares against a node that may have been recycled in the meantime.
pub struct EntryStack<K, V> {
    head: AtomicPtr<Entry<K, V>>,
}

impl<K, V> EntryStack<K, V> {
    pub fn new() -> EntryStack<K, V> {
        EntryStack {
            head: AtomicPtr::new(ptr::null_mut()),
        }
    }

    // Detach the entire stack, returning the first entry of the chain.
    pub fn take(&self) -> *mut Entry<K, V> {
        self.head.swap(ptr::null_mut(), Ordering::SeqCst)
    }

    // Push a single entry.
    //
    // # Safety
    //
    // The entry must be exclusively owned by the caller.
    pub unsafe fn push(&self, entry: *mut Entry<K, V>) {
        unsafe { self.push_chain(entry, entry) }
    }

    // Push a chain of entries linked from `first` to `last`.
    //
    // # Safety
    //
    // The chain must be exclusively owned by the caller.
    pub unsafe fn push_chain(&self, first: *mut Entry<K, V>, last: *mut Entry<K, V>) {
        if first.is_null() {
            return;
        }

        let mut head = self.head.load(Ordering::SeqCst);
        loop {
            unsafe { (*last).next.store(head, Ordering::Relaxed) };

            match self
                .head
                .compare_exchange(head, first, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return,
                Err(found) => head = found,
            }
        }
    }

    // Pop a single entry, if any.
    pub fn pop(&self) -> Option<*mut Entry<K, V>> {
        let first = self.take();
        if first.is_null() {
            return None;
        }

        // Safety: the chain was detached, so we own every entry in it.
        unsafe {
            let rest = (*first).next.swap(ptr::null_mut(), Ordering::Relaxed);

            if !rest.is_null() {
                let mut last = rest;
                loop {
                    let next = (*last).next.load(Ordering::Relaxed);
                    if next.is_null() {
                        break;
                    }
                    last = next;
                }

                self.push_chain(rest, last);
            }
        }

        Some(first)
    }

    // Returns a mutable reference to the head of the stack.
    pub fn get_mut(&mut self) -> &mut *mut Entry<K, V> {
        self.head.get_mut()
    }
}

// Call `f` on every entry of a detached chain.
//
// The link of each entry is read before `f` runs, so `f` may free or relink it.
//
// # Safety
//
// The chain must be exclusively owned by the caller.
pub unsafe fn for_each_in_chain<K, V>(mut entry: *mut Entry<K, V>, mut f: impl FnMut(*mut Entry<K, V>)) {
    while !entry.is_null() {
        let next = unsafe { (*entry).next.load(Ordering::Relaxed) };
        f(entry);
        entry = next;
    }
}
