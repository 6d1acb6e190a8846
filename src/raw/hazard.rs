use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};

use super::utils::{trace, StrictProvenance, Tagged, Unpack};

// A list of hazard pointers owned by one map.
//
// Nodes are allocated on demand and reused through their `active` flag. They
// are only freed when the registry itself is dropped.
pub struct Registry {
    head: AtomicPtr<HazardPointer>,
}

// A slot through which a thread announces the address it is reading.
pub struct HazardPointer {
    // Whether the slot is owned by a guard.
    active: AtomicBool,
    // The protected address, or null.
    value: AtomicPtr<()>,
    // The next node in the registry, immutable once published.
    next: *mut HazardPointer,
}

impl Registry {
    pub fn new() -> Registry {
        Registry {
            head: AtomicPtr::new(ptr::null_mut()),
        }
    }

    // Claims an unused hazard pointer, allocating a new one if every slot is taken.
    pub fn acquire(&self) -> &HazardPointer {
        let mut node = self.head.load(Ordering::SeqCst);

        while !node.is_null() {
            // Safety: nodes are never freed while the registry is alive.
            let hazard = unsafe { &*node };

            if !hazard.active.load(Ordering::Relaxed)
                && hazard
                    .active
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::Relaxed)
                    .is_ok()
            {
                return hazard;
            }

            node = hazard.next;
        }

        let node = Box::into_raw(Box::new(HazardPointer {
            active: AtomicBool::new(true),
            value: AtomicPtr::new(ptr::null_mut()),
            next: ptr::null_mut(),
        }));

        let mut head = self.head.load(Ordering::SeqCst);
        loop {
            // Safety: the node is not yet shared.
            unsafe { (*node).next = head };

            match self
                .head
                .compare_exchange(head, node, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => break,
                Err(found) => head = found,
            }
        }

        trace!("allocated hazard pointer {:p}", node);

        // Safety: the node was just published and lives as long as the registry.
        unsafe { &*node }
    }

    // Returns a hazard pointer to the registry.
    //
    // The protected address is cleared before the slot is made available.
    pub fn release(&self, hazard: &HazardPointer) {
        hazard.value.store(ptr::null_mut(), Ordering::SeqCst);
        hazard.active.store(false, Ordering::Release);
    }

    // Whether any hazard pointer currently protects `addr`.
    pub fn is_protected<T>(&self, addr: *mut T) -> bool {
        let addr = addr.cast::<()>();
        let mut node = self.head.load(Ordering::SeqCst);

        while !node.is_null() {
            // Safety: nodes are never freed while the registry is alive.
            let hazard = unsafe { &*node };

            if hazard.value.load(Ordering::SeqCst) == addr {
                return true;
            }

            node = hazard.next;
        }

        false
    }

    // Returns the number of hazard pointers ever allocated.
    #[cfg(test)]
    pub fn slots(&self) -> usize {
        let mut count = 0;
        let mut node = self.head.load(Ordering::SeqCst);
        while !node.is_null() {
            count += 1;
            node = unsafe { (*node).next };
        }
        count
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        let mut node = *self.head.get_mut();

        while !node.is_null() {
            // Safety: we have unique access to the registry, and every node was
            // allocated with `Box`.
            let hazard = unsafe { Box::from_raw(node) };
            node = hazard.next;
        }
    }
}

impl HazardPointer {
    // Protect the pointer stored in `source`.
    //
    // The address is published and then re-read until the two agree, at which
    // point the returned pointer cannot be reclaimed until this slot is cleared
    // or overwritten. Tag changes count as a new value.
    pub fn protect<T: Unpack>(&self, source: &AtomicPtr<T>) -> Tagged<T> {
        let mut raw = source.load(Ordering::SeqCst);

        loop {
            self.value
                .store(raw.unpack().ptr.cast::<()>(), Ordering::SeqCst);

            let current = source.load(Ordering::SeqCst);
            if current == raw {
                return raw.unpack();
            }

            raw = current;
        }
    }

    // Protect an address that is already known to be safe to read.
    #[cfg(test)]
    pub fn set<T>(&self, addr: *mut T) {
        self.value.store(addr.cast::<()>(), Ordering::SeqCst);
    }

    // Stop protecting the current address.
    pub fn clear(&self) {
        self.value.store(ptr::null_mut(), Ordering::SeqCst);
    }
}

/// A set of hazard pointers held by one map operation.
///
/// A guard protects the generation an operation enters through, the entry it
/// is reading, and the entry it is copying. It must stay on the thread that
/// created it.
pub struct Guard<'map> {
    registry: &'map Registry,
    pub(crate) generation: &'map HazardPointer,
    pub(crate) entry: &'map HazardPointer,
    pub(crate) copy: &'map HazardPointer,
    _unsend: PhantomData<*mut ()>,
}

impl<'map> Guard<'map> {
    pub(crate) fn new(registry: &'map Registry) -> Guard<'map> {
        Guard {
            registry,
            generation: registry.acquire(),
            entry: registry.acquire(),
            copy: registry.acquire(),
            _unsend: PhantomData,
        }
    }

    // Clears every address protected by this guard.
    pub(crate) fn reset(&self) {
        self.generation.clear();
        self.entry.clear();
        self.copy.clear();
    }
}

impl Drop for Guard<'_> {
    fn drop(&mut self) {
        self.registry.release(self.generation);
        self.registry.release(self.entry);
        self.registry.release(self.copy);
    }
}

impl std::fmt::Debug for Guard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Guard").finish_non_exhaustive()
    }
}
