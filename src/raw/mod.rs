mod entry;
mod generation;
mod hazard;
mod probe;
mod utils;

pub use hazard::Guard;
pub use probe::DEFAULT_CAPACITY;

use std::hash::{BuildHasher, Hash, Hasher};
use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use equivalent::Equivalent;

use self::entry::Entry;
use self::generation::Generation;
use self::hazard::Registry;
use self::probe::{Probe, Slot, Step};
use self::utils::{trace, StrictProvenance, Tagged};
use crate::map::MigrationMode;

// A lock-free hash table made of a chain of generations.
//
// Operations walk the chain from the oldest generation still linked. Live values
// found in retired generations are copied forward as a side effect, and
// generations are freed once they are drained, unreferenced and unprotected.
pub struct HashMap<K, V, S> {
    // The oldest generation still linked.
    head: AtomicPtr<Generation<K, V>>,
    // Generations unlinked from the chain, waiting to be freed.
    garbage: AtomicPtr<Generation<K, V>>,
    // The hazard pointers of this map.
    registry: Registry,
    // The hasher for keys.
    pub build_hasher: S,
    // How retired generations are drained.
    pub migration: MigrationMode,
    _kv: PhantomData<*const (K, V)>,
}

// Safety: values and keys may be dropped by any thread, and are shared between
// threads through a shared reference to the map.
unsafe impl<K: Send, V: Send, S: Send> Send for HashMap<K, V, S> {}
unsafe impl<K: Send + Sync, V: Send + Sync, S: Sync> Sync for HashMap<K, V, S> {}

// The result of an insert operation.
#[derive(Debug, PartialEq, Eq)]
pub enum InsertResult<V> {
    // The key was not present.
    Inserted,
    // The previous value was replaced.
    Replaced(V),
    // The key was present and replacement was not requested.
    Occupied { current: V, not_inserted: V },
}

// A key-value pair on its way into the table.
//
// The pair is boxed lazily, by the generation it is about to be installed in,
// and handed back to that generation before the walk moves on. An entry shell
// is only ever reused by the generation that allocated it.
struct Pending<K, V> {
    pair: Option<(K, V)>,
    entry: *mut Entry<K, V>,
}

impl<K, V> Pending<K, V> {
    fn new(key: K, value: V) -> Pending<K, V> {
        Pending {
            pair: Some((key, value)),
            entry: ptr::null_mut(),
        }
    }

    fn key(&self) -> &K {
        match &self.pair {
            Some((key, _)) => key,
            // Safety: a boxed entry is initialized and never published while pending.
            None => unsafe { (*self.entry).key() },
        }
    }

    // Returns the pending entry, boxing it in `generation` if needed.
    fn entry_in(&mut self, generation: &Generation<K, V>, hash: u64) -> *mut Entry<K, V> {
        if let Some((key, value)) = self.pair.take() {
            self.entry = generation.create_entry(hash, key, value);
        }

        debug_assert!(ptr::eq(unsafe { (*self.entry).owner }, generation));
        self.entry
    }

    // Hand a boxed entry back to the generation that owns it.
    //
    // # Safety
    //
    // The owning generation must still be pinned.
    unsafe fn unbox(&mut self) {
        if self.pair.is_none() {
            // Safety: the entry was never published, and its owner is pinned.
            self.pair = Some(unsafe { (*(*self.entry).owner).reclaim_unpublished(self.entry) });
            self.entry = ptr::null_mut();
        }
    }

    // # Safety
    //
    // The owning generation of a boxed entry must still be pinned.
    unsafe fn into_pair(mut self) -> (K, V) {
        match self.pair.take() {
            Some(pair) => pair,
            // Safety: guaranteed by the caller.
            None => unsafe { (*(*self.entry).owner).reclaim_unpublished(self.entry) },
        }
    }
}

// A reference count held on a generation while an operation walks it.
struct Pin<K, V> {
    generation: *mut Generation<K, V>,
}

impl<K, V> Pin<K, V> {
    // Returns the pinned generation.
    //
    // The reference must not be used after the pin advances.
    #[inline]
    fn generation<'a>(&self) -> &'a Generation<K, V> {
        // Safety: a pinned generation is not freed.
        unsafe { &*self.generation }
    }

    // Move the pin to the next generation, which must exist.
    fn advance(&mut self) {
        let current = self.generation();
        let next = current.next.load(Ordering::SeqCst);
        debug_assert!(!next.is_null());

        // Safety: generations are freed in chain order, so the successor of a
        // pinned generation is alive.
        unsafe { (*next).ref_count.fetch_add(1, Ordering::SeqCst) };
        current.ref_count.fetch_sub(1, Ordering::SeqCst);

        self.generation = next;
    }
}

impl<K, V> Drop for Pin<K, V> {
    fn drop(&mut self) {
        self.generation().ref_count.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<K, V, S> HashMap<K, V, S> {
    // Creates a map whose first generation has the given capacity.
    pub fn new(capacity: usize, build_hasher: S, migration: MigrationMode) -> HashMap<K, V, S> {
        let head = Generation::alloc(probe::initial_capacity(capacity), true);

        HashMap {
            head: AtomicPtr::new(head),
            garbage: AtomicPtr::new(ptr::null_mut()),
            registry: Registry::new(),
            build_hasher,
            migration,
            _kv: PhantomData,
        }
    }

    // Returns a guard for use with this map.
    #[inline]
    pub fn guard(&self) -> Guard<'_> {
        Guard::new(&self.registry)
    }

    // Pin the head of the chain.
    fn enter(&self, guard: &Guard<'_>) -> Pin<K, V> {
        let head = guard.generation.protect(&self.head).ptr;

        // Safety: the head is protected, so it has not been freed. Once the count is
        // incremented the hazard pointer is no longer needed.
        unsafe { (*head).ref_count.fetch_add(1, Ordering::SeqCst) };
        guard.generation.clear();

        Pin { generation: head }
    }

    // Returns the number of live values, summed over every generation.
    //
    // Under concurrent updates this is only an estimate.
    pub fn len(&self, guard: &Guard<'_>) -> usize {
        let pin = self.enter(guard);

        let mut len = 0_isize;
        let mut generation = pin.generation;
        while !generation.is_null() {
            // Safety: generations after a pinned one are not freed.
            let current = unsafe { &*generation };
            len += current.length.load(Ordering::SeqCst);
            generation = current.next.load(Ordering::SeqCst);
        }

        len.max(0) as usize
    }

    // Returns the capacity of the newest generation.
    pub fn capacity(&self, guard: &Guard<'_>) -> usize {
        let pin = self.enter(guard);

        let mut generation = pin.generation();
        loop {
            let next = generation.next.load(Ordering::SeqCst);
            if next.is_null() {
                return generation.capacity();
            }

            // Safety: generations after a pinned one are not freed.
            generation = unsafe { &*next };
        }
    }

    // Visit every live entry, newest generation first.
    //
    // Under concurrent updates an entry that moves between generations during the
    // walk may be seen twice, or not at all.
    pub fn for_each(&self, guard: &Guard<'_>, mut f: impl FnMut(&K, &V)) {
        let pin = self.enter(guard);

        let mut generations = Vec::new();
        let mut generation = pin.generation;
        while !generation.is_null() {
            generations.push(generation);
            // Safety: generations after a pinned one are not freed.
            generation = unsafe { (*generation).next.load(Ordering::SeqCst) };
        }

        for &generation in generations.iter().rev() {
            // Safety: see above.
            let generation = unsafe { &*generation };

            for i in 0..generation.capacity() {
                let word = generation.protect_entry(guard.entry, i);
                if word.is_null() {
                    continue;
                }

                if word.tag() == Entry::VALUE || word.tag() == Entry::MIGRATING {
                    // Safety: the entry is protected, and live entries are initialized.
                    unsafe {
                        let entry = &*word.ptr;
                        f(entry.key(), entry.value());
                    }
                }
            }
        }

        guard.entry.clear();
    }

    // Push a chain of unlinked generations onto the garbage list.
    fn push_garbage(&self, first: *mut Generation<K, V>, last: *mut Generation<K, V>) {
        if first.is_null() {
            return;
        }

        let mut head = self.garbage.load(Ordering::SeqCst);
        loop {
            // Safety: the chain is owned by the caller.
            unsafe { (*last).link.store(head, Ordering::Relaxed) };

            match self
                .garbage
                .compare_exchange(head, first, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return,
                Err(found) => head = found,
            }
        }
    }

    // Returns the number of linked generations.
    #[cfg(test)]
    fn generations(&self) -> usize {
        let mut count = 0;
        let mut generation = self.head.load(Ordering::SeqCst);
        while !generation.is_null() {
            count += 1;
            generation = unsafe { (*generation).next.load(Ordering::SeqCst) };
        }
        count
    }

    // Returns the number of unlinked generations that are not yet freed.
    #[cfg(test)]
    fn pending_garbage(&self) -> usize {
        let mut count = 0;
        let mut generation = self.garbage.load(Ordering::SeqCst);
        while !generation.is_null() {
            count += 1;
            generation = unsafe { (*generation).link.load(Ordering::SeqCst) };
        }
        count
    }
}

impl<K, V, S> HashMap<K, V, S>
where
    K: Hash + Eq + Clone,
    V: Clone,
    S: BuildHasher,
{
    // Hashes a key with the map's hasher.
    #[inline]
    fn hash<Q: Hash + ?Sized>(&self, key: &Q) -> u64 {
        let mut hasher = self.build_hasher.build_hasher();
        key.hash(&mut hasher);
        hasher.finish()
    }

    // Classify a protected slot word for the given key.
    //
    // # Safety
    //
    // The entry the word points to must be protected.
    #[inline]
    unsafe fn classify<Q>(&self, word: Tagged<Entry<K, V>>, hash: u64, key: &Q) -> Slot
    where
        Q: Equivalent<K> + ?Sized,
    {
        if word.raw.is_null() {
            return Slot::Empty;
        }

        if word.is_null() {
            return Slot::Sealed;
        }

        let entry = unsafe { &*word.ptr };
        Slot::Occupied {
            tag: word.tag(),
            matches: entry.hash == hash && key.equivalent(unsafe { entry.key() }),
        }
    }

    // Returns a clone of the value for a key.
    pub fn get<Q>(&self, key: &Q, guard: &Guard<'_>) -> Option<V>
    where
        Q: Hash + Equivalent<K> + ?Sized,
    {
        let hash = self.hash(key);

        let mut pin = self.enter(guard);
        let value = self
            .find(&mut pin, hash, key, guard)
            // Safety: the entry was found live and is protected.
            .map(|(_, word)| unsafe { (*word.ptr).value().clone() });

        guard.entry.clear();
        value
    }

    // Whether the map holds a live value for a key.
    pub fn contains_key<Q>(&self, key: &Q, guard: &Guard<'_>) -> bool
    where
        Q: Hash + Equivalent<K> + ?Sized,
    {
        let hash = self.hash(key);

        let mut pin = self.enter(guard);
        let found = self.find(&mut pin, hash, key, guard).is_some();

        guard.entry.clear();
        found
    }

    // Find the live entry for a key, starting at the pinned generation.
    //
    // On success, the pin is left on the generation holding the entry, which is
    // protected by `guard.entry`.
    fn find<Q>(
        &self,
        pin: &mut Pin<K, V>,
        hash: u64,
        key: &Q,
        guard: &Guard<'_>,
    ) -> Option<(usize, Tagged<Entry<K, V>>)>
    where
        Q: Equivalent<K> + ?Sized,
    {
        'generations: loop {
            let generation = pin.generation();
            let mut probe = Probe::start(hash, generation.capacity());

            while !probe.exhausted() {
                let word = generation.protect_entry(guard.entry, probe.i);
                // Safety: the entry is protected.
                let slot = unsafe { self.classify(word, hash, key) };

                match probe::decide(slot, generation.is_retired()) {
                    Step::Found => return Some((probe.i, word)),
                    Step::Vacant | Step::Removed => return None,
                    Step::Next => probe.next(),
                    Step::Advance => {
                        pin.advance();
                        continue 'generations;
                    }
                    step => self.help(generation, probe.i, word, step, guard),
                }
            }

            // Reached the end of the newest generation without a match.
            if !generation.is_retired() {
                return None;
            }

            pin.advance();
        }
    }

    // Insert a key-value pair, replacing an existing value if `replace` is set.
    pub fn insert(&self, key: K, value: V, replace: bool, guard: &Guard<'_>) -> InsertResult<V> {
        let hash = self.hash(&key);

        let result = {
            let mut pin = self.enter(guard);
            self.insert_entry(&mut pin, hash, Pending::new(key, value), replace, guard)
        };

        guard.reset();
        self.collect_garbage(guard);
        result
    }

    // Insert a pair into the newest generation, copying forward any value for
    // its key found along the way.
    fn insert_entry(
        &self,
        pin: &mut Pin<K, V>,
        hash: u64,
        mut new: Pending<K, V>,
        replace: bool,
        guard: &Guard<'_>,
    ) -> InsertResult<V> {
        'generations: loop {
            let generation = pin.generation();
            let mut probe = Probe::start(hash, generation.capacity());

            while !probe.exhausted() {
                let word = generation.protect_entry(guard.entry, probe.i);
                // Safety: the entry is protected.
                let slot = unsafe { self.classify(word, hash, new.key()) };

                match probe::decide(slot, generation.is_retired()) {
                    Step::Vacant => {
                        let entry = new.entry_in(generation, hash);

                        // Safety: `entry` is unpublished and owned by `generation`.
                        if unsafe { generation.install(probe.i, entry) }.is_ok() {
                            return InsertResult::Inserted;
                        }

                        // Lost the slot to another thread. Look at what won.
                    }
                    Step::Removed => {
                        let entry = new.entry_in(generation, hash);

                        // Safety: `entry` is unpublished and the tombstone is protected.
                        if unsafe { generation.replace_entry(probe.i, word, entry, &self.registry) }
                            .is_ok()
                        {
                            return InsertResult::Inserted;
                        }
                    }
                    Step::Found if replace => {
                        let entry = new.entry_in(generation, hash);

                        // Safety: as above.
                        if unsafe { generation.replace_entry(probe.i, word, entry, &self.registry) }
                            .is_ok()
                        {
                            // Safety: the replaced entry is still protected.
                            let old = unsafe { (*word.ptr).value().clone() };
                            return InsertResult::Replaced(old);
                        }
                    }
                    Step::Found => {
                        // Safety: the entry is live and protected, and any boxed
                        // entry belongs to the pinned generation.
                        unsafe {
                            let current = (*word.ptr).value().clone();
                            let (_, not_inserted) = new.into_pair();
                            return InsertResult::Occupied {
                                current,
                                not_inserted,
                            };
                        }
                    }
                    Step::Next => probe.next(),
                    Step::Advance => {
                        // Safety: the owner of a boxed entry is still pinned.
                        unsafe { new.unbox() };
                        pin.advance();
                        continue 'generations;
                    }
                    step => self.help(generation, probe.i, word, step, guard),
                }
            }

            // The probe sequence is exhausted. The key belongs in a larger generation.
            if !generation.is_retired() {
                self.resize(generation);
            }

            // Safety: as above.
            unsafe { new.unbox() };
            pin.advance();
        }
    }

    // Remove the value for a key, returning whether a live value was removed.
    pub fn remove<Q>(&self, key: &Q, guard: &Guard<'_>) -> bool
    where
        Q: Hash + Equivalent<K> + ?Sized,
    {
        let hash = self.hash(key);

        let removed = {
            let mut pin = self.enter(guard);

            loop {
                let Some((i, word)) = self.find(&mut pin, hash, key, guard) else {
                    break false;
                };

                let generation = pin.generation();
                debug_assert!(ptr::eq(unsafe { (*word.ptr).owner }, generation));

                if generation.retag(i, word, Entry::TOMBSTONE) {
                    generation.length.fetch_sub(1, Ordering::SeqCst);
                    break true;
                }

                // The entry was replaced, removed or frozen. Search again.
            }
        };

        guard.reset();
        self.collect_garbage(guard);
        removed
    }

    // Remove every live value, keeping all allocated generations.
    //
    // Values inserted concurrently may survive.
    pub fn clear(&self, guard: &Guard<'_>) {
        {
            let mut pin = self.enter(guard);

            loop {
                let generation = pin.generation();

                for i in 0..generation.capacity() {
                    loop {
                        let word = generation.protect_entry(guard.entry, i);
                        if word.is_null() {
                            break;
                        }

                        if word.tag() == Entry::VALUE {
                            if generation.retag(i, word, Entry::TOMBSTONE) {
                                generation.length.fetch_sub(1, Ordering::SeqCst);
                                break;
                            }
                        } else if word.tag() == Entry::MIGRATING {
                            // Finish the copy, so that it is cleared in the newer generation.
                            self.migrate(generation, i, word, guard);
                        } else {
                            break;
                        }
                    }
                }

                if !generation.is_retired() {
                    break;
                }

                pin.advance();
            }
        }

        guard.reset();
        self.collect_garbage(guard);
    }

    // Do the work needed before a walker can move past a slot of a retired generation.
    fn help(
        &self,
        generation: &Generation<K, V>,
        i: usize,
        word: Tagged<Entry<K, V>>,
        step: Step,
        guard: &Guard<'_>,
    ) {
        match step {
            Step::Seal => generation.seal(i),
            Step::Bury => {
                generation.retag(i, word, Entry::SENTINEL);
            }
            Step::Migrate => self.migrate(generation, i, word, guard),
            _ => unreachable!("{step:?} requires no help"),
        }
    }

    // Copy the value in a slot of a retired generation to the newest generation.
    //
    // `word` must be protected by `guard.entry`.
    fn migrate(
        &self,
        generation: &Generation<K, V>,
        i: usize,
        mut word: Tagged<Entry<K, V>>,
        guard: &Guard<'_>,
    ) {
        debug_assert!(generation.is_retired());

        // Freeze the value so it can no longer be updated in place.
        loop {
            if word.is_null() {
                return;
            }

            if word.tag() == Entry::MIGRATING {
                break;
            }

            // Already copied, or removed before it was frozen.
            if word.tag() != Entry::VALUE {
                return;
            }

            if generation.retag(i, word, Entry::MIGRATING) {
                word = word.with_tag(Entry::MIGRATING).unpack();
                break;
            }

            word = generation.protect_entry(guard.entry, i);
        }

        let next = generation.next.load(Ordering::SeqCst);

        // Safety: the entry is protected by `guard.entry`, and the newer generations
        // are not freed before this one.
        unsafe { self.insert_copy(next, &*word.ptr, guard) };

        if generation.retag(i, word, Entry::SENTINEL) {
            generation.length.fetch_sub(1, Ordering::SeqCst);
        }
    }

    // Insert a copy of a frozen entry, starting at the given generation.
    //
    // The copy is dropped if any entry for the key already exists in a newer
    // generation, as that entry was written after the value was frozen.
    //
    // # Safety
    //
    // `source` must be a protected, frozen entry, and `generation` must not be
    // freed for the duration of the call.
    unsafe fn insert_copy(
        &self,
        mut generation: *mut Generation<K, V>,
        source: &Entry<K, V>,
        guard: &Guard<'_>,
    ) {
        let (hash, key) = (source.hash, unsafe { source.key() });
        let mut copy: *mut Entry<K, V> = ptr::null_mut();

        loop {
            let current = unsafe { &*generation };
            let mut probe = Probe::start(hash, current.capacity());

            while !probe.exhausted() {
                let word = current.protect_entry(guard.copy, probe.i);

                if word.raw.is_null() {
                    if current.is_retired() {
                        current.seal(probe.i);
                        continue;
                    }

                    if copy.is_null() {
                        let value = unsafe { source.value() }.clone();
                        copy = current.create_entry(hash, key.clone(), value);
                    }

                    // Safety: the copy is unpublished.
                    if unsafe { current.install(probe.i, copy) }.is_ok() {
                        guard.copy.clear();
                        return;
                    }

                    continue;
                }

                // A sealed slot, nothing more to find in this generation.
                if word.is_null() {
                    break;
                }

                // Safety: the entry is protected by `guard.copy`.
                let entry = unsafe { &*word.ptr };
                if entry.hash == hash && unsafe { entry.key() } == key {
                    if !copy.is_null() {
                        // Safety: the copy was never published to `current`.
                        unsafe { drop(current.reclaim_unpublished(copy)) };
                    }

                    guard.copy.clear();
                    return;
                }

                probe.next();
            }

            if !current.is_retired() {
                self.resize(current);
            }

            // The copy stays with the generation that boxed it.
            if !copy.is_null() {
                // Safety: as above.
                unsafe { drop(current.reclaim_unpublished(copy)) };
                copy = ptr::null_mut();
            }

            generation = current.next.load(Ordering::SeqCst);
        }
    }

    // Link a larger generation after `generation`, unless one is already linked.
    fn resize(&self, generation: &Generation<K, V>) {
        if generation.is_retired() {
            return;
        }

        let capacity = probe::next_capacity(generation.capacity());
        let next = Generation::alloc(capacity, false);

        match generation.next.compare_exchange(
            ptr::null_mut(),
            next,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => {
                trace!("linked generation {:p} with capacity {}", next, capacity);
            }
            // Safety: the generation was never shared.
            Err(_) => unsafe { Generation::dealloc(next) },
        }
    }

    // Copy forward a chunk of slots of a retired generation.
    fn migrate_chunk(&self, generation: &Generation<K, V>, chunk: usize, guard: &Guard<'_>) {
        let capacity = generation.capacity();
        if generation.migrated.load(Ordering::SeqCst) >= capacity {
            return;
        }

        let start = generation.migrated.fetch_add(chunk, Ordering::SeqCst);
        for i in start..start.saturating_add(chunk).min(capacity) {
            loop {
                let word = generation.protect_entry(guard.entry, i);

                if word.raw.is_null() {
                    generation.seal(i);
                    continue;
                }

                if word.is_null() || word.tag() == Entry::TOMBSTONE || word.tag() == Entry::SENTINEL {
                    break;
                }

                self.migrate(generation, i, word, guard);
            }
        }

        guard.entry.clear();
    }

    // Reclaim generations that no operation can reach.
    fn collect_garbage(&self, guard: &Guard<'_>) {
        // The number of generations inspected per call.
        const BATCH: usize = 3;

        let mut claimed = [ptr::null_mut(); BATCH + 1];
        let mut count = 0;

        // Claim a few generations from the shared list, returning the rest.
        let (mut rest_first, mut rest_last): (*mut Generation<K, V>, *mut Generation<K, V>) =
            (ptr::null_mut(), ptr::null_mut());
        let mut list = self.garbage.swap(ptr::null_mut(), Ordering::SeqCst);
        while !list.is_null() {
            // Safety: the detached list is owned by this thread.
            let next = unsafe { (*list).link.load(Ordering::Relaxed) };

            if count < BATCH {
                claimed[count] = list;
                count += 1;
            } else {
                unsafe { (*list).link.store(rest_first, Ordering::Relaxed) };
                if rest_last.is_null() {
                    rest_last = list;
                }
                rest_first = list;
            }

            list = next;
        }
        self.push_garbage(rest_first, rest_last);

        let head = guard.generation.protect(&self.head).ptr;
        // Safety: the head is protected.
        let current = unsafe { &*head };

        if current.is_retired() {
            if let MigrationMode::Incremental(chunk) = self.migration {
                self.migrate_chunk(current, chunk.max(1), guard);
            }

            // The reference count is checked first. An operation that pins the head
            // afterwards sees it retired, and never adds a value to it.
            if current.ref_count.load(Ordering::SeqCst) == 0
                && current.length.load(Ordering::SeqCst) == 0
            {
                let next = current.next.load(Ordering::SeqCst);

                if self
                    .head
                    .compare_exchange(head, next, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
                {
                    trace!("unlinked generation {:p}", head);
                    claimed[count] = head;
                    count += 1;
                }
            }
        }

        guard.generation.clear();

        for &generation in &claimed[..count] {
            // Safety: claimed generations are owned by this thread and not yet freed.
            let current = unsafe { &*generation };

            if current.predecessor_freed.load(Ordering::SeqCst)
                && current.ref_count.load(Ordering::SeqCst) == 0
                && !self.registry.is_protected(generation)
                && current.ref_count.load(Ordering::SeqCst) == 0
            {
                let next = current.next.load(Ordering::SeqCst);

                // Safety: the generation is unlinked, unreferenced and unprotected.
                unsafe { Generation::dealloc(generation) };

                // Safety: `next` is not freed before this generation is.
                unsafe { (*next).predecessor_freed.store(true, Ordering::SeqCst) };

                trace!("freed generation {:p}", generation);
            } else {
                self.push_garbage(generation, generation);
            }
        }
    }
}

impl<K, V, S> Drop for HashMap<K, V, S> {
    fn drop(&mut self) {
        let mut generation = *self.head.get_mut();
        while !generation.is_null() {
            // Safety: we have unique access to the map, and every linked
            // generation is owned by it.
            unsafe {
                let next = (*generation).next.load(Ordering::Relaxed);
                Generation::dealloc(generation);
                generation = next;
            }
        }

        let mut generation = *self.garbage.get_mut();
        while !generation.is_null() {
            // Safety: unlinked generations are owned by the garbage list.
            unsafe {
                let next = (*generation).link.load(Ordering::Relaxed);
                Generation::dealloc(generation);
                generation = next;
            }
        }
    }
}
