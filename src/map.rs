use crate::raw::{self, Guard, InsertResult};
use equivalent::Equivalent;

use std::collections::hash_map::RandomState;
use std::error::Error;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::marker::PhantomData;

/// A concurrent hash table.
///
/// Operations on the map never block. Every method takes `&self`, so a map can be
/// shared between threads behind a reference or an [`Arc`](std::sync::Arc).
/// Values are returned by clone, so no reference into the map outlives the call
/// that produced it.
///
/// Each operation acquires a set of hazard pointers from the map. The [`HashMap::pin`]
/// API acquires them once and reuses them across calls. See the
/// [crate-level documentation](crate) for details.
pub struct HashMap<K, V, S = RandomState> {
    raw: raw::HashMap<K, V, S>,
}

/// How values left in retired generations are moved to the newest generation.
///
/// When the map grows, it links a larger generation after the current one. Values
/// in the old generation are copied forward by the operations that walk past them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MigrationMode {
    /// Values are only copied by the operations that walk past them.
    ///
    /// Keys that are rarely accessed may keep old generations alive for longer.
    #[default]
    Lazy,
    /// In addition to lazy copying, every write copies up to the given number of
    /// slots of the oldest generation.
    ///
    /// This bounds the amount of memory held by retired generations, at the
    /// cost of some extra work on writes.
    Incremental(usize),
}

/// A builder for a [`HashMap`].
///
/// # Examples
///
/// ```rust
/// use hazmap::{HashMap, MigrationMode};
/// use std::collections::hash_map::RandomState;
///
/// let map: HashMap<i32, i32> = HashMap::builder()
///     // Set the initial capacity.
///     .capacity(2048)
///     // Set the hasher.
///     .hasher(RandomState::new())
///     // Set the migration mode.
///     .migration(MigrationMode::Incremental(64))
///     // Construct the hash map.
///     .build();
/// ```
pub struct HashMapBuilder<K, V, S = RandomState> {
    hasher: S,
    capacity: usize,
    migration: MigrationMode,
    _kv: PhantomData<(K, V)>,
}

impl<K, V> HashMapBuilder<K, V> {
    /// Set the hash builder used to hash keys.
    ///
    /// Warning: `hash_builder` is normally randomly generated, and is designed
    /// to allow HashMaps to be resistant to attacks that cause many collisions
    /// and very poor performance. Setting it manually using this function can
    /// expose a DoS attack vector.
    pub fn hasher<S>(self, hasher: S) -> HashMapBuilder<K, V, S> {
        HashMapBuilder {
            hasher,
            capacity: self.capacity,
            migration: self.migration,
            _kv: PhantomData,
        }
    }
}

impl<K, V, S> HashMapBuilder<K, V, S> {
    /// Set the initial capacity of the map.
    ///
    /// The capacity is rounded up to an odd number of slots. The map grows when an
    /// insert runs off the end of its probe sequence, so it may grow before it is
    /// full.
    pub fn capacity(self, capacity: usize) -> HashMapBuilder<K, V, S> {
        HashMapBuilder {
            capacity,
            hasher: self.hasher,
            migration: self.migration,
            _kv: PhantomData,
        }
    }

    /// Set the migration mode of the map. See [`MigrationMode`] for details.
    pub fn migration(self, migration: MigrationMode) -> Self {
        HashMapBuilder {
            migration,
            hasher: self.hasher,
            capacity: self.capacity,
            _kv: PhantomData,
        }
    }

    /// Construct a [`HashMap`] from the builder, using the configured options.
    pub fn build(self) -> HashMap<K, V, S> {
        HashMap {
            raw: raw::HashMap::new(self.capacity, self.hasher, self.migration),
        }
    }
}

impl<K, V, S> fmt::Debug for HashMapBuilder<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashMapBuilder")
            .field("capacity", &self.capacity)
            .field("migration", &self.migration)
            .finish()
    }
}

impl<K, V> HashMap<K, V> {
    /// Creates an empty `HashMap`.
    ///
    /// # Examples
    ///
    /// ```
    /// use hazmap::HashMap;
    /// let map: HashMap<&str, i32> = HashMap::new();
    /// ```
    pub fn new() -> HashMap<K, V> {
        HashMap::with_capacity_and_hasher(raw::DEFAULT_CAPACITY, RandomState::new())
    }

    /// Creates an empty `HashMap` with the specified capacity.
    ///
    /// # Examples
    ///
    /// ```
    /// use hazmap::HashMap;
    /// let map: HashMap<&str, i32> = HashMap::with_capacity(10);
    /// ```
    pub fn with_capacity(capacity: usize) -> HashMap<K, V> {
        HashMap::with_capacity_and_hasher(capacity, RandomState::new())
    }

    /// Returns a builder for a `HashMap`.
    ///
    /// The builder can be used for more complex configuration, such as setting
    /// the [`MigrationMode`].
    pub fn builder() -> HashMapBuilder<K, V> {
        HashMapBuilder {
            capacity: raw::DEFAULT_CAPACITY,
            hasher: RandomState::default(),
            migration: MigrationMode::default(),
            _kv: PhantomData,
        }
    }
}

impl<K, V, S> Default for HashMap<K, V, S>
where
    S: Default,
{
    fn default() -> Self {
        HashMap::with_hasher(S::default())
    }
}

impl<K, V, S> HashMap<K, V, S> {
    /// Creates an empty `HashMap` which will use the given hash builder to hash
    /// keys.
    ///
    /// # Examples
    ///
    /// ```
    /// use hazmap::HashMap;
    /// use std::collections::hash_map::RandomState;
    ///
    /// let s = RandomState::new();
    /// let map = HashMap::with_hasher(s);
    /// map.insert(1, 2);
    /// ```
    pub fn with_hasher(hash_builder: S) -> HashMap<K, V, S> {
        HashMap::with_capacity_and_hasher(raw::DEFAULT_CAPACITY, hash_builder)
    }

    /// Creates an empty `HashMap` with the specified capacity, using
    /// `hash_builder` to hash the keys.
    ///
    /// # Examples
    ///
    /// ```
    /// use hazmap::HashMap;
    /// use std::collections::hash_map::RandomState;
    ///
    /// let s = RandomState::new();
    /// let map = HashMap::with_capacity_and_hasher(10, s);
    /// map.insert(1, 2);
    /// ```
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> HashMap<K, V, S> {
        HashMap {
            raw: raw::HashMap::new(capacity, hash_builder, MigrationMode::default()),
        }
    }

    /// Returns a pinned reference to the map.
    ///
    /// The returned reference holds a set of hazard pointers for as long as it
    /// lives, so repeated operations do not acquire them again.
    ///
    /// # Examples
    ///
    /// ```
    /// use hazmap::HashMap;
    ///
    /// let map = HashMap::new();
    /// let m = map.pin();
    /// m.insert("a", 1);
    /// assert_eq!(m.get("a"), Some(1));
    /// ```
    #[inline]
    pub fn pin(&self) -> HashMapRef<'_, K, V, S> {
        HashMapRef {
            guard: self.raw.guard(),
            map: self,
        }
    }

    /// Returns a reference to the map's [`BuildHasher`].
    #[inline]
    pub fn hasher(&self) -> &S {
        &self.raw.build_hasher
    }

    /// Returns the migration mode of the map.
    #[inline]
    pub fn migration(&self) -> MigrationMode {
        self.raw.migration
    }
}

impl<K, V, S> HashMap<K, V, S>
where
    K: Hash + Eq + Clone,
    V: Clone,
    S: BuildHasher,
{
    /// Returns the number of entries in the map.
    ///
    /// The count is exact when no other thread is modifying the map. Under
    /// concurrent updates it is a best-effort snapshot.
    ///
    /// # Examples
    ///
    /// ```
    /// use hazmap::HashMap;
    ///
    /// let map = HashMap::new();
    /// map.insert(1, "a");
    /// map.insert(2, "b");
    /// assert_eq!(map.len(), 2);
    /// ```
    #[inline]
    pub fn len(&self) -> usize {
        self.pin().len()
    }

    /// Returns `true` if the map contains no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of slots in the newest generation of the map.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.pin().capacity()
    }

    /// Returns `true` if the map contains a value for the specified key.
    ///
    /// # Examples
    ///
    /// ```
    /// use hazmap::HashMap;
    ///
    /// let map = HashMap::new();
    /// map.insert(1, "a");
    /// assert_eq!(map.contains_key(&1), true);
    /// assert_eq!(map.contains_key(&2), false);
    /// ```
    #[inline]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        Q: Equivalent<K> + Hash + ?Sized,
    {
        self.pin().contains_key(key)
    }

    /// Returns a clone of the value corresponding to the key.
    ///
    /// # Examples
    ///
    /// ```
    /// use hazmap::HashMap;
    ///
    /// let map = HashMap::new();
    /// map.insert(1, "a");
    /// assert_eq!(map.get(&1), Some("a"));
    /// assert_eq!(map.get(&2), None);
    /// ```
    #[inline]
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        Q: Equivalent<K> + Hash + ?Sized,
    {
        self.pin().get(key)
    }

    /// Inserts a key-value pair into the map.
    ///
    /// If the map did not have this key present, [`None`] is returned. Otherwise
    /// the value is replaced and a clone of the old value is returned.
    ///
    /// # Examples
    ///
    /// ```
    /// use hazmap::HashMap;
    ///
    /// let map = HashMap::new();
    /// assert_eq!(map.insert(37, "a"), None);
    /// assert_eq!(map.insert(37, "b"), Some("a"));
    /// assert_eq!(map.get(&37), Some("b"));
    /// ```
    #[inline]
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.pin().insert(key, value)
    }

    /// Tries to insert a key-value pair into the map.
    ///
    /// If the map already had this key present, nothing is updated, and an
    /// [`OccupiedError`] holding the current value and the rejected value is
    /// returned.
    ///
    /// # Examples
    ///
    /// ```
    /// use hazmap::HashMap;
    ///
    /// let map = HashMap::new();
    /// assert!(map.try_insert(37, "a").is_ok());
    ///
    /// let err = map.try_insert(37, "b").unwrap_err();
    /// assert_eq!(err.current, "a");
    /// assert_eq!(err.not_inserted, "b");
    /// ```
    #[inline]
    pub fn try_insert(&self, key: K, value: V) -> Result<(), OccupiedError<V>> {
        self.pin().try_insert(key, value)
    }

    /// Inserts a key-value pair, replacing an existing value only if `replace`
    /// is set.
    ///
    /// Returns `false` if the key was present and `replace` was not set, in which
    /// case the map is unchanged.
    ///
    /// # Examples
    ///
    /// ```
    /// use hazmap::HashMap;
    ///
    /// let map = HashMap::new();
    /// assert!(map.put(2, 13, true));
    /// assert!(!map.put(2, 10, false));
    /// assert_eq!(map.get(&2), Some(13));
    /// assert!(map.put(2, 10, true));
    /// assert_eq!(map.get(&2), Some(10));
    /// ```
    #[inline]
    pub fn put(&self, key: K, value: V, replace: bool) -> bool {
        self.pin().put(key, value, replace)
    }

    /// Removes a key from the map, returning `true` if it was present.
    ///
    /// # Examples
    ///
    /// ```
    /// use hazmap::HashMap;
    ///
    /// let map = HashMap::new();
    /// map.insert(1, "a");
    /// assert!(map.remove(&1));
    /// assert!(!map.remove(&1));
    /// ```
    #[inline]
    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        Q: Equivalent<K> + Hash + ?Sized,
    {
        self.pin().remove(key)
    }

    /// Clears the map, removing all key-value pairs.
    ///
    /// Allocated capacity is kept. Entries inserted concurrently with the call
    /// may survive it.
    ///
    /// # Examples
    ///
    /// ```
    /// use hazmap::HashMap;
    ///
    /// let map = HashMap::new();
    /// map.insert(1, "a");
    /// map.clear();
    /// assert!(map.is_empty());
    /// ```
    #[inline]
    pub fn clear(&self) {
        self.pin().clear()
    }
}

/// A pinned reference to a [`HashMap`].
///
/// This type is created with [`HashMap::pin`] and can be used to perform many
/// operations with a single set of hazard pointers. It cannot be sent to
/// another thread.
pub struct HashMapRef<'map, K, V, S> {
    guard: Guard<'map>,
    map: &'map HashMap<K, V, S>,
}

impl<'map, K, V, S> HashMapRef<'map, K, V, S>
where
    K: Hash + Eq + Clone,
    V: Clone,
    S: BuildHasher,
{
    /// Returns a reference to the inner [`HashMap`].
    #[inline]
    pub fn map(&self) -> &'map HashMap<K, V, S> {
        self.map
    }

    /// Returns the number of entries in the map.
    ///
    /// See [`HashMap::len`] for details.
    #[inline]
    pub fn len(&self) -> usize {
        self.map.raw.len(&self.guard)
    }

    /// Returns `true` if the map contains no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of slots in the newest generation of the map.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.map.raw.capacity(&self.guard)
    }

    /// Returns `true` if the map contains a value for the specified key.
    ///
    /// See [`HashMap::contains_key`] for details.
    #[inline]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        Q: Equivalent<K> + Hash + ?Sized,
    {
        self.map.raw.contains_key(key, &self.guard)
    }

    /// Returns a clone of the value corresponding to the key.
    ///
    /// See [`HashMap::get`] for details.
    #[inline]
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        Q: Equivalent<K> + Hash + ?Sized,
    {
        self.map.raw.get(key, &self.guard)
    }

    /// Inserts a key-value pair into the map.
    ///
    /// See [`HashMap::insert`] for details.
    #[inline]
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        match self.map.raw.insert(key, value, true, &self.guard) {
            InsertResult::Inserted => None,
            InsertResult::Replaced(old) => Some(old),
            InsertResult::Occupied { .. } => unreachable!(),
        }
    }

    /// Tries to insert a key-value pair into the map.
    ///
    /// See [`HashMap::try_insert`] for details.
    #[inline]
    pub fn try_insert(&self, key: K, value: V) -> Result<(), OccupiedError<V>> {
        match self.map.raw.insert(key, value, false, &self.guard) {
            InsertResult::Inserted => Ok(()),
            InsertResult::Replaced(_) => unreachable!(),
            InsertResult::Occupied {
                current,
                not_inserted,
            } => Err(OccupiedError {
                current,
                not_inserted,
            }),
        }
    }

    /// Inserts a key-value pair, replacing an existing value only if `replace`
    /// is set.
    ///
    /// See [`HashMap::put`] for details.
    #[inline]
    pub fn put(&self, key: K, value: V, replace: bool) -> bool {
        !matches!(
            self.map.raw.insert(key, value, replace, &self.guard),
            InsertResult::Occupied { .. }
        )
    }

    /// Removes a key from the map, returning `true` if it was present.
    ///
    /// See [`HashMap::remove`] for details.
    #[inline]
    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        Q: Equivalent<K> + Hash + ?Sized,
    {
        self.map.raw.remove(key, &self.guard)
    }

    /// Clears the map, removing all key-value pairs.
    ///
    /// See [`HashMap::clear`] for details.
    #[inline]
    pub fn clear(&self) {
        self.map.raw.clear(&self.guard)
    }
}

impl<K, V, S> fmt::Debug for HashMapRef<'_, K, V, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        self.map.raw.for_each(&self.guard, |key, value| {
            map.entry(key, value);
        });
        map.finish()
    }
}

impl<K, V, S> fmt::Debug for HashMap<K, V, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.raw.guard();

        let mut map = f.debug_map();
        self.raw.for_each(&guard, |key, value| {
            map.entry(key, value);
        });
        map.finish()
    }
}

impl<K, V, S> PartialEq for HashMap<K, V, S>
where
    K: Hash + Eq + Clone,
    V: PartialEq + Clone,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }

        let (guard1, guard2) = (self.raw.guard(), other.raw.guard());

        let mut equal = true;
        self.raw.for_each(&guard1, |key, value| {
            if equal && other.raw.get(key, &guard2).as_ref() != Some(value) {
                equal = false;
            }
        });

        equal
    }
}

impl<K, V, S> Eq for HashMap<K, V, S>
where
    K: Hash + Eq + Clone,
    V: Eq + Clone,
    S: BuildHasher,
{
}

impl<K, V, S> Clone for HashMap<K, V, S>
where
    K: Hash + Eq + Clone,
    V: Clone,
    S: BuildHasher + Clone,
{
    /// Creates an independent copy of the map.
    ///
    /// Every live entry is inserted into a new map, without replacing keys that
    /// were already copied. Newer generations are visited first, so the newest
    /// value of a key wins.
    fn clone(&self) -> HashMap<K, V, S> {
        let guard = self.raw.guard();

        let other = HashMap {
            raw: raw::HashMap::new(
                self.raw.capacity(&guard),
                self.raw.build_hasher.clone(),
                self.raw.migration,
            ),
        };

        {
            let other_guard = other.raw.guard();
            self.raw.for_each(&guard, |key, value| {
                other
                    .raw
                    .insert(key.clone(), value.clone(), false, &other_guard);
            });
        }

        other
    }
}

impl<K, V, S> Extend<(K, V)> for &HashMap<K, V, S>
where
    K: Hash + Eq + Clone,
    V: Clone,
    S: BuildHasher,
{
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        let map = self.pin();
        for (key, value) in iter {
            map.insert(key, value);
        }
    }
}

impl<K, V, S> Extend<(K, V)> for HashMap<K, V, S>
where
    K: Hash + Eq + Clone,
    V: Clone,
    S: BuildHasher,
{
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        (&*self).extend(iter)
    }
}

impl<K, V, S> FromIterator<(K, V)> for HashMap<K, V, S>
where
    K: Hash + Eq + Clone,
    V: Clone,
    S: BuildHasher + Default,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let iter = iter.into_iter();
        let (lower, _) = iter.size_hint();

        let mut map = HashMap::with_capacity_and_hasher(lower, S::default());
        map.extend(iter);
        map
    }
}

/// An error returned by [`HashMap::try_insert`] when the key already exists.
///
/// Contains a clone of the existing value, and the value that was not inserted.
#[derive(Debug, PartialEq, Eq)]
pub struct OccupiedError<V> {
    /// The value in the map that was already present.
    pub current: V,
    /// The value which was not inserted, because the entry was already occupied.
    pub not_inserted: V,
}

impl<V: fmt::Debug> fmt::Display for OccupiedError<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to insert {:?}, key is occupied by {:?}",
            self.not_inserted, self.current
        )
    }
}

impl<V: fmt::Debug> Error for OccupiedError<V> {}
