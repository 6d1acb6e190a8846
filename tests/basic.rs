// adapted from: https://github.com/jonhoo/flurry/blob/main/tests/basic.rs

use hazmap::{HashMap, MigrationMode, OccupiedError};

use std::hash::{BuildHasher, BuildHasherDefault, Hasher};
use std::sync::atomic::{AtomicIsize, Ordering};
use std::sync::Arc;

mod common;
use common::{with_map, with_map_hasher};

#[test]
fn new() {
    with_map::<usize, usize>(|map| drop(map()));
}

#[test]
fn clear() {
    with_map::<usize, usize>(|map| {
        let map = map();
        {
            let map = map.pin();
            map.insert(0, 1);
            map.insert(1, 1);
            map.insert(2, 1);
            map.insert(3, 1);
            map.insert(4, 1);
        }
        map.clear();
        assert!(map.is_empty());
        assert_eq!(map.len(), 0);

        for i in 0..5 {
            assert!(map.get(&i).is_none());
        }

        // The map is still usable after a clear.
        map.insert(2, 2);
        assert_eq!(map.get(&2), Some(2));
        assert_eq!(map.len(), 1);
    });
}

#[test]
fn insert() {
    with_map::<usize, usize>(|map| {
        let map = map();
        let old = map.insert(42, 0);
        assert!(old.is_none());
    });
}

#[test]
fn get_empty() {
    with_map::<usize, usize>(|map| {
        let map = map();
        let e = map.get(&42);
        assert!(e.is_none());
    });
}

#[test]
fn remove_empty() {
    with_map::<usize, usize>(|map| {
        let map = map();
        assert!(!map.remove(&42));
    });
}

#[test]
fn insert_and_remove() {
    with_map::<usize, usize>(|map| {
        let map = map();
        map.insert(42, 0);
        assert!(map.remove(&42));
        assert!(map.get(&42).is_none());
        assert!(!map.remove(&42));
    });
}

#[test]
fn insert_and_get() {
    with_map::<usize, usize>(|map| {
        let map = map();
        map.insert(42, 0);

        {
            let map = map.pin();
            let e = map.get(&42).unwrap();
            assert_eq!(e, 0);
        }
    });
}

#[test]
fn reinsert() {
    with_map::<usize, usize>(|map| {
        let map = map();
        map.insert(42, 0);
        let old = map.insert(42, 1);

        assert_eq!(old, Some(0));
        assert_eq!(map.get(&42), Some(1));
        assert_eq!(map.len(), 1);
    });
}

#[test]
fn reinsert_after_remove() {
    with_map::<usize, usize>(|map| {
        let map = map();
        map.insert(42, 0);
        assert!(map.remove(&42));
        assert_eq!(map.len(), 0);

        assert_eq!(map.insert(42, 1), None);
        assert_eq!(map.get(&42), Some(1));
        assert_eq!(map.len(), 1);
    });
}

#[test]
fn put() {
    with_map::<usize, usize>(|map| {
        let map = map();

        assert!(map.put(1, 7, true));
        assert!(map.put(2, 13, true));
        assert_eq!(map.get(&1), Some(7));
        assert_eq!(map.get(&2), Some(13));

        // Keep the existing value.
        assert!(!map.put(2, 10, false));
        assert_eq!(map.get(&2), Some(13));

        assert!(map.put(2, 10, true));
        assert_eq!(map.get(&2), Some(10));

        // Absent keys are inserted either way.
        assert!(map.put(3, 1, false));
        assert_eq!(map.get(&3), Some(1));
        assert_eq!(map.len(), 3);
    });
}

#[test]
fn put_into_single_slot() {
    let map = HashMap::with_capacity(1);

    assert!(map.put(1, 7, true));
    assert!(map.put(2, 13, true));
    assert_eq!(map.get(&1), Some(7));
    assert_eq!(map.get(&2), Some(13));

    assert!(!map.put(2, 10, false));
    assert_eq!(map.get(&2), Some(13));

    assert!(map.put(2, 10, true));
    assert_eq!(map.get(&2), Some(10));

    assert_eq!(map.get(&99), None);

    // The copy is independent of the original.
    let copy = map.clone();
    assert!(map.put(2, 11, true));
    assert_eq!(copy.get(&2), Some(10));
    assert_eq!(map.get(&2), Some(11));
    assert_eq!(copy.get(&1), Some(7));
    assert_eq!(copy.len(), 2);
}

#[test]
fn try_insert() {
    with_map::<usize, usize>(|map| {
        let map = map();

        assert_eq!(map.try_insert(1, 1), Ok(()));
        assert_eq!(
            map.try_insert(1, 2),
            Err(OccupiedError {
                current: 1,
                not_inserted: 2
            })
        );
        assert_eq!(map.get(&1), Some(1));

        assert!(map.remove(&1));
        assert_eq!(map.try_insert(1, 3), Ok(()));
        assert_eq!(map.get(&1), Some(3));
    });
}

#[test]
fn occupied_error_display() {
    let map = HashMap::new();
    map.insert("a", 1);

    let err = map.try_insert("a", 2).unwrap_err();
    assert_eq!(
        err.to_string(),
        "failed to insert 2, key is occupied by 1"
    );
}

#[test]
fn contains_key() {
    with_map::<usize, usize>(|map| {
        let map = map();
        assert!(!map.contains_key(&1));

        map.insert(1, 1);
        assert!(map.contains_key(&1));
        assert!(!map.contains_key(&2));

        map.remove(&1);
        assert!(!map.contains_key(&1));
    });
}

#[test]
fn string_keys() {
    with_map::<String, String>(|map| {
        let map = map();
        map.insert("dog".to_owned(), "woof".to_owned());
        map.insert("cat".to_owned(), "meow".to_owned());

        // Look up by `&str`.
        assert_eq!(map.get("dog").as_deref(), Some("woof"));
        assert!(map.contains_key("cat"));
        assert!(map.remove("cat"));
        assert!(map.get("cat").is_none());
    });
}

#[test]
fn grow_from_one() {
    const ENTRIES: usize = if cfg!(miri) { 256 } else { 10_000 };

    let map = HashMap::with_capacity(1);
    for i in 0..ENTRIES {
        assert_eq!(map.insert(i, i * 2), None);
    }

    assert_eq!(map.len(), ENTRIES);
    assert!(map.capacity() > 1);

    for i in 0..ENTRIES {
        assert_eq!(map.get(&i), Some(i * 2));
    }
}

#[test]
fn grow_and_remove() {
    with_map::<usize, usize>(|map| {
        let map = map();
        let map = map.pin();

        for i in 0..512 {
            map.insert(i, i);
        }

        for i in (0..512).step_by(2) {
            assert!(map.remove(&i));
        }

        assert_eq!(map.len(), 256);
        for i in 0..512 {
            assert_eq!(map.get(&i), if i % 2 == 0 { None } else { Some(i) });
        }
    });
}

#[test]
fn incremental_chunks() {
    for chunk in [0, 1, 7, 1024] {
        let map = HashMap::builder()
            .capacity(1)
            .migration(MigrationMode::Incremental(chunk))
            .build();

        assert_eq!(map.migration(), MigrationMode::Incremental(chunk));

        for i in 0..1024 {
            map.insert(i, i);
        }

        for i in 0..1024 {
            assert_eq!(map.insert(i, i + 1), Some(i));
        }

        assert_eq!(map.len(), 1024);
        for i in 0..1024 {
            assert_eq!(map.get(&i), Some(i + 1));
        }
    }
}

#[test]
fn concurrent_insert() {
    with_map::<usize, usize>(|map| {
        let map = Arc::new(map());

        let map1 = map.clone();
        let t1 = std::thread::spawn(move || {
            for i in 0..64 {
                map1.insert(i, 0);
            }
        });
        let map2 = map.clone();
        let t2 = std::thread::spawn(move || {
            for i in 0..64 {
                map2.insert(i, 1);
            }
        });

        t1.join().unwrap();
        t2.join().unwrap();

        let map = map.pin();
        for i in 0..64 {
            let v = map.get(&i).unwrap();
            assert!(v == 0 || v == 1);
        }
        assert_eq!(map.len(), 64);
    });
}

#[test]
fn concurrent_remove() {
    with_map::<usize, usize>(|map| {
        let map = Arc::new(map());

        {
            let map = map.pin();
            for i in 0..64 {
                map.insert(i, i);
            }
        }

        let map1 = map.clone();
        let t1 = std::thread::spawn(move || {
            let map1 = map1.pin();
            (0..64).filter(|i| map1.remove(i)).count()
        });
        let map2 = map.clone();
        let t2 = std::thread::spawn(move || {
            let map2 = map2.pin();
            (0..64).filter(|i| map2.remove(i)).count()
        });

        let removed = t1.join().unwrap() + t2.join().unwrap();
        assert_eq!(removed, 64);

        // after joining the threads, the map should be empty
        let map = map.pin();
        for i in 0..64 {
            assert!(map.get(&i).is_none());
        }
        assert!(map.is_empty());
    });
}

#[test]
#[cfg_attr(miri, ignore)]
fn concurrent_resize_and_get() {
    with_map::<usize, usize>(|map| {
        let map = Arc::new(map());

        {
            let map = map.pin();
            for i in 0..1024 {
                map.insert(i, i);
            }
        }

        let map1 = map.clone();
        // t1 is inserting new keys to trigger a bunch of resizes
        let t1 = std::thread::spawn(move || {
            let map1 = map1.pin();
            for i in 1024..(1 << 14) {
                map1.insert(i, i);
            }
        });
        let map2 = map.clone();
        // t2 is retrieving existing keys a lot, walking generations as they retire
        let t2 = std::thread::spawn(move || {
            let map2 = map2.pin();
            for _ in 0..32 {
                for i in 0..1024 {
                    let v = map2.get(&i).unwrap();
                    assert_eq!(v, i);
                }
            }
        });

        t1.join().unwrap();
        t2.join().unwrap();

        // make sure all the entries still exist after all the resizes
        {
            let map = map.pin();
            for i in 0..(1 << 14) {
                let v = map.get(&i).unwrap();
                assert_eq!(v, i);
            }
            assert_eq!(map.len(), 1 << 14);
        }
    });
}

#[test]
fn current_kv_dropped() {
    let dropped1 = Arc::new(0);
    let dropped2 = Arc::new(0);

    with_map::<Arc<usize>, Arc<usize>>(|map| {
        let map = map();
        map.insert(dropped1.clone(), dropped2.clone());
        assert_eq!(Arc::strong_count(&dropped1), 2);
        assert_eq!(Arc::strong_count(&dropped2), 2);

        drop(map);

        // dropping the map should immediately drop all keys and values
        assert_eq!(Arc::strong_count(&dropped1), 1);
        assert_eq!(Arc::strong_count(&dropped2), 1);
    });
}

#[test]
fn replaced_values_dropped() {
    // Counts the instances that are alive.
    struct Counted<'a>(&'a AtomicIsize);

    impl<'a> Counted<'a> {
        fn new(live: &'a AtomicIsize) -> Counted<'a> {
            live.fetch_add(1, Ordering::SeqCst);
            Counted(live)
        }
    }

    impl Clone for Counted<'_> {
        fn clone(&self) -> Self {
            Counted::new(self.0)
        }
    }

    impl Drop for Counted<'_> {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    let live = AtomicIsize::new(0);

    with_map::<usize, Counted>(|map| {
        let map = map();
        {
            let map = map.pin();
            for i in 0..256 {
                map.insert(i, Counted::new(&live));
            }

            for i in 0..256 {
                map.insert(i, Counted::new(&live));
            }

            for i in 0..128 {
                map.remove(&i);
            }
        }

        assert_eq!(map.len(), 128);
        assert!(live.load(Ordering::SeqCst) >= 128);

        drop(map);
        assert_eq!(live.load(Ordering::SeqCst), 0);
    });
}

#[test]
fn empty_maps_equal() {
    with_map::<usize, usize>(|map1| {
        let map1 = map1();
        with_map::<usize, usize>(|map2| {
            let map2 = map2();
            assert_eq!(map1, map2);
            assert_eq!(map2, map1);
        });
    });
}

#[test]
fn different_size_maps_not_equal() {
    with_map::<usize, usize>(|map1| {
        let map1 = map1();
        with_map::<usize, usize>(|map2| {
            let map2 = map2();
            {
                let map1 = map1.pin();
                let map2 = map2.pin();

                map1.insert(1, 0);
                map1.insert(2, 0);
                map1.insert(3, 0);

                map2.insert(1, 0);
                map2.insert(2, 0);
            }

            assert_ne!(map1, map2);
            assert_ne!(map2, map1);
        });
    });
}

#[test]
fn same_values_equal() {
    with_map::<usize, usize>(|map1| {
        let map1 = map1();
        with_map::<usize, usize>(|map2| {
            let map2 = map2();
            {
                map1.pin().insert(1, 0);
                map2.pin().insert(1, 0);
            }

            assert_eq!(map1, map2);
            assert_eq!(map2, map1);
        });
    });
}

#[test]
fn different_values_not_equal() {
    with_map::<usize, usize>(|map1| {
        let map1 = map1();
        with_map::<usize, usize>(|map2| {
            let map2 = map2();
            {
                map1.pin().insert(1, 0);
                map2.pin().insert(1, 1);
            }

            assert_ne!(map1, map2);
            assert_ne!(map2, map1);
        });
    });
}

#[test]
fn clone_map_empty() {
    with_map::<&'static str, u32>(|map| {
        let map = map();
        let cloned_map = map.clone();
        assert_eq!(map.len(), cloned_map.len());
        assert_eq!(&map, &cloned_map);
        assert_eq!(cloned_map.len(), 0);
    });
}

#[test]
// Test that same values exists in both maps (original and cloned)
fn clone_map_filled() {
    with_map::<&'static str, u32>(|map| {
        let map = map();
        map.insert("FooKey", 0);
        map.insert("BarKey", 10);
        let cloned_map = map.clone();
        assert_eq!(map.len(), cloned_map.len());
        assert_eq!(&map, &cloned_map);

        // test that we are not mapping the same tables
        map.insert("NewItem", 100);
        assert_ne!(&map, &cloned_map);
        assert_eq!(cloned_map.get("NewItem"), None);
    });
}

#[test]
fn clone_map_across_generations() {
    with_map::<usize, usize>(|map| {
        let map = map();
        for i in 0..1024 {
            map.insert(i, i);
        }
        for i in 0..1024 {
            map.insert(i, i + 1);
        }

        let cloned_map = map.clone();
        assert_eq!(cloned_map.len(), 1024);
        assert_eq!(cloned_map.migration(), map.migration());
        for i in 0..1024 {
            assert_eq!(cloned_map.get(&i), Some(i + 1));
        }
    });
}

#[test]
fn default() {
    with_map::<usize, usize>(|map| {
        let map = map();
        map.pin().insert(42, 0);

        assert_eq!(map.get(&42), Some(0));
    });

    let map: HashMap<usize, usize> = HashMap::default();
    assert!(map.is_empty());
    assert_eq!(map.migration(), MigrationMode::Lazy);
}

#[test]
fn debug() {
    with_map::<usize, usize>(|map| {
        let map = map();
        map.pin().insert(42, 0);
        map.pin().insert(16, 8);

        let formatted = format!("{:?}", map);

        assert!(formatted == "{42: 0, 16: 8}" || formatted == "{16: 8, 42: 0}");
        assert_eq!(format!("{:?}", map.pin()), formatted);
    });
}

#[test]
fn extend() {
    with_map::<usize, usize>(|map| {
        let mut map = map();

        let mut entries: Vec<(usize, usize)> = vec![(42, 0), (16, 6), (38, 42)];
        entries.sort_unstable();

        map.extend(entries.clone().into_iter());

        let mut collected = Vec::new();
        for (key, _) in &entries {
            collected.push((*key, map.get(key).unwrap()));
        }

        assert_eq!(entries, collected);
    });
}

#[test]
fn extend_ref() {
    with_map::<usize, usize>(|map| {
        let map = map();

        let mut entries: Vec<(usize, usize)> = vec![(42, 0), (16, 6), (38, 42)];
        entries.sort_unstable();

        (&map).extend(entries.clone().into_iter());
        assert_eq!(map.len(), 3);

        for (key, value) in &entries {
            assert_eq!(map.get(key), Some(*value));
        }
    });
}

#[test]
fn from_iter_empty() {
    let entries: Vec<(usize, usize)> = Vec::new();
    let map: HashMap<usize, usize> = HashMap::from_iter(entries.into_iter());

    assert_eq!(map.len(), 0)
}

#[test]
fn from_iter_repeated() {
    let map: HashMap<usize, usize> = [(1, 1), (2, 2), (1, 3)].into_iter().collect();

    assert_eq!(map.len(), 2);
    assert_eq!(map.get(&1), Some(3));
    assert_eq!(map.get(&2), Some(2));
}

#[test]
fn len() {
    with_map::<usize, usize>(|map| {
        let map = map();
        let len = if cfg!(miri) { 100 } else { 10_000 };
        for i in 0..len {
            map.pin().insert(i, i + 1);
        }
        assert_eq!(map.len(), len);
    });
}

#[test]
fn mixed() {
    const LEN: usize = if cfg!(miri) { 48 } else { 1024 };
    with_map::<usize, usize>(|map| {
        let map = map();
        assert!(map.get(&100).is_none());
        map.insert(100, 101);
        assert_eq!(map.get(&100), Some(101));
        assert!(map.remove(&100));
        assert!(map.get(&100).is_none());

        for i in 0..LEN {
            assert_eq!(map.insert(i, i + 1), None);
        }

        for i in 0..LEN {
            assert_eq!(map.get(&i), Some(i + 1));
        }

        for i in 0..LEN {
            assert_eq!(map.insert(i, i + 2), Some(i + 1));
        }

        for i in 0..LEN {
            assert_eq!(map.get(&i), Some(i + 2));
        }

        for i in 0..LEN {
            assert!(map.remove(&i));
        }

        for i in 0..LEN {
            assert!(map.get(&i).is_none());
        }

        for i in 0..(LEN * 2) {
            assert_eq!(map.insert(i, i + 1), None);
        }

        for i in 0..(LEN * 2) {
            assert_eq!(map.pin().get(&i), Some(i + 1));
        }

        assert_eq!(map.len(), LEN * 2);
    });
}

// run tests with hashers that create unrealistically long probe sequences
mod hasher {
    use super::*;

    fn check<S: BuildHasher + Default>() {
        let range = if cfg!(miri) { 0..16 } else { 0..100 };

        with_map_hasher::<i32, i32, S>(|map| {
            let map = map();
            let map = map.pin();
            for i in range.clone() {
                map.insert(i, i);
            }

            assert!(!map.contains_key(&i32::MIN));
            assert!(!map.contains_key(&(range.start - 1)));
            for i in range.clone() {
                assert!(map.contains_key(&i));
                assert_eq!(map.get(&i), Some(i));
            }
            assert!(!map.contains_key(&range.end));
            assert!(!map.contains_key(&i32::MAX));
            assert_eq!(map.len(), range.len());

            // Remove every other key and reinsert it.
            for i in range.clone().step_by(2) {
                assert!(map.remove(&i));
            }
            for i in range.clone().step_by(2) {
                assert!(map.get(&i).is_none());
            }
            for i in range.clone().step_by(2) {
                assert_eq!(map.insert(i, -i), None);
            }
            for i in range.clone() {
                let expected = if i % 2 == 0 { -i } else { i };
                assert_eq!(map.get(&i), Some(expected));
            }
            assert_eq!(map.len(), range.len());
        });
    }

    #[test]
    fn test_zero_hasher() {
        #[derive(Default)]
        pub struct ZeroHasher;

        impl Hasher for ZeroHasher {
            fn finish(&self) -> u64 {
                0
            }

            fn write(&mut self, _: &[u8]) {}
        }

        check::<BuildHasherDefault<ZeroHasher>>();
    }

    #[test]
    fn test_max_hasher() {
        #[derive(Default)]
        struct MaxHasher;

        impl Hasher for MaxHasher {
            fn finish(&self) -> u64 {
                u64::MAX
            }

            fn write(&mut self, _: &[u8]) {}
        }

        check::<BuildHasherDefault<MaxHasher>>();
    }

    #[test]
    fn tombstone_then_collision() {
        #[derive(Default)]
        struct ZeroHasher;

        impl Hasher for ZeroHasher {
            fn finish(&self) -> u64 {
                0
            }

            fn write(&mut self, _: &[u8]) {}
        }

        let map: HashMap<u32, u32, BuildHasherDefault<ZeroHasher>> = HashMap::builder()
            .hasher(BuildHasherDefault::default())
            .capacity(3)
            .build();

        // Every key probes from slot 0.
        map.insert(1, 1);
        map.insert(2, 2);
        assert!(map.remove(&1));

        // The tombstone is reused in place.
        map.insert(1, 10);
        assert_eq!(map.get(&1), Some(10));
        assert!(map.remove(&1));

        // Overflow into a new generation while the tombstone is still in the old one.
        map.insert(3, 3);
        map.insert(4, 4);
        assert!(map.capacity() > 3);

        // The key is absent, and a reinsert lands at a different probe index.
        assert_eq!(map.get(&1), None);
        map.insert(1, 20);
        assert_eq!(map.get(&1), Some(20));
        assert_eq!(map.len(), 4);
    }
}
