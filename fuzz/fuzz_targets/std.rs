#![no_main]

use libfuzzer_sys::fuzz_target;

use arbitrary::Arbitrary;
use hazmap::{HashMap as HazHashMap, MigrationMode};
use std::collections::HashMap as StdHashMap;

#[derive(Debug, Arbitrary)]
enum Operation<K, V> {
    Insert(K, V),
    TryInsert(K, V),
    Remove(K),
    Get(K),
    Contains(K),
    Clear,
    Len,
    IsEmpty,
}

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    capacity: u8,
    incremental: Option<u8>,
    operations: Vec<Operation<u8, u32>>,
}

fn fuzz_hashmap(input: FuzzInput) {
    let migration = match input.incremental {
        Some(chunk) => MigrationMode::Incremental(chunk as usize),
        None => MigrationMode::Lazy,
    };

    let mut std_map = StdHashMap::new();
    let haz_raw = HazHashMap::builder()
        .capacity(input.capacity as usize)
        .migration(migration)
        .build();
    let haz_map = haz_raw.pin();

    for op in input.operations {
        match op {
            Operation::Insert(k, v) => {
                let std_result = std_map.insert(k, v);
                let haz_result = haz_map.insert(k, v);
                assert_eq!(std_result, haz_result);
            }
            Operation::TryInsert(k, v) => {
                let std_result = match std_map.get(&k) {
                    Some(current) => Err((*current, v)),
                    None => {
                        std_map.insert(k, v);
                        Ok(())
                    }
                };
                let haz_result = haz_map
                    .try_insert(k, v)
                    .map_err(|err| (err.current, err.not_inserted));
                assert_eq!(std_result, haz_result);
            }
            Operation::Remove(k) => {
                let std_result = std_map.remove(&k).is_some();
                let haz_result = haz_map.remove(&k);
                assert_eq!(std_result, haz_result);
            }
            Operation::Get(k) => {
                let std_result = std_map.get(&k).copied();
                let haz_result = haz_map.get(&k);
                assert_eq!(std_result, haz_result);
            }
            Operation::Contains(k) => {
                let std_result = std_map.contains_key(&k);
                let haz_result = haz_map.contains_key(&k);
                assert_eq!(std_result, haz_result);
            }
            Operation::Clear => {
                std_map.clear();
                haz_map.clear();
            }
            Operation::Len => {
                assert_eq!(std_map.len(), haz_map.len());
            }
            Operation::IsEmpty => {
                assert_eq!(std_map.is_empty(), haz_map.is_empty());
            }
        }
    }

    // Final consistency checks
    for (k, v) in std_map.iter() {
        assert_eq!(Some(*v), haz_map.get(k));
    }
    assert_eq!(std_map.len(), haz_map.len());
    assert_eq!(std_map.is_empty(), haz_map.is_empty());
}

fuzz_target!(|data: FuzzInput| {
    fuzz_hashmap(data);
});
