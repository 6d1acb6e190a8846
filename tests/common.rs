#![allow(dead_code)]

use hazmap::{HashMap, MigrationMode};

use std::collections::hash_map::RandomState;
use std::hash::BuildHasher;

// Run the test on different configurations of a `HashMap`.
pub fn with_map<K, V>(test: impl FnMut(&dyn Fn() -> HashMap<K, V>)) {
    with_map_hasher::<K, V, RandomState>(test)
}

// Run the test on different configurations of a `HashMap` with the given hasher.
pub fn with_map_hasher<K, V, S>(mut test: impl FnMut(&dyn Fn() -> HashMap<K, V, S>))
where
    S: BuildHasher + Default,
{
    // Lazy migration mode.
    if !cfg!(hazmap_stress) {
        test(
            &(|| {
                HashMap::builder()
                    .hasher(S::default())
                    .migration(MigrationMode::Lazy)
                    .build()
            }),
        );
    }

    // Incremental migration with a small chunk, and a tiny first generation, to stress
    // operations on long chains of generations.
    test(
        &(|| {
            HashMap::builder()
                .hasher(S::default())
                .capacity(1)
                .migration(MigrationMode::Incremental(1))
                .build()
        }),
    );

    // Incremental migration with a medium-sized chunk to promote interference with
    // concurrent copying.
    test(
        &(|| {
            HashMap::builder()
                .hasher(S::default())
                .migration(MigrationMode::Incremental(128))
                .build()
        }),
    );
}

// Prints a log message if `RUST_LOG=debug` is set.
#[macro_export]
macro_rules! debug {
    ($($x:tt)*) => {
        if std::env::var("RUST_LOG").as_deref() == Ok("debug") {
            println!($($x)*);
        }
    };
}

// Returns the number of threads to use for stress testing.
pub fn threads() -> usize {
    if cfg!(miri) {
        2
    } else {
        num_cpus::get_physical().next_power_of_two()
    }
}
