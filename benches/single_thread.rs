use std::collections::HashMap;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hazmap::MigrationMode;

const SIZE: usize = 10_000;

#[derive(Clone, Copy)]
struct RandomKeys {
    state: usize,
}

impl RandomKeys {
    fn new() -> Self {
        RandomKeys { state: 0 }
    }
}

impl Iterator for RandomKeys {
    type Item = usize;
    fn next(&mut self) -> Option<usize> {
        // Add 1 then multiply by some 32 bit prime.
        self.state = self.state.wrapping_add(1).wrapping_mul(3_787_392_781);
        Some(self.state)
    }
}

fn read(c: &mut Criterion) {
    let mut group = c.benchmark_group("read");

    group.bench_function("hazmap", |b| {
        let m = hazmap::HashMap::<usize, usize>::new();
        for i in RandomKeys::new().take(SIZE) {
            m.insert(i, i);
        }

        b.iter(|| {
            let m = m.pin();
            for i in RandomKeys::new().take(SIZE) {
                black_box(assert_eq!(m.get(&i), Some(i)));
            }
        });
    });

    group.bench_function("std", |b| {
        let mut m = HashMap::<usize, usize>::default();
        for i in RandomKeys::new().take(SIZE) {
            m.insert(i, i);
        }

        b.iter(|| {
            for i in RandomKeys::new().take(SIZE) {
                black_box(assert_eq!(m.get(&i), Some(&i)));
            }
        });
    });

    group.bench_function("dashmap", |b| {
        let m = dashmap::DashMap::<usize, usize>::default();
        for i in RandomKeys::new().take(SIZE) {
            m.insert(i, i);
        }

        b.iter(|| {
            for i in RandomKeys::new().take(SIZE) {
                black_box(assert_eq!(*m.get(&i).unwrap(), i));
            }
        });
    });

    group.finish();
}

fn insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");

    for (name, migration) in [
        ("hazmap-lazy", MigrationMode::Lazy),
        ("hazmap-incremental", MigrationMode::Incremental(64)),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| {
                let m = hazmap::HashMap::<usize, usize>::builder()
                    .capacity(1)
                    .migration(migration)
                    .build();

                let m = m.pin();
                for i in RandomKeys::new().take(SIZE) {
                    m.insert(i, i);
                }
                black_box(m.len());
            });
        });
    }

    group.bench_function("std", |b| {
        b.iter(|| {
            let mut m = HashMap::<usize, usize>::default();
            for i in RandomKeys::new().take(SIZE) {
                m.insert(i, i);
            }
            black_box(m.len());
        });
    });

    group.bench_function("dashmap", |b| {
        b.iter(|| {
            let m = dashmap::DashMap::<usize, usize>::default();
            for i in RandomKeys::new().take(SIZE) {
                m.insert(i, i);
            }
            black_box(m.len());
        });
    });

    group.finish();
}

criterion_group!(benches, read, insert);
criterion_main!(benches);
