//! Basic benchmarks for the `fixed_pool` crate.
#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::hint::black_box;
use std::time::Instant;

use criterion::{Criterion, criterion_group, criterion_main};
use fixed_pool::ObjectPool;
use new_zealand::nz;

criterion_group!(benches, entrypoint);
criterion_main!(benches);

type TestItem = usize;
const TEST_VALUE: TestItem = 1024;

fn entrypoint(c: &mut Criterion) {
    let mut group = c.benchmark_group("fp_basic");

    group.bench_function("create_destroy", |b| {
        b.iter_custom(|iters| {
            let mut pool = ObjectPool::<TestItem>::new();

            let start = Instant::now();

            for _ in 0..iters {
                pool.create().unwrap();
                pool.destroy().unwrap();
            }

            start.elapsed()
        });
    });

    group.bench_function("allocate_deallocate", |b| {
        b.iter_custom(|iters| {
            let mut pool = ObjectPool::<TestItem>::new();
            pool.create().unwrap();

            let start = Instant::now();

            for _ in 0..iters {
                let ptr = black_box(pool.allocate().unwrap());

                // SAFETY: Allocated above, never initialized.
                unsafe { pool.deallocate(ptr).unwrap() };
            }

            start.elapsed()
        });
    });

    group.bench_function("allocate_deallocate_unchecked", |b| {
        b.iter_custom(|iters| {
            let mut pool = ObjectPool::<TestItem>::new();
            pool.create().unwrap();

            let start = Instant::now();

            for _ in 0..iters {
                // SAFETY: The pool is created and we return every slot right away.
                let ptr = black_box(unsafe { pool.allocate_unchecked() });

                // SAFETY: Allocated above, never initialized.
                unsafe { pool.deallocate_unchecked(ptr) };
            }

            start.elapsed()
        });
    });

    group.bench_function("insert_remove", |b| {
        b.iter_custom(|iters| {
            let mut pool = ObjectPool::<TestItem>::new();
            pool.create().unwrap();

            let start = Instant::now();

            for _ in 0..iters {
                let item = pool.insert(black_box(TEST_VALUE)).unwrap();
                pool.remove(black_box(item)).unwrap();
            }

            start.elapsed()
        });
    });

    group.bench_function("fill_and_drain_1000", |b| {
        b.iter_custom(|iters| {
            let mut pool = ObjectPool::<TestItem>::builder()
                .capacity(nz!(1000))
                .build();
            pool.create().unwrap();

            let mut ptrs = Vec::with_capacity(1000);

            let start = Instant::now();

            for _ in 0..iters {
                while let Ok(ptr) = pool.allocate() {
                    ptrs.push(ptr);
                }

                for ptr in ptrs.drain(..) {
                    // SAFETY: Allocated above, never initialized.
                    unsafe { pool.deallocate(ptr).unwrap() };
                }
            }

            start.elapsed()
        });
    });

    group.finish();
}
