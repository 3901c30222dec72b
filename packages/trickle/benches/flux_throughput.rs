//! Throughput of common pipelines, from the bare emission loop to scheduled subscription.
#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use new_zealand::nz;
use trickle::{Flux, Pool, TestSubscriber};

criterion_group!(benches, entrypoint);
criterion_main!(benches);

const ITEM_COUNT: u64 = 10_000;

fn entrypoint(c: &mut Criterion) {
    let mut group = c.benchmark_group("flux_throughput");

    group.bench_function("range_unbounded", |b| {
        b.iter(|| {
            black_box(Flux::range(0, ITEM_COUNT).block_last().unwrap());
        });
    });

    group.bench_function("range_one_by_one", |b| {
        b.iter(|| {
            let probe = TestSubscriber::with_initial_request(1);
            Flux::range(0, ITEM_COUNT).subscribe(probe.clone());

            while !probe.is_completed() {
                probe.request(1);
            }

            black_box(probe.item_count());
        });
    });

    group.bench_function("map_filter", |b| {
        b.iter(|| {
            let last = Flux::range(0, ITEM_COUNT)
                .map(|x| x.wrapping_mul(3))
                .filter(|x| x % 2 == 0)
                .block_last()
                .unwrap();

            black_box(last);
        });
    });

    group.bench_function("flat_map", |b| {
        b.iter(|| {
            let last = Flux::range(0, ITEM_COUNT / 10)
                .flat_map(|x| Flux::range(x, 10))
                .block_last()
                .unwrap();

            black_box(last);
        });
    });

    group.bench_function("flat_map_serial", |b| {
        b.iter(|| {
            let last = Flux::range(0, ITEM_COUNT / 10)
                .flat_map_with(|x| Flux::range(x, 10), nz!(1))
                .block_last()
                .unwrap();

            black_box(last);
        });
    });

    group.bench_function("zip", |b| {
        b.iter(|| {
            let last = Flux::zip(Flux::range(0, ITEM_COUNT), Flux::range(0, ITEM_COUNT))
                .block_last()
                .unwrap();

            black_box(last);
        });
    });

    group.bench_function("blocking_iter", |b| {
        b.iter(|| {
            let sum: i64 = Flux::range(0, ITEM_COUNT)
                .into_blocking_iter()
                .map(Result::unwrap)
                .sum();

            black_box(sum);
        });
    });

    let pool = Pool::single();
    group.bench_function("subscribe_on_single", |b| {
        b.iter(|| {
            let last = Flux::range(0, ITEM_COUNT)
                .subscribe_on(pool.scheduler())
                .block_last()
                .unwrap();

            black_box(last);
        });
    });

    group.finish();
}
