use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::thread;

use rcu_head::{RcuDomain, RcuHead, RcuPtr, RcuReclaim};

struct Node {
    head: RcuHead,
    value: u64,
}

impl Node {
    fn boxed(value: u64) -> Box<Self> {
        Box::new(Node {
            head: RcuHead::new(),
            value,
        })
    }
}

impl RcuReclaim for Node {
    type Deleter = rcu_head::DefaultDelete;

    fn rcu_head(&self) -> &RcuHead {
        &self.head
    }
}

/// Benchmark: retire N objects, then drain them with a barrier
///
/// Automatic collection is disabled so the barrier pays for the whole batch.
fn bench_retire_then_barrier(c: &mut Criterion) {
    let mut group = c.benchmark_group("retire_then_barrier");

    for count in [10u64, 100, 1000, 5000].iter() {
        group.bench_with_input(BenchmarkId::new("rcu_head", count), count, |b, &count| {
            let domain = RcuDomain::builder().auto_reclaim_threshold(None).build();
            b.iter(|| {
                for i in 0..count {
                    Node::boxed(i).retire_in(&domain).unwrap();
                }
                domain.barrier();
                black_box(&domain);
            });
        });

        group.bench_with_input(
            BenchmarkId::new("crossbeam_epoch", count),
            count,
            |b, &count| {
                b.iter(|| {
                    let guard = crossbeam_epoch::pin();
                    for i in 0..count {
                        let owned = crossbeam_epoch::Owned::new(i);
                        let shared = owned.into_shared(&guard);
                        unsafe { guard.defer_destroy(shared) };
                    }
                    guard.flush();
                    black_box(&guard);
                });
            },
        );
    }

    group.finish();
}

/// Benchmark: read-side critical section entry/exit
fn bench_read_lock(c: &mut Criterion) {
    c.bench_function("rcu_head_read_lock", |b| {
        let domain = RcuDomain::new();
        let reader = domain.register_reader();
        let ptr = RcuPtr::new_in(Node::boxed(7), &domain);

        b.iter(|| {
            let guard = reader.read_lock();
            black_box(ptr.load(&guard).value);
        });
    });

    c.bench_function("crossbeam_epoch_pin", |b| {
        b.iter(|| {
            let _guard = crossbeam_epoch::pin();
            black_box(());
        });
    });
}

/// Benchmark: replace under concurrent readers with automatic collection
fn bench_replace_with_readers(c: &mut Criterion) {
    let mut group = c.benchmark_group("replace_with_readers");

    for num_readers in [0usize, 2, 4].iter() {
        group.bench_with_input(
            BenchmarkId::new("readers", num_readers),
            num_readers,
            |b, &num_readers| {
                b.iter(|| {
                    let domain = RcuDomain::new();
                    let ptr = std::sync::Arc::new(RcuPtr::new_in(Node::boxed(0), &domain));

                    let readers: Vec<_> = (0..num_readers)
                        .map(|_| {
                            let domain = domain.clone();
                            let ptr = ptr.clone();
                            thread::spawn(move || {
                                let reader = domain.register_reader();
                                for _ in 0..200 {
                                    let guard = reader.read_lock();
                                    black_box(ptr.load(&guard).value);
                                }
                            })
                        })
                        .collect();

                    for i in 1..=200 {
                        ptr.replace(Node::boxed(i)).unwrap();
                    }

                    for reader in readers {
                        reader.join().unwrap();
                    }
                    domain.barrier();
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_retire_then_barrier,
    bench_read_lock,
    bench_replace_with_readers
);
criterion_main!(benches);
