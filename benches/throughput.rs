//! Throughput Benchmark for TrieKV
//!
//! This benchmark measures the performance of the hash trie and the shared
//! store under various workloads.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::sync::Arc;
use std::time::Duration;
use triekv::store::{Record, SharedStore};
use triekv::trie::RecurseMap;

/// Benchmark trie set operations
fn bench_trie_set(c: &mut Criterion) {
    let map: Arc<RecurseMap<Bytes>> = Arc::new(RecurseMap::new());

    let mut group = c.benchmark_group("trie_set");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_small", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i));
            map.set(key, Arc::new(Bytes::from("small_value")));
            i += 1;
        });
    });

    group.bench_function("set_overwrite", |b| {
        let key = Bytes::from("hot-key");
        b.iter(|| {
            map.set(key.clone(), Arc::new(Bytes::from("value")));
        });
    });

    group.finish();
}

/// Benchmark trie get operations
fn bench_trie_get(c: &mut Criterion) {
    let map: Arc<RecurseMap<Bytes>> = Arc::new(RecurseMap::new());

    // Pre-populate with data
    for i in 0..100_000 {
        let key = Bytes::from(format!("key:{}", i));
        map.set(key, Arc::new(Bytes::from(format!("value:{}", i))));
    }

    let mut group = c.benchmark_group("trie_get");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("key:{}", i % 100_000);
            black_box(map.get(key.as_bytes()));
            i += 1;
        });
    });

    group.bench_function("get_missing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("missing:{}", i);
            black_box(map.get(key.as_bytes()));
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark readers running against a single writer
fn bench_trie_concurrent(c: &mut Criterion) {
    use std::thread;

    let mut group = c.benchmark_group("trie_concurrent");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("4_threads_mixed", |b| {
        b.iter(|| {
            let map: Arc<RecurseMap<Bytes>> = Arc::new(RecurseMap::new());
            let handles: Vec<_> = (0..4)
                .map(|t| {
                    let map = Arc::clone(&map);
                    thread::spawn(move || {
                        for i in 0..10_000 {
                            let key = Bytes::from(format!("key:{}:{}", t, i));
                            map.set(key.clone(), Arc::new(Bytes::from("value")));
                            map.get(&key);
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }
        });
    });

    group.finish();
}

/// Benchmark store operations (CAS assignment, accounting, expiry checks)
fn bench_store(c: &mut Criterion) {
    let store = Arc::new(SharedStore::new());

    let mut group = c.benchmark_group("store");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_small", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let record = Record::new(
                Bytes::from(format!("key:{}", i)),
                0,
                0,
                Bytes::from("small_value"),
            );
            store.set(record).unwrap();
            i += 1;
        });
    });

    group.bench_function("set_medium", |b| {
        let mut i = 0u64;
        let value = Bytes::from("x".repeat(1024)); // 1KB value
        b.iter(|| {
            let record = Record::new(Bytes::from(format!("key:{}", i)), 0, 0, value.clone());
            store.set(record).unwrap();
            i += 1;
        });
    });

    // Pre-populate for reads
    for i in 0..100_000 {
        let record = Record::new(
            Bytes::from(format!("read:{}", i)),
            0,
            0,
            Bytes::from(format!("value:{}", i)),
        );
        store.set(record).unwrap();
    }

    group.bench_function("get_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("read:{}", i % 100_000);
            black_box(store.get(key.as_bytes()));
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark mixed workload (80% reads, 20% writes)
fn bench_store_mixed(c: &mut Criterion) {
    let store = Arc::new(SharedStore::new());

    // Pre-populate
    for i in 0..10_000 {
        let record = Record::new(
            Bytes::from(format!("key:{}", i)),
            0,
            0,
            Bytes::from(format!("value:{}", i)),
        );
        store.set(record).unwrap();
    }

    let mut group = c.benchmark_group("store_mixed");
    group.throughput(Throughput::Elements(1));

    group.bench_function("80_read_20_write", |b| {
        let mut i = 0u64;
        b.iter(|| {
            if i % 5 == 0 {
                // 20% writes
                let record = Record::new(
                    Bytes::from(format!("new:{}", i)),
                    0,
                    0,
                    Bytes::from("value"),
                );
                store.set(record).unwrap();
            } else {
                // 80% reads
                let key = format!("key:{}", i % 10_000);
                black_box(store.get(key.as_bytes()));
            }
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark eviction sampling
fn bench_eviction(c: &mut Criterion) {
    let store = Arc::new(SharedStore::new());

    for i in 0..50_000 {
        let record = Record::new(Bytes::from(format!("key:{}", i)), 0, 0, Bytes::from("value"));
        store.set(record).unwrap();
    }

    let mut group = c.benchmark_group("eviction");
    group.throughput(Throughput::Elements(1));

    group.bench_function("evict_one", |b| {
        b.iter(|| {
            black_box(store.evict_one());
            // Keep the population stable so samples stay comparable.
            let record = Record::new(Bytes::from("refill"), 0, 0, Bytes::from("value"));
            store.set(record).unwrap();
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_trie_set,
    bench_trie_get,
    bench_trie_concurrent,
    bench_store,
    bench_store_mixed,
    bench_eviction,
);

criterion_main!(benches);
