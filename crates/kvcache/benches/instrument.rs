use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use kvcache::{Cache, MemoryStore, Operation, Payload};

fn bench_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("store");
    group.sample_size(50);
    group.throughput(Throughput::Elements(1));

    group.bench_function("plain_1kb", |b| {
        let cache = Cache::new(Arc::new(MemoryStore::new()));
        let data = vec![b'x'; 1024];

        b.iter(|| {
            black_box(cache.store(data.clone()).unwrap());
        });
    });

    group.bench_function("instrumented_1kb", |b| {
        let cache = Cache::new(Arc::new(MemoryStore::new()));
        let store = cache.instrumented_store();
        let data = Payload::Binary(vec![b'x'; 1024]);

        b.iter(|| {
            black_box(store.call(data.clone()).unwrap());
        });
    });

    group.finish();
}

fn bench_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("replay");
    group.sample_size(50);

    group.bench_function("replay_1000_calls", |b| {
        let cache = Cache::new(Arc::new(MemoryStore::new()));
        let store = cache.instrumented_store();
        for i in 0..1000 {
            store.call(Payload::Integer(i)).unwrap();
        }

        b.iter(|| {
            let mut out = Vec::with_capacity(64 * 1024);
            kvcache::replay_to(&store, &mut out).unwrap();
            black_box(out);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_store, bench_replay);
criterion_main!(benches);
