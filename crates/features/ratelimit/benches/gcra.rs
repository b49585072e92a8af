use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use splus_ratelimit::{RateLimit, Store};
use std::time::Duration;

fn bench_memory_update(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread().build().expect("runtime");
    let mut group = c.benchmark_group("memory_update");
    let limit = RateLimit::new(1_000, Duration::from_secs(1)).expect("valid limit");

    for keys in [1usize, 1_000, 100_000] {
        let store = Store::memory();
        let names: Vec<String> = (0..keys).map(|i| format!("203.0.113.{i}")).collect();

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("keys", keys), &names, |b, names| {
            let mut i = 0;
            b.to_async(&runtime).iter(|| {
                i = (i + 1) % names.len();
                let key = &names[i];
                let store = &store;
                async move { store.update(key, &limit).await }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_memory_update);
criterion_main!(benches);
