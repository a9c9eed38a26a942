// ABOUTME: Render cache throughput benchmarks under varying hit rates
//! Compares a cold `get_or_compute` (always misses) against a warm one
//! (always hits) to show the cost the TTL+LRU bookkeeping adds on a hit.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use promptforge_core::cache::{Cache, CacheConfig};
use promptforge_types::CacheError;
use std::time::Duration;
use tokio::runtime::Runtime;

fn cache_config() -> CacheConfig {
    CacheConfig { max_entries: 10_000, ttl: Duration::from_secs(60) }
}

fn bench_cold_misses(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    c.bench_function("get_or_compute_cold", |b| {
        let cache: Cache<String> = Cache::new(cache_config());
        let mut i = 0usize;
        b.iter(|| {
            rt.block_on(async {
                let key = format!("key-{i}");
                i += 1;
                cache
                    .get_or_compute(&key, || async { Ok::<_, CacheError>(key.clone()) })
                    .await
                    .unwrap()
            })
        });
    });
}

fn bench_warm_hits(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let cache: Cache<String> = Cache::new(cache_config());
    rt.block_on(cache.insert("warm", "cached-value".to_string()));

    c.bench_function("get_or_compute_warm", |b| {
        b.iter(|| {
            rt.block_on(async {
                cache
                    .get_or_compute(black_box("warm"), || async {
                        Ok::<_, CacheError>("recomputed".to_string())
                    })
                    .await
                    .unwrap()
            })
        });
    });
}

criterion_group!(benches, bench_cold_misses, bench_warm_hits);
criterion_main!(benches);
