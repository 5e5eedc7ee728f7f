#![allow(clippy::expect_used)]

use chrono::{DateTime, TimeDelta, Utc};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use credential_gc::{KeyReaperConfig, NodeCredentialRegistry, StaleKeyReaper, parse_key_name};
use credential_gc_store::{
    MemoryClusterStore,
    testutil::{key_entry_name, record_with_entries, utc},
};
use tokio::runtime::Runtime;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn rt() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to create tokio runtime")
}

fn now() -> DateTime<Utc> {
    utc("2025-06-02T00:00:00Z")
}

fn populated_registry(count: usize) -> NodeCredentialRegistry {
    let registry = NodeCredentialRegistry::new();
    for i in 0..count {
        registry.register_removed_node(format!("node-{i:06}"), format!("id-{i}"));
    }
    registry
}

/// A key record with `count` fresh keys, so cycles scan everything but never
/// write.
fn populated_key_store(count: usize) -> MemoryClusterStore {
    let names: Vec<String> = (0..count)
        .map(|i| key_entry_name(&format!("key{i}"), now() - TimeDelta::minutes(i as i64 % 600)))
        .collect();
    let store = MemoryClusterStore::new();
    store.put(&record_with_entries(
        "kube-system",
        "k3s-service-account-token-keys",
        names.iter().map(|name| (name.as_str(), "blob")),
    ));
    store
}

// ---------------------------------------------------------------------------
// 1. key_name_parsing
// ---------------------------------------------------------------------------

fn key_name_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("key_name_parsing");

    group.bench_function("timestamped", |b| {
        b.iter(|| parse_key_name(std::hint::black_box("sa-key-2025-06-01T00:00:00Z")))
    });
    group.bench_function("malformed", |b| {
        b.iter(|| parse_key_name(std::hint::black_box("sa-key-with-many-dashes-but-no-time")))
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// 2. staleness_scan
// ---------------------------------------------------------------------------

fn staleness_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("staleness_scan");
    let rt = rt();
    let reaper = StaleKeyReaper::new(KeyReaperConfig::default());

    for &count in &[10, 100, 1_000] {
        let store = populated_key_store(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("unchanged_cycle", count), &count, |b, _| {
            b.to_async(&rt).iter(|| async { reaper.run_cycle_at(&store, now()).await })
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// 3. registry_operations
// ---------------------------------------------------------------------------

fn registry_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry_operations");

    for &count in &[10, 1_000, 10_000] {
        let registry = populated_registry(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("snapshot_pending", count), &count, |b, _| {
            b.iter(|| registry.snapshot_pending())
        });
    }

    let registry = populated_registry(10_000);
    group.bench_function("is_node_removed_hit", |b| {
        b.iter(|| registry.is_node_removed(std::hint::black_box("node-005000")))
    });
    group.bench_function("is_node_removed_miss", |b| {
        b.iter(|| registry.is_node_removed(std::hint::black_box("worker-live")))
    });
    group.bench_function("register_removed_node", |b| {
        b.iter(|| registry.register_removed_node("node-005000", "id-new"))
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Group registration
// ---------------------------------------------------------------------------

criterion_group!(benches, key_name_parsing, staleness_scan, registry_operations);
criterion_main!(benches);
