//! # Kalapila Conversation Benchmarks
//!
//! | Area | Operation |
//! |------|-----------|
//! | Identity | resolve a raw address into its canonical group |
//! | Epoch | re-subscribe by an active member (no writes) |
//! | Listing | timeline over a user with many conversations |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use kp_01_conversation_store::{
    resolve, AllowAll, ConversationConfig, ConversationDependencies, ConversationService,
    EpochApi, InMemoryKVStore, ListingApi, Message, SystemTimeSource,
};
use tokio::runtime::Runtime;

type Service = ConversationService<InMemoryKVStore, SystemTimeSource>;

fn service() -> Service {
    ConversationService::new(
        ConversationDependencies {
            kv_store: InMemoryKVStore::new(),
            time_source: SystemTimeSource,
        },
        ConversationConfig::default(),
    )
}

fn address(size: usize) -> String {
    (0..size)
        .rev()
        .map(|i| format!("user-{i}"))
        .collect::<Vec<_>>()
        .join("|")
}

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("kp-01-identity");
    for size in [2, 8, 64] {
        let raw = address(size);
        group.bench_with_input(BenchmarkId::new("resolve", size), &raw, |b, raw| {
            b.iter(|| black_box(resolve(raw).is_ok()))
        });
    }
    group.finish();
}

fn bench_resubscribe(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let service = rt.block_on(async {
        let service = service();
        service
            .subscribe("alice|bob|carol", "alice", 1, &AllowAll)
            .await
            .unwrap();
        service
    });

    c.bench_function("kp-01-epoch/resubscribe_active_member", |b| {
        b.iter(|| {
            rt.block_on(service.subscribe("carol|bob|alice", "bob", 1, &AllowAll))
                .is_ok()
        })
    });
}

fn bench_timeline(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let service = rt.block_on(async {
        let service = service();
        for i in 0..200u64 {
            let topic = format!("alice|peer-{i}");
            service.subscribe(&topic, "alice", 1, &AllowAll).await.unwrap();
            service
                .flush(&topic, Message::new("alice", topic.as_str(), "ping", i))
                .await
                .unwrap();
        }
        service.settle().await.unwrap();
        service
    });

    c.bench_function("kp-01-listing/timeline_top_25", |b| {
        b.iter(|| black_box(rt.block_on(service.timeline("alice", 0, 25)).map(|t| t.len())))
    });
}

criterion_group!(benches, bench_resolve, bench_resubscribe, bench_timeline);
criterion_main!(benches);
