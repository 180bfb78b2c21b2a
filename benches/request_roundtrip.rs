//! Request round-trip benchmark suite.
//!
//! Benchmarks the full bridge path against an in-memory host:
//! - Single request latency on an open channel
//! - Concurrent requests multiplexed over one channel: 1, 10, 100
//! - Requests streaming progress events before their final
//!
//! Run with: cargo bench --bench request_roundtrip
//! Results saved to: target/criterion/

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use native_host_bridge::{Bridge, BridgeOptions, HostAcceptor, MemoryTransport};
use serde_json::json;
use tokio::runtime::Runtime;

// ============================================================================
// Benchmark Parameters
// ============================================================================

const CONCURRENCY: &[usize] = &[1, 10, 100];
const PROGRESS_EVENTS: &[usize] = &[0, 5, 20];

// ============================================================================
// Host
// ============================================================================

/// Answers `echo` with the payload, after `steps` progress events when asked.
async fn serve(mut acceptor: HostAcceptor) {
    while let Some(mut host) = acceptor.accept().await {
        while let Ok(Some(request)) = host.recv().await {
            let steps = request.payload["steps"].as_u64().unwrap_or(0);
            for step in 0..steps {
                if host.progress(request.id, json!({ "step": step })).await.is_err() {
                    return;
                }
            }
            if host.reply(request.id, request.payload).await.is_err() {
                return;
            }
        }
    }
}

/// Creates a bridge with its host running and the channel open.
fn open_bridge(rt: &Runtime) -> Bridge {
    let (transport, acceptor) = MemoryTransport::new();
    rt.spawn(serve(acceptor));

    let options = BridgeOptions::new().with_max_pending(1_000);
    let bridge = Bridge::new(Arc::new(transport), options);
    rt.block_on(bridge.connect()).expect("connect");
    bridge
}

// ============================================================================
// Benchmark: Single Request
// ============================================================================

fn bench_single_request(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");
    let bridge = open_bridge(&rt);

    c.bench_function("single_request", |b| {
        b.to_async(&rt).iter(|| async {
            bridge
                .request("echo", json!({ "text": "ping" }))
                .await
                .expect("reply")
        });
    });
}

// ============================================================================
// Benchmark: Concurrent Requests
// ============================================================================

fn bench_concurrent_requests(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");
    let bridge = open_bridge(&rt);

    let mut group = c.benchmark_group("concurrent_requests");

    for &count in CONCURRENCY {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.to_async(&rt).iter(|| async {
                let calls: Vec<_> = (0..count)
                    .map(|i| bridge.request("echo", json!({ "index": i })))
                    .collect();
                futures_util::future::try_join_all(calls)
                    .await
                    .expect("replies")
            });
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Progress Streaming
// ============================================================================

fn bench_progress_events(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");
    let bridge = open_bridge(&rt);

    let mut group = c.benchmark_group("progress_events");

    for &steps in PROGRESS_EVENTS {
        group.bench_with_input(BenchmarkId::from_parameter(steps), &steps, |b, &steps| {
            b.to_async(&rt).iter(|| async {
                bridge
                    .call("echo", json!({ "steps": steps }))
                    .on_progress(|_| {})
                    .send()
                    .await
                    .expect("reply")
            });
        });
    }

    group.finish();
}

// ============================================================================
// Criterion Setup
// ============================================================================

criterion_group!(
    benches,
    bench_single_request,
    bench_concurrent_requests,
    bench_progress_events
);
criterion_main!(benches);
