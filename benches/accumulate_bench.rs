//! Throughput of chunk classification and full accumulator runs.
//!
//! Run: cargo bench --bench accumulate_bench --features mocks

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use futures::StreamExt;

use plan_stream::mocks::ScriptedUpstream;
use plan_stream::{ChunkDecoder, StreamAccumulator, UpstreamChunk};

fn mixed_chunks(count: usize) -> Vec<UpstreamChunk> {
    let mut chunks = Vec::with_capacity(count);
    let text_part = count / 2;

    for i in 0..text_part {
        chunks.push(UpstreamChunk::text(format!("token{i} ")));
    }
    chunks.push(UpstreamChunk::tool("{\"title\":\"Bench\",\"steps\":["));
    for i in text_part..count.saturating_sub(2) {
        chunks.push(UpstreamChunk::tool(format!(
            "{{\"id\":\"{i}\",\"title\":\"Step {i}\",\"status\":\"pending\"}},"
        )));
    }
    chunks.push(UpstreamChunk::tool("{\"id\":\"last\",\"title\":\"Done\"}]}"));
    chunks
}

fn bench_classify(c: &mut Criterion) {
    let decoder = ChunkDecoder::new();
    let text = UpstreamChunk::text("Hello there, here is the plan you asked for.");
    let tool = UpstreamChunk::tool("{\"id\":\"1\",\"title\":\"Draft\",\"status\":\"pending\"},");

    c.bench_function("classify_text", |b| b.iter(|| decoder.classify(black_box(&text))));
    c.bench_function("classify_tool", |b| b.iter(|| decoder.classify(black_box(&tool))));
}

fn bench_run(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime");

    let mut group = c.benchmark_group("accumulator_run");
    for count in [16usize, 256, 4096] {
        let upstream = Arc::new(ScriptedUpstream::with_chunks(mixed_chunks(count)));
        let accumulator = StreamAccumulator::new(upstream);

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.to_async(&runtime).iter(|| async {
                let (events, finalized) = accumulator.run(&[], None).into_parts();
                let forwarded = events.count().await;
                let outcome = finalized.wait().await;
                black_box((forwarded, outcome))
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_classify, bench_run);
criterion_main!(benches);
