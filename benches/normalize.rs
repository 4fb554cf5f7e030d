// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Benchmarks for the record-building hot paths: content normalization,
//! usage extraction and stream accumulation.
//!
//! Run with: `cargo bench --bench normalize`

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;
use std::hint::black_box;

use llm_tracker::normalize::{ContentNormalizer, NormalizerConfig};
use llm_tracker::stream::StreamAccumulator;
use llm_tracker::usage::account_usage;
use llm_tracker::{PromptMessage, StreamPart};

fn conversation(turns: usize, words_per_turn: usize) -> Vec<PromptMessage> {
    let text = "lorem ipsum dolor sit amet ".repeat(words_per_turn / 5 + 1);
    (0..turns)
        .map(|i| {
            if i % 2 == 0 {
                PromptMessage::user_text(text.clone())
            } else {
                PromptMessage::new("assistant", json!([{"type": "text", "text": text}]))
            }
        })
        .collect()
}

/// Benchmark prompt normalization at different sizes.
fn bench_prompt_normalization(c: &mut Criterion) {
    let normalizer = ContentNormalizer::default();
    let mut group = c.benchmark_group("prompt_normalization");

    for turns in [2, 20, 200] {
        let prompt = conversation(turns, 200);
        group.throughput(Throughput::Elements(turns as u64));
        group.bench_with_input(BenchmarkId::from_parameter(turns), &prompt, |b, prompt| {
            b.iter(|| normalizer.prompt_to_messages(black_box(prompt)));
        });
    }

    group.finish();
}

/// Benchmark oldest-first trimming when the prompt exceeds the size budget.
fn bench_prompt_trimming(c: &mut Criterion) {
    let normalizer = ContentNormalizer::new(NormalizerConfig {
        max_content_size: 16 * 1024,
        ..Default::default()
    });
    let prompt = conversation(500, 400);

    c.bench_function("prompt_trim_500_turns", |b| {
        b.iter(|| normalizer.prompt_to_messages(black_box(&prompt)));
    });
}

/// Benchmark redaction of inline media.
fn bench_media_redaction(c: &mut Criterion) {
    let normalizer = ContentNormalizer::default();
    let payload = "QUJD".repeat(64 * 1024);
    let prompt = vec![PromptMessage::new(
        "user",
        json!([
            {"type": "text", "text": "What is in this image?"},
            {"type": "file", "mediaType": "image/png", "data": payload}
        ]),
    )];

    c.bench_function("redact_256k_base64", |b| {
        b.iter(|| normalizer.prompt_to_messages(black_box(&prompt)));
    });
}

/// Benchmark usage extraction across schemas.
fn bench_usage_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("usage_extraction");

    let flat = json!({"inputTokens": 10, "outputTokens": 2});
    group.bench_function("flat", |b| {
        b.iter(|| account_usage("openai", black_box(&flat), None, false));
    });

    let nested = json!({
        "inputTokens": {"total": 100, "noCache": 75, "cacheRead": 20, "cacheWrite": 5},
        "outputTokens": {"total": 50, "text": 40, "reasoning": 10}
    });
    let meta = json!({"anthropic": {"cacheCreationInputTokens": 5}});
    group.bench_function("nested_anthropic", |b| {
        b.iter(|| account_usage("anthropic", black_box(&nested), Some(&meta), false));
    });

    group.finish();
}

/// Benchmark folding text deltas into an accumulated stream.
fn bench_stream_accumulation(c: &mut Criterion) {
    let parts: Vec<StreamPart> = (0..1000)
        .map(|i| StreamPart::text_delta("t1", format!("token{} ", i)))
        .chain(std::iter::once(StreamPart::finish(
            json!({"inputTokens": 10, "outputTokens": 1000}),
            "stop",
        )))
        .collect();

    let mut group = c.benchmark_group("stream_accumulation");
    group.throughput(Throughput::Elements(parts.len() as u64));
    group.bench_function("1000_text_deltas", |b| {
        b.iter(|| {
            let mut acc = StreamAccumulator::new();
            for part in parts.iter().cloned() {
                acc.push(part);
            }
            black_box(acc.finish())
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_prompt_normalization,
    bench_prompt_trimming,
    bench_media_redaction,
    bench_usage_extraction,
    bench_stream_accumulation,
);
criterion_main!(benches);
