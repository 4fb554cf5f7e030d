// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Benchmarks for configuration loading and merging.
//!
//! Run with: `cargo bench --bench config`

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::collections::HashMap;
use std::fs;
use std::hint::black_box;
use tempfile::TempDir;

use llm_tracker::config::{
    load_config, load_config_file, merge_config, EnvOverrides, ExplicitOptions, TrackerConfig,
};
use llm_tracker::{ModelPricing, TrackerOptions};

/// Benchmark config loading from different sources.
fn bench_config_loading(c: &mut Criterion) {
    let temp = TempDir::new().unwrap();

    let config_content = r#"{
        "apiUrl": "https://collector.example.com/llm",
        "computeCosts": true,
        "maxTextLength": 2000,
        "pricing": {
            "my-finetune": {"input": 1.0, "output": 2.0}
        }
    }"#;
    fs::write(temp.path().join(".llm-tracker.json"), config_content).unwrap();

    let mut group = c.benchmark_group("config_loading");
    group.throughput(Throughput::Elements(1));

    group.bench_function("load_json_config", |b| {
        b.iter(|| load_config(black_box(temp.path()), black_box(ExplicitOptions::default())));
    });

    let yaml_content = r#"
apiUrl: https://collector.example.com/llm
privacyMode: true
pricing:
  my-finetune:
    input: 1.0
    output: 2.0
"#;
    let yaml_dir = TempDir::new().unwrap();
    let yaml_path = yaml_dir.path().join("tracker.yaml");
    fs::write(&yaml_path, yaml_content).unwrap();

    group.bench_function("load_yaml_file", |b| {
        b.iter(|| load_config_file(black_box(&yaml_path)));
    });

    let empty_dir = TempDir::new().unwrap();
    group.bench_function("load_defaults_only", |b| {
        b.iter(|| load_config(black_box(empty_dir.path()), black_box(ExplicitOptions::default())));
    });

    group.finish();
}

/// Benchmark config merging with various options.
fn bench_config_merging(c: &mut Criterion) {
    let global_config = TrackerConfig {
        api_url: Some("https://global.example.com/llm".to_string()),
        compute_costs: Some(false),
        ..Default::default()
    };

    let mut pricing = HashMap::new();
    pricing.insert("my-finetune".to_string(), ModelPricing::new(1.0, 2.0));
    let workspace_config = TrackerConfig {
        api_key: Some("workspace-key".to_string()),
        privacy_mode: Some(true),
        pricing,
        ..Default::default()
    };

    let env = EnvOverrides {
        api_url: Some("https://env.example.com/llm".to_string()),
        api_key: None,
    };

    let explicit = ExplicitOptions {
        compute_costs: Some(true),
        ..Default::default()
    };

    let mut group = c.benchmark_group("config_merging");
    group.throughput(Throughput::Elements(1));

    group.bench_function("merge_all_layers", |b| {
        b.iter(|| {
            merge_config(
                black_box(Some(global_config.clone())),
                black_box(Some(workspace_config.clone())),
                black_box(env.clone()),
                black_box(explicit.clone()),
            )
        });
    });

    group.bench_function("merge_defaults_only", |b| {
        b.iter(|| {
            merge_config(
                black_box(None),
                black_box(None),
                black_box(EnvOverrides::default()),
                black_box(ExplicitOptions::default()),
            )
        });
    });

    let resolved = merge_config(
        Some(global_config.clone()),
        Some(workspace_config.clone()),
        env.clone(),
        explicit.clone(),
    );
    group.bench_function("tracker_options_from_config", |b| {
        b.iter(|| TrackerOptions::from_config(black_box(&resolved)));
    });

    group.finish();
}

/// Benchmark config serialization.
fn bench_config_serialization(c: &mut Criterion) {
    let mut pricing = HashMap::new();
    pricing.insert("my-finetune".to_string(), ModelPricing::new(1.0, 2.0));
    pricing.insert(
        "my-cached-model".to_string(),
        ModelPricing::new(3.0, 15.0).with_cache(0.3, 3.75),
    );
    let config = TrackerConfig {
        api_url: Some("https://collector.example.com/llm".to_string()),
        api_key: Some("secret".to_string()),
        compute_costs: Some(true),
        privacy_mode: Some(false),
        max_content_size: Some(512 * 1024),
        max_text_length: Some(4000),
        cost_timeout_ms: Some(2000),
        pricing,
    };

    let mut group = c.benchmark_group("config_serialization");

    group.bench_function("to_json", |b| {
        b.iter(|| serde_json::to_string(black_box(&config)));
    });

    group.bench_function("to_yaml", |b| {
        b.iter(|| serde_yaml::to_string(black_box(&config)));
    });

    let json_str = serde_json::to_string(&config).unwrap();
    let yaml_str = serde_yaml::to_string(&config).unwrap();

    group.bench_function("from_json", |b| {
        b.iter(|| serde_json::from_str::<TrackerConfig>(black_box(&json_str)));
    });

    group.bench_function("from_yaml", |b| {
        b.iter(|| serde_yaml::from_str::<TrackerConfig>(black_box(&yaml_str)));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_config_loading,
    bench_config_merging,
    bench_config_serialization,
);
criterion_main!(benches);
