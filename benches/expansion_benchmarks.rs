//! Scope expansion and ACL translation benchmarks
//!
//! Measures how expansion scales with the width of each scope level and how
//! long translating the resulting abstract mapping takes per backend.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use scopeforge::acl::{translate, AclBackend};
use scopeforge::config::EngineConfig;
use scopeforge::engine::{permute_joined, EngineContext};
use scopeforge::model::{
    Blueprint, ClientRoles, ConsumerDefinition, Definitions, ProducerDefinition, ScopeNode, TopicDefinition,
};
use std::time::Duration;

fn values(prefix: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| format!("{}{}", prefix, i)).collect()
}

/// Three-level chain: `width` environments × `width` tenants × `width` topics.
fn wide_definitions(width: usize) -> Definitions {
    let topics = ScopeNode {
        name: "domain".to_string(),
        values: values("dom", 2),
        include_in_name: true,
        topics: TopicDefinition {
            names: values("topic", width),
            ignore_scopes: vec!["env0".to_string()],
            ..Default::default()
        },
        clients: ClientRoles {
            producers: vec![ProducerDefinition {
                principal: "writer".to_string(),
                group: "tx".to_string(),
                hostnames: vec!["*".to_string()],
                enable_idempotence: true,
                transactional: false,
            }],
            consumers: vec![ConsumerDefinition {
                principal: "reader".to_string(),
                group: "readers".to_string(),
                hostnames: vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()],
            }],
            ..Default::default()
        },
        ..Default::default()
    };

    let tenant = ScopeNode {
        name: "tenant".to_string(),
        values: values("tenant", width),
        include_in_name: true,
        child: Some(Box::new(topics)),
        ..Default::default()
    };

    Definitions {
        scope: Some(ScopeNode {
            name: "environment".to_string(),
            values: values("env", width),
            include_in_name: true,
            child: Some(Box::new(tenant)),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn context(width: usize) -> EngineContext {
    EngineContext::new(&EngineConfig::default(), Blueprint::default(), wide_definitions(width)).unwrap()
}

fn permutation_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("permute");

    for width in [4usize, 8, 16].iter() {
        let lists = vec![values("a", *width), values("b", *width), values("c", *width)];
        group.throughput(Throughput::Elements((width * width * width) as u64));
        group.bench_with_input(BenchmarkId::new("three_lists", width), &lists, |b, lists| {
            b.iter(|| black_box(permute_joined(lists, ".")))
        });
    }

    group.finish();
}

fn expansion_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("expansion");
    group.measurement_time(Duration::from_secs(10));

    for width in [4usize, 8, 16].iter() {
        let ctx = context(*width);
        group.bench_with_input(BenchmarkId::new("scope_width", width), &ctx, |b, ctx| {
            b.iter(|| black_box(ctx.expand().unwrap()))
        });
    }

    group.finish();
}

fn translation_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("acl_translation");

    let ctx = context(8);
    let expansion = ctx.expand().unwrap();
    let mapping = expansion.acl_mapping(&ctx);
    group.throughput(Throughput::Elements(mapping.len() as u64));

    group.bench_function("build_mapping", |b| b.iter(|| black_box(expansion.acl_mapping(&ctx))));

    for backend in [AclBackend::Native, AclBackend::Rbac] {
        group.bench_with_input(BenchmarkId::new("translate", backend), &mapping, |b, mapping| {
            b.iter(|| black_box(translate(mapping, backend)))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    permutation_benchmarks,
    expansion_benchmarks,
    translation_benchmarks
);
criterion_main!(benches);
