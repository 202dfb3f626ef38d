//! Benchmarks for lowering and walking bodies.
//!
//! - Straight-line bodies of growing length
//! - Branch-heavy bodies where states fork and merge
//! - Parallel walks over many bodies through the driver

use std::{hint::black_box, sync::Arc};

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use symscope::{analysis::driver::analyze_all, prelude::*};

fn straight_line(length: usize) -> Vec<Statement> {
    (0..length)
        .map(|index| Statement::assign("value", Expression::int(index as i128)))
        .collect()
}

/// `if (Next()) value = i;` repeated, every branch independent of the others.
fn branching(count: usize) -> Vec<Statement> {
    (0..count)
        .map(|index| Statement::If {
            condition: Expression::call("Next", vec![]),
            then: vec![Statement::assign("value", Expression::int(index as i128))],
            otherwise: vec![],
        })
        .collect()
}

fn bench_lowering(c: &mut Criterion) {
    let mut group = c.benchmark_group("lower");
    for length in [10, 100, 500] {
        let body = straight_line(length);
        group.throughput(Throughput::Elements(length as u64));
        group.bench_with_input(BenchmarkId::from_parameter(length), &body, |b, body| {
            b.iter(|| {
                let cfg = Lowerer::new().local_int("value").lower(black_box(body)).unwrap();
                black_box(cfg)
            });
        });
    }
    group.finish();
}

fn bench_walk(c: &mut Criterion) {
    let mut group = c.benchmark_group("walk");
    for count in [4, 16, 64] {
        let cfg = Lowerer::new()
            .local_int("value")
            .lower(&branching(count))
            .unwrap();
        group.bench_with_input(BenchmarkId::new("branches", count), &cfg, |b, cfg| {
            b.iter(|| {
                let outcome = SymbolicExecution::new(
                    cfg,
                    NullDereference::new().into(),
                    ExecutionConfig::default(),
                )
                .unwrap()
                .walk();
                black_box(outcome)
            });
        });
    }
    group.finish();
}

fn bench_driver(c: &mut Criterion) {
    let cfgs: Vec<_> = (0..64)
        .map(|_| {
            Lowerer::new()
                .local_int("value")
                .lower(&branching(8))
                .map(Arc::new)
                .unwrap()
        })
        .collect();

    let mut group = c.benchmark_group("driver");
    group.throughput(Throughput::Elements(cfgs.len() as u64));
    group.bench_function("analyze_all", |b| {
        b.iter(|| {
            let outcomes = analyze_all(
                black_box(&cfgs),
                || NullDereference::new().into(),
                &ExecutionConfig::default(),
                &CancellationToken::new(),
            )
            .unwrap();
            black_box(outcomes)
        });
    });
    group.finish();
}

criterion_group!(benches, bench_lowering, bench_walk, bench_driver);
criterion_main!(benches);
