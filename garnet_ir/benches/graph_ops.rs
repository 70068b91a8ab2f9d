//! Graph Mutation Performance Benchmarks
//!
//! Measures the hot operations of the IR core: node registration, single
//! edge rewrites, usage fan-out replacement, and uniqueness-cache lookups.
//!
//! # Benchmark Categories
//!
//! 1. **Construction**: Node registration with usage bookkeeping
//! 2. **Edge Rewrite**: `set_input` including reverse-edge maintenance
//! 3. **Replacement**: `replace_at_usages` across growing fan-out
//! 4. **Value Numbering**: Cache hit vs. miss on constant interning

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use std::hint::black_box;

use garnet_ir::{ArithOp, Graph, NodeId};

/// Build a graph with one constant feeding `fan_out` arithmetic users.
fn star_graph(fan_out: usize) -> (Graph, NodeId, NodeId) {
    let mut g = Graph::new();
    let hub = g.const_int(1).unwrap();
    let other = g.const_int(2).unwrap();
    for _ in 0..fan_out {
        g.int_op(ArithOp::Add, hub.into(), other.into()).unwrap();
    }
    (g, hub, other)
}

fn bench_construction(c: &mut Criterion) {
    c.bench_function("add_binary_node", |b| {
        let mut g = Graph::new();
        let x = g.const_int(1).unwrap();
        let y = g.const_int(2).unwrap();
        b.iter(|| {
            black_box(g.int_op(ArithOp::Add, x.into(), y.into()).unwrap());
        })
    });
}

fn bench_edge_rewrite(c: &mut Criterion) {
    c.bench_function("set_input_toggle", |b| {
        let mut g = Graph::new();
        let x = g.const_int(1).unwrap();
        let y = g.const_int(2).unwrap();
        let add = g.int_op(ArithOp::Add, x.into(), y.into()).unwrap();
        let mut flip = false;
        b.iter(|| {
            let target = if flip { x } else { y };
            flip = !flip;
            g.set_input(add, 0, Some(target.into())).unwrap();
        })
    });
}

fn bench_replace_at_usages(c: &mut Criterion) {
    let mut group = c.benchmark_group("replace_at_usages");
    for fan_out in [4usize, 32, 256] {
        group.bench_with_input(
            BenchmarkId::from_parameter(fan_out),
            &fan_out,
            |b, &fan_out| {
                b.iter_batched(
                    || star_graph(fan_out),
                    |(mut g, hub, other)| {
                        g.replace_at_usages(hub, Some(other.into())).unwrap();
                        black_box(g)
                    },
                    BatchSize::SmallInput,
                )
            },
        );
    }
    group.finish();
}

fn bench_value_numbering(c: &mut Criterion) {
    c.bench_function("unique_hit", |b| {
        let mut g = Graph::new();
        g.const_int(7).unwrap();
        b.iter(|| black_box(g.const_int(7).unwrap()))
    });

    c.bench_function("unique_miss", |b| {
        let mut g = Graph::new();
        let mut next = 0i64;
        b.iter(|| {
            next += 1;
            black_box(g.const_int(next).unwrap())
        })
    });
}

criterion_group!(
    benches,
    bench_construction,
    bench_edge_rewrite,
    bench_replace_at_usages,
    bench_value_numbering
);
criterion_main!(benches);
