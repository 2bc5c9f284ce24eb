use std::collections::HashSet;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rankcheck_core::reference::{DampingTerms, ReferenceEngine};

const SIZES: [usize; 3] = [100, 1_000, 10_000];

fn random_edges(seed: u64, n: usize, m: usize) -> Vec<(usize, usize)> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut seen = HashSet::new();
    let mut edges: Vec<(usize, usize)> = (0..n).map(|s| (s, rng.gen_range(0..n))).collect();
    seen.extend(edges.iter().copied());
    while edges.len() < m {
        let e = (rng.gen_range(0..n), rng.gen_range(0..n));
        if seen.insert(e) {
            edges.push(e);
        }
    }
    edges
}

fn bench_reference(c: &mut Criterion) {
    let mut group = c.benchmark_group("reference");

    for n in SIZES {
        let edges = random_edges(0x5EED_u64 + n as u64, n, n * 4);
        let terms = DampingTerms::new(0.85, n).expect("damping terms");
        let engine = ReferenceEngine::from_edges(n, &edges, terms);
        group.throughput(Throughput::Elements(edges.len() as u64));

        let ranks = engine.initial_ranks();
        group.bench_with_input(BenchmarkId::new("step", n), &ranks, |b, ranks| {
            b.iter(|| black_box(engine.step(ranks)));
        });

        group.bench_function(BenchmarkId::new("converge", n), |b| {
            b.iter(|| black_box(engine.converge(1e-5, 100)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_reference);
criterion_main!(benches);
