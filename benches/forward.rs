//! Benchmarks for the dual-score GCN forward pass and graph normalization.

use std::sync::Arc;

use botlift::autograd::no_grad;
use botlift::data::{GraphSample, Snapshot, SyntheticConfig};
use botlift::gnn::NormalizedAdjacency;
use botlift::model::DualScoreGCN;
use botlift::nn::Module;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn sample(num_nodes: usize) -> GraphSample {
    let mut rng = StdRng::seed_from_u64(101);
    let snapshot = Snapshot::synthetic(&SyntheticConfig::with_nodes(num_nodes), &mut rng)
        .expect("valid synthetic config");
    GraphSample::from_snapshot(&snapshot, 0.8, &mut rng).expect("valid snapshot")
}

fn bench_forward(c: &mut Criterion) {
    let mut group = c.benchmark_group("dual_score_forward");

    for &n in &[100, 500, 2000] {
        let sample = sample(n);
        let x = sample.feature_tensor();
        let mut model = DualScoreGCN::new(1, 16, 16, 0.5, &mut StdRng::seed_from_u64(101))
            .expect("valid model");
        model.eval();

        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| no_grad(|| model.forward(black_box(&x), sample.adjacency())));
        });
    }

    group.finish();
}

fn bench_normalization(c: &mut Criterion) {
    let mut group = c.benchmark_group("gcn_normalization");

    for &n in &[100, 500, 2000] {
        let sample = sample(n);
        let edges = sample.edges().to_vec();

        group.throughput(Throughput::Elements(edges.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| Arc::new(NormalizedAdjacency::new(n, black_box(&edges)).expect("in range")));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_forward, bench_normalization);
criterion_main!(benches);
