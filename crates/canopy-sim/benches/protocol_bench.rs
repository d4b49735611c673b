//! Benchmarks for full protocol runs
//!
//! Measures rounds-to-convergence cost on generated graphs of increasing
//! size, and the per-round step cost on a mid-sized graph.

use canopy_sim::{Simulation, SimulationConfig};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

/// Benchmark a complete run to convergence
fn bench_converge(c: &mut Criterion) {
    let mut group = c.benchmark_group("converge");
    group.sample_size(10);

    for &nodes in &[10usize, 25, 50] {
        let config = SimulationConfig::default().with_nodes(nodes);
        group.throughput(Throughput::Elements(nodes as u64));
        group.bench_with_input(BenchmarkId::from_parameter(nodes), &config, |b, config| {
            b.iter(|| {
                let mut sim = Simulation::from_config(black_box(config)).expect("valid config");
                sim.run_until_converged().expect("converges")
            })
        });
    }
    group.finish();
}

/// Benchmark the first rounds, where every node floods its neighbors
fn bench_first_rounds(c: &mut Criterion) {
    let config = SimulationConfig::default().with_nodes(100);

    c.bench_function("first_ten_rounds_100", |b| {
        b.iter(|| {
            let mut sim = Simulation::from_config(&config).expect("valid config");
            sim.run_rounds(black_box(10)).expect("no violation");
            sim.metrics().total()
        })
    });
}

criterion_group!(benches, bench_converge, bench_first_rounds);
criterion_main!(benches);
