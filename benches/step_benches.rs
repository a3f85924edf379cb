use criterion::{criterion_group, criterion_main, Criterion};
use npr_sph::cpu::sph3d::{NeighborSearch, SPHState, SimParams};

fn bench_step(c: &mut Criterion) {
    let params = SimParams::default();
    let spacing = 0.004; // spacing < h for overlap

    let mut brute = SPHState::new();
    brute.init_grid(16, 16, 16, spacing);

    let mut grid = SPHState::new();
    grid.init_grid(16, 16, 16, spacing);
    grid.neighbor_search = NeighborSearch::UniformGrid;

    c.bench_function("step_4k_brute", |b| b.iter(|| brute.step(&params)));
    c.bench_function("step_4k_grid", |b| b.iter(|| grid.step(&params)));
}

criterion_group!(benches, bench_step);
criterion_main!(benches);
