use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use backlog_autoscaler::control::pd::PdController;

fn pd_step_bench(c: &mut Criterion) {
    let pd = PdController::new(0.5, 1.0, 64.0);

    c.bench_function("pd_step", |b| {
        b.iter(|| {
            pd.step(black_box(1200.0), black_box(300.0));
        })
    });
}

criterion_group!(benches, pd_step_bench);
criterion_main!(benches);
