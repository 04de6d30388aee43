use criterion::*;
use std::hint::black_box;

mod common;
use common::*;

fn spawn_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("spawn");

    for &(label, n) in &[
        ("spawn_10k", AGENTS_SMALL),
        ("spawn_100k", AGENTS_MED),
    ] {
        group.bench_function(label, |b| {
            b.iter_batched(
                make_world,
                |mut world| {
                    populate(&mut world, n);
                    black_box(world);
                },
                BatchSize::LargeInput,
            );
        });
    }

    group.bench_function("churn_destroy_recreate_10k", |b| {
        b.iter_batched(
            || {
                let mut world = make_world();
                populate(&mut world, AGENTS_SMALL);
                world
            },
            |mut world| {
                world.ctx.clear();
                populate(&mut world, AGENTS_SMALL);
                black_box(world);
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, spawn_benchmark);
criterion_main!(benches);
