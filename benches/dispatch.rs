//! Flat-index mapping and parallel dispatch throughput.

use std::sync::atomic::{AtomicI64, Ordering};

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use ndloop::{
    force_static, DispatchPlan, ExecutionContext, FoldConstants, KernelArgs, LaunchConfig,
    RangeLoop, ResolvedDomain, StorageRegistry,
};

/// Benchmark: flat → tuple mapping for rank 1, 3 and 6 domains.
fn bench_map(c: &mut Criterion) {
    let domains: [Vec<(i64, i64)>; 3] = [
        vec![(0, 1 << 16)],
        vec![(4, 36), (3, 35), (0, 64)],
        vec![(0, 4); 6],
    ];
    let mut group = c.benchmark_group("map");
    for axes in domains {
        let plan = DispatchPlan::new(&ResolvedDomain::new(&axes)).unwrap();
        group.bench_function(format!("rank_{}", plan.rank()), |b| {
            b.iter(|| {
                let mut acc = 0i64;
                for flat in 0..plan.total() {
                    acc = acc.wrapping_add(plan.map(black_box(flat)).sum());
                }
                acc
            })
        });
    }
    group.finish();
}

/// Benchmark: a trivial body over a 512x512 domain, parallel vs static.
fn bench_dispatch(c: &mut Criterion) {
    let ctx = ExecutionContext::new(LaunchConfig::default(), StorageRegistry::empty()).unwrap();
    let lp = RangeLoop::from(ndloop::ndrange![512, 512].unwrap())
        .compile()
        .unwrap();
    let args = KernelArgs::new();

    let mut group = c.benchmark_group("dispatch");
    group.bench_function("parallel_512x512", |b| {
        b.iter(|| {
            let acc = AtomicI64::new(0);
            ctx.launch(&lp, &args, |it| {
                acc.fetch_add(it.index().sum(), Ordering::Relaxed);
                Ok(())
            })
            .unwrap();
            acc.into_inner()
        })
    });

    let unrolled = force_static(
        ndloop::group(ndloop::ndrange![64, 64].unwrap()),
        &FoldConstants,
        ctx.config(),
    )
    .unwrap();
    group.bench_function("static_64x64", |b| {
        b.iter(|| {
            let mut acc = 0i64;
            unrolled
                .for_each(|it| {
                    acc += black_box(it.index().sum());
                    Ok::<(), ()>(())
                })
                .unwrap();
            acc
        })
    });
    group.finish();
}

criterion_group!(benches, bench_map, bench_dispatch);
criterion_main!(benches);
