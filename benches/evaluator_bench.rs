use circa::{BranchId, World, WorldConfig, apply_feedback, evaluate_branch, initialize_with_config};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

/// `n` chained float additions: `x1 = add(x0, step)`, `x2 = add(x1, step)`, ...
fn build_chain(world: &mut World, n: usize) -> (BranchId, circa::TermId) {
    let branch = world.create_branch();
    let mut last = world.create_float(branch, 0.0, Some("x")).unwrap();
    let step = world.create_float(branch, 0.5, Some("step")).unwrap();
    for _ in 0..n {
        last = world.call(branch, "add", vec![last, step]).unwrap();
    }
    (branch, last)
}

/// A loop over `range(n)` whose body keeps per-iteration state.
fn build_stateful_loop(world: &mut World, n: i64) -> BranchId {
    let branch = world.create_branch();
    let t = world.builtin_types().clone();
    let count = world.create_int(branch, n, None).unwrap();
    let items = world.call(branch, "range", vec![count]).unwrap();
    let (_, body) = world.for_loop(branch, items, "x").unwrap();
    let total = world.declare_state(body, "total", t.int.clone(), None).unwrap();
    let x = world.graph.lookup(body, "x").unwrap();
    world.call_named(body, "total", "add", vec![total, x]).unwrap();
    branch
}

fn bench_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate/chain");

    for &size in &[10, 100, 1_000] {
        let mut world = initialize_with_config(WorldConfig::default()).unwrap();
        let (branch, _) = build_chain(&mut world, size);
        let mut stack = world.alloc_stack();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                evaluate_branch(&mut world, &mut stack, branch).unwrap();
                black_box(stack.depth());
            });
        });
    }

    group.finish();
}

fn bench_stateful_loop(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate/stateful_loop");

    for &size in &[10, 100, 1_000] {
        let mut world = initialize_with_config(WorldConfig::default()).unwrap();
        let branch = build_stateful_loop(&mut world, size);
        let mut stack = world.alloc_stack();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                evaluate_branch(&mut world, &mut stack, branch).unwrap();
            });
        });
    }

    group.finish();
}

fn bench_feedback(c: &mut Criterion) {
    let mut group = c.benchmark_group("feedback/chain");

    for &size in &[10, 100] {
        let mut world = initialize_with_config(WorldConfig::default()).unwrap();
        let (_, last) = build_chain(&mut world, size);
        if let Some(x) = world.graph.lookup(world.graph.term(last).unwrap().owning_branch, "x") {
            world.set_trainable(x, true).unwrap();
        }
        let desired = world.builtin_types().make_float(1.0);

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                apply_feedback(&mut world, last, black_box(desired.clone())).unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_chain, bench_stateful_loop, bench_feedback);
criterion_main!(benches);
