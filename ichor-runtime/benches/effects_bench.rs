//! Effect handler benchmarks using criterion.
//!
//! Benchmarks for handler installation, tail-resumptive operation calls,
//! captured resumptions, and lookup through deep evidence vectors.
//!
//! Run with: cargo bench --bench effects_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ichor_runtime::{Boxed, Clause, Context, Ctl, EffectTag, HandlerBuilder, Obj, Op};

const READER: EffectTag = EffectTag::new("reader");
const ASK: Op = Op::new(READER, 0);

const NOISE: EffectTag = EffectTag::new("noise");

fn reader_tail() -> Obj {
    HandlerBuilder::new(READER)
        .op(Clause::value(|_| Boxed::from_i64(1)))
        .build()
}

fn reader_control() -> Obj {
    HandlerBuilder::new(READER)
        .op(Clause::control(|ctx, _, k| k.resume(ctx, Boxed::from_i64(1))))
        .build()
}

fn ask_n(ctx: &mut Context, n: i64, acc: i64) -> Ctl {
    if n == 0 {
        return Ctl::pure(acc);
    }
    ctx.perform(ASK, Vec::new())
        .bind(ctx, move |ctx, v| ask_n(ctx, n - 1, acc + v.as_i64().unwrap_or(0)))
}

fn bench_handle(c: &mut Criterion) {
    let mut group = c.benchmark_group("handle");

    group.bench_function("install_return", |b| {
        let mut ctx = Context::default();
        b.iter(|| {
            let result = ctx.handle_default(reader_tail(), |_| Ctl::unit());
            black_box(result.into_value())
        });
    });

    group.finish();
}

fn bench_perform(c: &mut Criterion) {
    let mut group = c.benchmark_group("perform");

    group.bench_function("tail_resumptive", |b| {
        let mut ctx = Context::default();
        b.iter(|| {
            let result = ctx.handle_default(reader_tail(), |ctx| ask_n(ctx, 100, 0));
            black_box(result.into_value())
        });
    });

    group.bench_function("captured_resume", |b| {
        let mut ctx = Context::default();
        b.iter(|| {
            let result = ctx.handle_default(reader_control(), |ctx| ask_n(ctx, 100, 0));
            black_box(result.into_value())
        });
    });

    group.finish();
}

fn bench_lookup_depth(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup_depth");

    for depth in [0usize, 8, 64] {
        group.bench_with_input(BenchmarkId::new("scan", depth), &depth, |b, &depth| {
            let mut ctx = Context::default();
            b.iter(|| {
                let result = ctx.handle_default(reader_tail(), |ctx| {
                    with_noise(ctx, depth, &|ctx| ctx.perform(ASK, Vec::new()))
                });
                black_box(result.into_value())
            });
        });

        group.bench_with_input(BenchmarkId::new("hinted", depth), &depth, |b, &depth| {
            let mut ctx = Context::default();
            let hinted = ASK.with_hint(depth);
            b.iter(|| {
                let result = ctx.handle_default(reader_tail(), |ctx| {
                    with_noise(ctx, depth, &|ctx| ctx.perform(hinted, Vec::new()))
                });
                black_box(result.into_value())
            });
        });
    }

    group.finish();
}

/// Run `body` under `depth` unrelated handlers.
fn with_noise(ctx: &mut Context, depth: usize, body: &dyn Fn(&mut Context) -> Ctl) -> Ctl {
    if depth == 0 {
        return body(ctx);
    }
    let mut scope = ctx.install(NOISE, HandlerBuilder::new(NOISE).build());
    with_noise(&mut scope, depth - 1, body)
}

criterion_group!(benches, bench_handle, bench_perform, bench_lookup_depth);
criterion_main!(benches);
