//! Heap object benchmarks using criterion.
//!
//! Benchmarks for allocation, reference counting, release of long chains,
//! and in-place reuse of uniquely owned cells.
//!
//! Run with: cargo bench --bench memory_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ichor_runtime::{Boxed, Obj, Reuse, Tag};

const CONS: Tag = Tag::new(1);

fn list(len: i64) -> Boxed {
    (0..len)
        .rev()
        .fold(Boxed::unit(), |tail, v| Obj::alloc(CONS, [Boxed::from_i64(v), tail]).into())
}

fn map_inc(list: Boxed) -> Boxed {
    let mut cells: Vec<(Option<Reuse>, Boxed)> = Vec::new();
    let mut cur = list;
    let mut out = loop {
        let cell = match cur.into_obj() {
            Ok(cell) => cell,
            Err(nil) => break nil,
        };
        let (hole, head, tail) = match cell.try_unique() {
            Ok(mut unique) => {
                let head = unique.take_field(0);
                let tail = unique.take_field(1);
                (Some(unique.reuse()), head, tail)
            }
            Err(shared) => (None, shared.fields()[0].dup(), shared.fields()[1].dup()),
        };
        cells.push((hole, head));
        cur = tail;
    };
    while let Some((hole, head)) = cells.pop() {
        let value = Boxed::from_i64(head.as_i64().unwrap_or(0) + 1);
        out = Obj::alloc_at(hole, CONS, [value, out]).into();
    }
    out
}

fn bench_alloc(c: &mut Criterion) {
    let mut group = c.benchmark_group("alloc");

    group.bench_function("leaf", |b| {
        b.iter(|| black_box(Obj::alloc(CONS, [])));
    });

    group.bench_function("pair", |b| {
        b.iter(|| black_box(Obj::alloc(CONS, [Boxed::from_i64(1), Boxed::unit()])));
    });

    group.bench_function("boxed_large_int", |b| {
        b.iter(|| black_box(Boxed::from_i64(black_box(i64::MAX))));
    });

    group.finish();
}

fn bench_refcount(c: &mut Criterion) {
    let mut group = c.benchmark_group("refcount");
    let obj = Obj::alloc(CONS, [Boxed::from_i64(1), Boxed::unit()]);

    group.bench_function("dup_drop", |b| {
        b.iter(|| drop(black_box(obj.dup())));
    });

    group.bench_function("is_unique", |b| {
        b.iter(|| black_box(obj.is_unique()));
    });

    group.finish();
}

fn bench_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("release");

    for len in [1_000i64, 100_000] {
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::new("drop_list", len), &len, |b, &len| {
            b.iter_with_setup(|| list(len), drop);
        });
    }

    group.finish();
}

fn bench_reuse(c: &mut Criterion) {
    let mut group = c.benchmark_group("reuse");

    for len in [1_000i64, 100_000] {
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::new("map_unique", len), &len, |b, &len| {
            b.iter_with_setup(|| list(len), |xs| black_box(map_inc(xs)));
        });
        group.bench_with_input(BenchmarkId::new("map_shared", len), &len, |b, &len| {
            let xs = list(len);
            b.iter(|| black_box(map_inc(xs.dup())));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_alloc, bench_refcount, bench_release, bench_reuse);
criterion_main!(benches);
