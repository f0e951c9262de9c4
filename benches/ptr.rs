use criterion::{black_box, criterion_group, criterion_main, Criterion};
use intrc::{Counted, IntrusivePtr};
use std::sync::Arc;

fn create_benchmark(c: &mut Criterion) {
    c.bench_function("intrc::IntrusivePtr::new", |b| {
        b.iter(|| {
            let data = black_box([42u8; 1024]);

            IntrusivePtr::new(Counted::new(data))
        })
    });
    c.bench_function("std::sync::Arc::new", |b| {
        b.iter(|| {
            let data = black_box([42u8; 1024]);

            Arc::new(data)
        })
    });
}

fn clone_benchmark(c: &mut Criterion) {
    let std_arc = Arc::new([42u8; 1024]);
    let intrusive = IntrusivePtr::new(Counted::new([42u8; 1024]));
    c.bench_function("intrc::IntrusivePtr::clone", |b| {
        b.iter(|| IntrusivePtr::clone(&intrusive))
    });
    c.bench_function("std::sync::Arc::clone", |b| b.iter(|| Arc::clone(&std_arc)));
}

fn drop_benchmark(c: &mut Criterion) {
    let std_arc = Arc::new([42u8; 1024]);
    let intrusive = IntrusivePtr::new(Counted::new([42u8; 1024]));
    c.bench_function("intrc::IntrusivePtr::drop", |b| {
        b.iter(|| {
            let clone = IntrusivePtr::clone(&intrusive);
            drop(black_box(clone));
        })
    });
    c.bench_function("std::sync::Arc::drop", |b| {
        b.iter(|| {
            let clone = Arc::clone(&std_arc);
            drop(black_box(clone));
        })
    });
}

criterion_group!(benches, create_benchmark, clone_benchmark, drop_benchmark);
criterion_main!(benches);
