//! Context switch micro-benchmarks
//!
//! cargo bench -p gvfiber-runtime

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gvfiber_runtime::{Context, Stack};

extern "C" fn echo(from: Context, data: usize) {
    let mut back = from;
    let mut data = data;
    loop {
        let t = unsafe { back.switch(data, false) };
        back = t.context;
        data = t.data;
    }
}

extern "C" fn echo_fpu(from: Context, data: usize) {
    let mut back = from;
    let mut data = data;
    loop {
        let t = unsafe { back.switch(data, true) };
        back = t.context;
        data = t.data;
    }
}

fn bench_round_trip(c: &mut Criterion) {
    let stack = Stack::new(64 * 1024).unwrap();

    let mut fiber = Some(unsafe { stack.context(echo) });
    c.bench_function("switch round trip", |b| {
        b.iter(|| {
            let t = unsafe { fiber.take().unwrap().switch(black_box(1), false) };
            fiber = Some(t.context);
            t.data
        })
    });

    let stack_fpu = Stack::new(64 * 1024).unwrap();
    let mut fiber = Some(unsafe { stack_fpu.context(echo_fpu) });
    c.bench_function("switch round trip preserve_fpu", |b| {
        b.iter(|| {
            let t = unsafe { fiber.take().unwrap().switch(black_box(1), true) };
            fiber = Some(t.context);
            t.data
        })
    });
}

fn bench_create(c: &mut Criterion) {
    let stack = Stack::new(64 * 1024).unwrap();
    c.bench_function("context create", |b| {
        b.iter(|| black_box(unsafe { stack.context(echo) }).into_raw())
    });
    c.bench_function("stack allocate 64K", |b| {
        b.iter(|| Stack::new(black_box(64 * 1024)).unwrap())
    });
}

criterion_group!(benches, bench_round_trip, bench_create);
criterion_main!(benches);
