//! Benchmarks for subject fan-out and operator chains.
//!
//! Run with: cargo bench -p conflux-core

use std::cell::Cell;
use std::hint::black_box;
use std::rc::Rc;

use conflux_core::{Just, Never, PassthroughSubject, PublisherExt, Sequence, Subscription};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

// ============================================================================
// Subject fan-out
// ============================================================================

fn bench_subject_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("subject/fanout");

    for subscribers in [1usize, 8, 64] {
        let subject: PassthroughSubject<u64, Never> = PassthroughSubject::new();
        let total = Rc::new(Cell::new(0u64));
        let _subs: Vec<Subscription> = (0..subscribers)
            .map(|_| {
                let total = Rc::clone(&total);
                subject.sink_value(move |v| total.set(total.get().wrapping_add(v)))
            })
            .collect();

        group.bench_with_input(
            BenchmarkId::new("send", subscribers),
            &subscribers,
            |b, _| {
                b.iter(|| {
                    subject.send(black_box(3));
                })
            },
        );
        black_box(total.get());
    }

    group.finish();
}

// ============================================================================
// Operator chains
// ============================================================================

fn bench_operator_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("operators/chain");

    for depth in [1usize, 4, 16] {
        let subject: PassthroughSubject<u64, Never> = PassthroughSubject::new();
        let mut chain = subject.clone().boxed();
        for _ in 0..depth {
            chain = chain.map(|v| v.wrapping_mul(3)).boxed();
        }
        let total = Rc::new(Cell::new(0u64));
        let sink_total = Rc::clone(&total);
        let _sub = chain.sink_value(move |v| sink_total.set(v));

        group.bench_with_input(BenchmarkId::new("map", depth), &depth, |b, _| {
            b.iter(|| {
                subject.send(black_box(7));
            })
        });
        black_box(total.get());
    }

    group.finish();
}

fn bench_flat_map(c: &mut Criterion) {
    let mut group = c.benchmark_group("operators/flat_map");

    for len in [16usize, 256] {
        let source: Sequence<u64> = (0..len as u64).collect();
        group.bench_with_input(BenchmarkId::new("just", len), &source, |b, source| {
            b.iter(|| {
                let total = Rc::new(Cell::new(0u64));
                let sink_total = Rc::clone(&total);
                let _sub = source
                    .clone()
                    .flat_map(|v| Just::new(v * v))
                    .sink_value(move |v| sink_total.set(sink_total.get() + v));
                black_box(total.get())
            })
        });
    }

    group.finish();
}

// ============================================================================
// Subscribe / cancel churn
// ============================================================================

fn bench_subscribe_cancel(c: &mut Criterion) {
    let subject: PassthroughSubject<u64, Never> = PassthroughSubject::new();
    c.bench_function("subject/subscribe_cancel", |b| {
        b.iter(|| {
            let sub = subject.sink_value(|v| {
                black_box(v);
            });
            drop(black_box(sub));
        })
    });
}

criterion_group!(
    benches,
    bench_subject_fanout,
    bench_operator_chain,
    bench_flat_map,
    bench_subscribe_cancel
);
criterion_main!(benches);
