//! Criterion benchmarks for the hot-path operations.
//!
//! Measures:
//! - Add order (no matching side)
//! - Cancel order
//! - Market sweep across pre-populated depth
//! - Mixed add/cancel/market workload

use bitlob::config::BASE_PRICE;
use bitlob::{Engine, OrderMessage, Side};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn random_add(rng: &mut ChaCha8Rng, order_id: u64) -> OrderMessage {
    let side = if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell };
    let price = match side {
        Side::Buy => BASE_PRICE - rng.gen_range(1..200),
        Side::Sell => BASE_PRICE + rng.gen_range(1..200),
    };
    OrderMessage::add(order_id, side, price, rng.gen_range(1..500), order_id)
}

fn bench_add_no_match(c: &mut Criterion) {
    let mut engine = Engine::new(1_000_000);
    engine.warm_up();
    let mut order_id = 0u64;

    c.bench_function("add_no_match", |b| {
        b.iter(|| {
            order_id += 1;
            let msg = OrderMessage::add(order_id, Side::Buy, BASE_PRICE - 100, 100, order_id);
            black_box(engine.process(&msg))
        })
    });
}

fn bench_cancel(c: &mut Criterion) {
    c.bench_function("add_then_cancel", |b| {
        let mut engine = Engine::new(1_000_000);
        engine.warm_up();
        let mut order_id = 0u64;
        b.iter(|| {
            order_id += 1;
            engine.process(&OrderMessage::add(order_id, Side::Buy, BASE_PRICE - 100, 100, order_id));
            black_box(engine.process(&OrderMessage::cancel(order_id, order_id)))
        })
    });
}

fn bench_market_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("market_sweep");

    for depth in [1u32, 10, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            let mut engine = Engine::new(1_000_000);
            engine.warm_up();
            let mut next_id = 0u64;
            b.iter(|| {
                // Refill the asks swept by the previous iteration.
                for level in 0..depth {
                    next_id += 1;
                    engine.process(&OrderMessage::add(
                        next_id,
                        Side::Sell,
                        BASE_PRICE + 1 + level,
                        1,
                        next_id,
                    ));
                }
                next_id += 1;
                black_box(engine.process(&OrderMessage::market(next_id, Side::Buy, depth, next_id)))
            })
        });
    }
    group.finish();
}

fn bench_mixed_workload(c: &mut Criterion) {
    c.bench_function("mixed_workload", |b| {
        let mut engine = Engine::new(1_000_000);
        engine.warm_up();
        let mut rng = ChaCha8Rng::seed_from_u64(0xB17B0B);
        let mut next_id = 0u64;
        let mut resting: Vec<u64> = Vec::with_capacity(1024);

        b.iter(|| {
            let roll = rng.gen_range(0..10);
            if roll < 6 || resting.is_empty() {
                next_id += 1;
                engine.process(&random_add(&mut rng, next_id));
                resting.push(next_id);
            } else if roll < 9 {
                let idx = rng.gen_range(0..resting.len());
                let id = resting.swap_remove(idx);
                engine.process(&OrderMessage::cancel(id, next_id));
            } else {
                next_id += 1;
                let side = if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell };
                engine.process(&OrderMessage::market(next_id, side, rng.gen_range(1..300), next_id));
            }
            black_box(engine.best_bid())
        })
    });
}

criterion_group!(
    benches,
    bench_add_no_match,
    bench_cancel,
    bench_market_sweep,
    bench_mixed_workload
);
criterion_main!(benches);
