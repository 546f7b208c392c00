//! Per-message latency percentile report.
//!
//! Drives the engine with a pre-generated message stream and records each
//! `process` call in an HDR histogram. Pins to the last core to keep the
//! scheduler out of the tail.

use bitlob::config::BASE_PRICE;
use bitlob::{Engine, OrderMessage, Side};
use hdrhistogram::Histogram;
use std::time::Instant;

const WARMUP_MESSAGES: usize = 10_000;
const ITERATIONS: usize = 1_000_000;

fn pin_to_last_core() {
    if let Some(core_ids) = core_affinity::get_core_ids() {
        if let Some(last) = core_ids.last() {
            if core_affinity::set_for_current(*last) {
                println!("Pinned to core {:?}", last);
            }
        }
    }
}

fn message_stream(count: usize) -> Vec<OrderMessage> {
    let mut messages = Vec::with_capacity(count);
    let mut next_cancel = 1u64;
    for i in 0..count {
        let id = (i + 1) as u64;
        let ts = id;
        // 60% adds, 30% cancels, 10% market sweeps.
        let msg = match i % 10 {
            0..=5 => {
                let side = if i % 2 == 0 { Side::Buy } else { Side::Sell };
                let offset = (id % 64) as u32;
                let price = match side {
                    Side::Buy => BASE_PRICE - 1 - offset,
                    Side::Sell => BASE_PRICE + 1 + offset,
                };
                OrderMessage::add(id, side, price, 10 + (id % 90) as u32, ts)
            }
            6..=8 => {
                let target = next_cancel;
                next_cancel += 1;
                OrderMessage::cancel(target, ts)
            }
            _ => {
                let side = if i % 20 == 9 { Side::Buy } else { Side::Sell };
                OrderMessage::market(id, side, 50, ts)
            }
        };
        messages.push(msg);
    }
    messages
}

fn main() {
    println!("Preparing latency report...");
    pin_to_last_core();

    let mut engine = Engine::new(2_000_000);
    engine.warm_up();

    let mut histogram = Histogram::<u64>::new_with_bounds(1, 10_000_000, 3)
        .expect("histogram bounds are static");

    println!("Pre-generating {} messages...", ITERATIONS + WARMUP_MESSAGES);
    let messages = message_stream(ITERATIONS + WARMUP_MESSAGES);

    println!("Warming up branch predictor ({} messages)...", WARMUP_MESSAGES);
    for msg in &messages[..WARMUP_MESSAGES] {
        std::hint::black_box(engine.process(msg));
    }

    println!("Measuring {} messages...", ITERATIONS);
    for msg in &messages[WARMUP_MESSAGES..] {
        let start = Instant::now();
        std::hint::black_box(engine.process(msg));
        let nanos = start.elapsed().as_nanos() as u64;
        histogram.record(nanos.max(1)).expect("value within bounds");
    }

    println!();
    println!("Latency (ns) over {} messages:", histogram.len());
    println!("  mean   {:>10.1}", histogram.mean());
    for quantile in [0.50, 0.90, 0.99, 0.999, 0.9999] {
        println!("  p{:<6} {:>10}", quantile * 100.0, histogram.value_at_quantile(quantile));
    }
    println!("  max    {:>10}", histogram.max());
    println!();
    println!("Engine-side average: {:.1} ns", engine.average_latency_ns());
    println!("Resting orders at exit: {}", engine.book().order_count());
}
