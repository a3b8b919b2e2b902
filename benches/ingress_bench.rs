use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use backlog_autoscaler::telemetry::event::SensorEvent;
use backlog_autoscaler::telemetry::ingress::TelemetryIngress;

fn event(seq: i64) -> SensorEvent {
    SensorEvent {
        sensor: "framesqueued".to_string(),
        t_ns: seq,
        scope: "pod-a".to_string(),
        value: 300.0,
    }
}

fn bench_enqueue(c: &mut Criterion) {
    // Queue large enough that this measures enqueue cost, not drop-oldest
    // contention (spec §4.1's bounded, drop-oldest channel is exercised by
    // the ingress unit tests, not this throughput benchmark).
    let ingress = TelemetryIngress::new(1 << 16);

    c.bench_function("ingress_enqueue", |b| {
        let mut seq = 0i64;
        b.iter(|| {
            ingress.enqueue(black_box(event(seq)));
            seq += 1;
        })
    });
}

criterion_group!(benches, bench_enqueue);
criterion_main!(benches);
