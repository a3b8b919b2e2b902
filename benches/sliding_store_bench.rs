/*
This benchmark measures put/query throughput on the sliding sensor store
under the same single-writer, concurrent-reader shape the control loop and
ingress worker impose on it at runtime (spec store::sliding).
*/

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::Duration;

use backlog_autoscaler::store::aggregator::Aggregator;
use backlog_autoscaler::store::sliding::SlidingSensorStore;
use backlog_autoscaler::telemetry::event::{SensorKey, SensorSample};

fn seeded_store(pods: usize) -> SlidingSensorStore {
    let store = SlidingSensorStore::new(Duration::from_secs(2));
    for i in 0..pods {
        store.put(
            SensorKey::new("framesqueued", format!("pod-{i}")),
            SensorSample {
                t: store.now(),
                value: 300.0,
            },
        );
        store.put(
            SensorKey::new("frameprocessingrate", format!("pod-{i}")),
            SensorSample {
                t: store.now(),
                value: 100.0,
            },
        );
    }
    store
}

fn bench_put(c: &mut Criterion) {
    let store = seeded_store(64);
    let key = SensorKey::new("framesqueued", "pod-0");

    c.bench_function("sliding_store_put", |b| {
        b.iter(|| {
            store.put(
                key.clone(),
                SensorSample {
                    t: store.now(),
                    value: 300.0,
                },
            );
        })
    });
}

fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("sliding_store_aggregate");

    for pods in [8usize, 64, 512] {
        let store = seeded_store(pods);
        group.bench_with_input(BenchmarkId::new("total_queued", pods), &pods, |b, _| {
            let agg = Aggregator::new(&store);
            b.iter(|| agg.total_queued(store.now()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_put, bench_aggregate);
criterion_main!(benches);
