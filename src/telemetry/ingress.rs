//! Bounded, non-blocking ingress from the bus callback thread into the
//! sliding sensor store, modeled on the teacher's `SyncManager` LockFree mode
//! (bounded `ArrayQueue`, dedicated drain thread, dropped-counter) — spec
//! §4.1.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_queue::ArrayQueue;
use log::{error, warn};

use crate::error::IngressError;
use crate::store::sliding::SlidingSensorStore;

use super::event::{SensorEvent, SensorKey, SensorSample};

const DRAIN_POLL: Duration = Duration::from_millis(5);
const DRAIN_DEADLINE: Duration = Duration::from_millis(100);

/// Cheaply cloneable producer-side handle: exactly what the bus callback
/// thread is allowed to touch (spec §4.1, §5 — "the bus callback thread only
/// enqueues"). Carries none of the worker's `JoinHandle`, so it can be
/// handed to an arbitrary number of callback threads without entangling
/// their lifetime with the drain worker's.
#[derive(Clone)]
pub struct IngressProducer {
    queue: Arc<ArrayQueue<SensorEvent>>,
    dropped: Arc<AtomicU64>,
    decode_errors: Arc<AtomicU64>,
}

impl IngressProducer {
    /// Called from the bus callback thread. Never blocks: a full queue
    /// overwrites the oldest pending event and counts the drop (spec §4.1).
    pub fn enqueue(&self, event: SensorEvent) {
        if !event.is_well_formed() {
            self.decode_errors.fetch_add(1, Ordering::Relaxed);
            error!(
                "dropping malformed sensor event from scope {:?}: empty name/scope or non-finite value",
                event.scope
            );
            return;
        }
        if let Some(_overwritten) = self.queue.force_push(event) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            warn!("ingress queue full, dropped oldest pending event");
        }
    }
}

/// Subscribes to the bus from the callback's perspective: enqueues onto a
/// bounded, drop-oldest queue and never blocks. A dedicated worker drains
/// into the store.
pub struct TelemetryIngress {
    queue: Arc<ArrayQueue<SensorEvent>>,
    dropped: Arc<AtomicU64>,
    decode_errors: Arc<AtomicU64>,
    worker: Option<JoinHandle<()>>,
}

impl TelemetryIngress {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Arc::new(ArrayQueue::new(capacity)),
            dropped: Arc::new(AtomicU64::new(0)),
            decode_errors: Arc::new(AtomicU64::new(0)),
            worker: None,
        }
    }

    /// A cloneable handle for the bus callback thread(s) to enqueue through,
    /// independent of this struct's own lifetime.
    pub fn producer(&self) -> IngressProducer {
        IngressProducer {
            queue: self.queue.clone(),
            dropped: self.dropped.clone(),
            decode_errors: self.decode_errors.clone(),
        }
    }

    /// Called from the bus callback thread. Never blocks: a full queue
    /// overwrites the oldest pending event and counts the drop (spec §4.1).
    pub fn enqueue(&self, event: SensorEvent) {
        self.producer().enqueue(event);
    }

    /// Spawns the single drain worker that writes into `store` until
    /// `shutdown` is observed, then drains whatever remains up to
    /// `DRAIN_DEADLINE` before exiting (spec §5 cancellation).
    pub fn start(&mut self, store: Arc<SlidingSensorStore>, shutdown: Arc<AtomicBool>) {
        let queue = self.queue.clone();
        self.worker = Some(thread::spawn(move || {
            while !shutdown.load(Ordering::Acquire) {
                drain_once(&queue, &store);
                thread::sleep(DRAIN_POLL);
            }
            let deadline = Instant::now() + DRAIN_DEADLINE;
            while Instant::now() < deadline {
                if queue.is_empty() {
                    break;
                }
                drain_once(&queue, &store);
                thread::sleep(DRAIN_POLL);
            }
        }));
    }

    pub fn join(&mut self) {
        if let Some(h) = self.worker.take() {
            let _ = h.join();
        }
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn decode_error_count(&self) -> u64 {
        self.decode_errors.load(Ordering::Relaxed)
    }

    #[cfg(test)]
    pub(crate) fn pending(&self) -> usize {
        self.queue.len()
    }
}

fn drain_once(queue: &ArrayQueue<SensorEvent>, store: &SlidingSensorStore) {
    while let Some(event) = queue.pop() {
        let key = SensorKey::new(event.sensor, event.scope);
        let sample = SensorSample {
            t: store.now(),
            value: event.value,
        };
        store.put(key, sample);
    }
}

/// Decodes a raw `(sensor, time_ns, scope, value)` tuple as delivered by the
/// bus, rejecting malformed fields before they ever reach the queue.
pub fn decode(
    sensor: impl Into<String>,
    t_ns: i64,
    scope: impl Into<String>,
    value: f64,
) -> Result<SensorEvent, IngressError> {
    let sensor = sensor.into();
    let scope = scope.into();
    if sensor.is_empty() || scope.is_empty() {
        return Err(IngressError::Decode {
            scope: scope.clone(),
            reason: "empty sensor or scope name".to_string(),
        });
    }
    if !value.is_finite() {
        return Err(IngressError::Decode {
            scope,
            reason: format!("non-finite value {value}"),
        });
    }
    Ok(SensorEvent {
        sensor,
        t_ns,
        scope,
        value,
    })
}
