//! Time-indexed sensor store: the single piece of shared mutable state in
//! the crate (spec §3, §5). Single-writer (ingress worker), single-reader
//! (control loop). Grounded on the teacher's `SyncManager` (`DashMap` primary
//! map, `parking_lot::Mutex` for the secondary index) and the original
//! `controller.py`'s `all_sensors` dict plus its age-based filtering in
//! `adaptive_control.py::run`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::telemetry::event::{SensorKey, SensorSample, matching_prefix};

/// Per-sensor-name mapping from scope/pod to most-recent `(t, value)`,
/// pruning entries older than `window`.
pub struct SlidingSensorStore {
    samples: DashMap<SensorKey, SensorSample>,
    /// Groups keys by the tracked prefix they matched, so `query` only
    /// visits matching keys instead of scanning the whole map (spec §4.2).
    by_prefix: Mutex<HashMap<&'static str, Vec<SensorKey>>>,
    window: Duration,
    clock: Instant,
}

impl SlidingSensorStore {
    pub fn new(window: Duration) -> Self {
        Self {
            samples: DashMap::new(),
            by_prefix: Mutex::new(HashMap::new()),
            window,
            clock: Instant::now(),
        }
    }

    /// Age of an instant against this store's monotonic clock.
    pub fn now(&self) -> Duration {
        self.clock.elapsed()
    }

    /// Inserts or overwrites a sample, discarding it if its timestamp is
    /// older than what's already stored (spec §3: "the store monotonically
    /// advances in timestamp" per key). Registers the key in the prefix
    /// index on first insert for that key/prefix pair.
    pub fn put(&self, key: SensorKey, sample: SensorSample) {
        let is_new_key = !self.samples.contains_key(&key);
        let mut accepted = true;
        self.samples
            .entry(key.clone())
            .and_modify(|existing| {
                if sample.t >= existing.t {
                    *existing = sample;
                } else {
                    accepted = false;
                }
            })
            .or_insert(sample);

        if is_new_key && accepted {
            if let Some(prefix) = matching_prefix(&key.sensor) {
                self.by_prefix.lock().entry(prefix).or_default().push(key);
            }
        }
    }

    pub fn get(&self, key: &SensorKey) -> Option<SensorSample> {
        self.samples.get(key).map(|s| *s.value())
    }

    /// Samples matching `prefix` with age `now - t <= window`. Samples older
    /// than `window` are skipped (not removed — see [`Self::gc`]).
    pub fn query(&self, prefix: &str, now: Duration) -> Vec<(SensorKey, SensorSample)> {
        let keys = {
            let index = self.by_prefix.lock();
            index.get(prefix).cloned().unwrap_or_default()
        };
        keys.into_iter()
            .filter_map(|key| {
                let sample = self.samples.get(&key)?;
                let sample = *sample.value();
                if now.saturating_sub(sample.t) <= self.window {
                    Some((key, sample))
                } else {
                    None
                }
            })
            .collect()
    }

    /// Removes entries older than `window`. Idempotent: a second call with
    /// the same `now` is a no-op (spec §8).
    pub fn gc(&self, now: Duration) {
        self.samples
            .retain(|_, sample| now.saturating_sub(sample.t) <= self.window);

        let mut index = self.by_prefix.lock();
        for keys in index.values_mut() {
            keys.retain(|k| self.samples.contains_key(k));
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}
