//! On-demand aggregation of queue depth and processing rate across all pods
//! of the active deployment. Grounded on `adaptive_control.py::run`'s
//! `total_queued_frames`/`total_processing_rate` sums over recent samples
//! (spec §4.3).

use std::collections::HashSet;
use std::time::Duration;

use crate::telemetry::event::{PREFIX_FRAMES_QUEUED, PREFIX_PROCESSING_RATE};

use super::sliding::SlidingSensorStore;

/// Empty scope-exclusion set shared by callers that don't enable
/// `exclude_terminating` (spec §9 Open Question).
fn no_exclusions() -> HashSet<String> {
    HashSet::new()
}

pub struct Aggregator<'a> {
    store: &'a SlidingSensorStore,
}

impl<'a> Aggregator<'a> {
    pub fn new(store: &'a SlidingSensorStore) -> Self {
        Self { store }
    }

    /// Sum of `value` over all fresh `framesqueued` samples. `0.0` if none
    /// match (spec §4.3).
    pub fn total_queued(&self, now: Duration) -> f64 {
        self.total_queued_excluding(now, &no_exclusions())
    }

    /// Sum of `value` over all fresh `frameprocessingrate` samples. `0.0` if
    /// none match.
    pub fn total_processing_rate(&self, now: Duration) -> f64 {
        self.total_processing_rate_excluding(now, &no_exclusions())
    }

    /// As [`Self::total_queued`], but skips samples whose scope (pod
    /// identity) is in `excluded_scopes` — the default-off policy the spec's
    /// `exclude_terminating` Open Question resolves to (spec §9, §4.3).
    pub fn total_queued_excluding(&self, now: Duration, excluded_scopes: &HashSet<String>) -> f64 {
        self.store
            .query(PREFIX_FRAMES_QUEUED, now)
            .iter()
            .filter(|(key, _)| !excluded_scopes.contains(&key.scope))
            .map(|(_, s)| s.value)
            .sum()
    }

    pub fn total_processing_rate_excluding(
        &self,
        now: Duration,
        excluded_scopes: &HashSet<String>,
    ) -> f64 {
        self.store
            .query(PREFIX_PROCESSING_RATE, now)
            .iter()
            .filter(|(key, _)| !excluded_scopes.contains(&key.scope))
            .map(|(_, s)| s.value)
            .sum()
    }
}
