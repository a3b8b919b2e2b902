//! Wire-level telemetry event and the identity/sample types the sensor store
//! keys on. `SensorEvent` is what the bus hands us; `SensorKey`/`SensorSample`
//! are what the store keeps.

use std::time::Duration;

/// One reading delivered by the telemetry bus: `(sensor_name, timestamp, scope_id, value)`.
///
/// `t_ns` is the bus-supplied nanosecond timestamp. It is converted to a
/// sample age against the monotonic clock on ingest and is never itself used
/// for scheduling (spec §3, §9).
#[derive(Debug, Clone, PartialEq)]
pub struct SensorEvent {
    pub sensor: String,
    pub t_ns: i64,
    pub scope: String,
    pub value: f64,
}

impl SensorEvent {
    /// Rejects events the ingress must drop and count: empty sensor/scope
    /// names or a non-finite value (spec §4.1).
    pub fn is_well_formed(&self) -> bool {
        !self.sensor.is_empty() && !self.scope.is_empty() && self.value.is_finite()
    }
}

/// Identity of a sample in the store: which sensor, from which pod.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SensorKey {
    pub sensor: String,
    pub scope: String,
}

impl SensorKey {
    pub fn new(sensor: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            sensor: sensor.into(),
            scope: scope.into(),
        }
    }
}

/// The most recently observed value for a `SensorKey`, timestamped against
/// the store's monotonic clock (not the bus-supplied nanoseconds).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSample {
    pub t: Duration,
    pub value: f64,
}

/// Sensor-name prefixes the core recognises (spec §6). Substring match,
/// case-sensitive, same as the original controller's `"framesqueued" in sensor`.
pub const PREFIX_FRAMES_QUEUED: &str = "framesqueued";
pub const PREFIX_PROCESSING_RATE: &str = "frameprocessingrate";
pub const PREFIX_CPU_UTIL: &str = "cpuutil";
pub const PREFIX_MEM_BYTES: &str = "membytes";

/// `frameprocessingrate` and `framesprocessed` are both throughput sensors
/// (spec §6 glossary); either substring canonicalises to `PREFIX_PROCESSING_RATE`.
const PROCESSING_RATE_SYNONYM: &str = "framesprocessed";

pub const TRACKED_PREFIXES: &[&str] = &[
    PREFIX_FRAMES_QUEUED,
    PREFIX_PROCESSING_RATE,
    PREFIX_CPU_UTIL,
    PREFIX_MEM_BYTES,
];

/// Returns the canonical tracked prefix this sensor name matches, if any.
pub fn matching_prefix(sensor: &str) -> Option<&'static str> {
    if sensor.contains(PROCESSING_RATE_SYNONYM) {
        return Some(PREFIX_PROCESSING_RATE);
    }
    TRACKED_PREFIXES.iter().copied().find(|p| sensor.contains(p))
}
