//! The telemetry bus boundary. The real bus client is out of scope (spec
//! §1); this crate only consumes a `subscribe` surface and ships a
//! [`SimulatedBus`] adapter for local runs and tests, generating readings the
//! same way the teacher's sensor module generates periodic noisy readings.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use rand::Rng;

use super::event::SensorEvent;

/// One delivered reading, exactly as the bus hands it to a subscriber:
/// `(sensor_name, time_ns, scope, value)` (spec §6).
pub type BusCallback = dyn Fn(SensorEvent) + Send + Sync;

/// Consumed collaborator: a subscribe/publish telemetry bus client.
///
/// Implementations own the callback thread and MUST NOT block it — the
/// contract is a single non-blocking dispatch per event (spec §5).
pub trait TelemetryBus: Send + Sync {
    /// Begins streaming. `on_event` is invoked once per delivered reading
    /// from a dedicated thread owned by the bus client; it returns
    /// immediately, before streaming actually starts.
    fn subscribe(&self, on_event: Arc<BusCallback>, shutdown: Arc<AtomicBool>);
}

/// A single simulated pod emitting `framesqueued` and `frameprocessingrate`
/// readings on a fixed period, for local runs and integration tests where no
/// real bus is available.
pub struct SimulatedPod {
    pub scope: String,
    pub framesqueued: f64,
    pub frameprocessingrate: f64,
}

/// Deterministic-shape, noise-perturbed bus stand-in. Publishes one
/// `framesqueued` and one `frameprocessingrate` event per configured pod,
/// every `period`, until `shutdown` is observed.
pub struct SimulatedBus {
    pods: Vec<SimulatedPod>,
    period: Duration,
    noise: f64,
}

impl SimulatedBus {
    pub fn new(pods: Vec<SimulatedPod>, period: Duration) -> Self {
        Self {
            pods,
            period,
            noise: 0.0,
        }
    }

    /// Adds uniform multiplicative jitter in `[-noise, noise]` to each
    /// emitted value, mirroring the teacher's noisy-reading generator.
    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = noise;
        self
    }
}

impl TelemetryBus for SimulatedBus {
    fn subscribe(&self, on_event: Arc<BusCallback>, shutdown: Arc<AtomicBool>) {
        let pods: Vec<SimulatedPod> = self
            .pods
            .iter()
            .map(|p| SimulatedPod {
                scope: p.scope.clone(),
                framesqueued: p.framesqueued,
                frameprocessingrate: p.frameprocessingrate,
            })
            .collect();
        let period = self.period;
        let noise = self.noise;

        thread::spawn(move || {
            let mut rng = rand::rng();
            while !shutdown.load(Ordering::Acquire) {
                let now_ns = monotonic_ns();
                for pod in &pods {
                    let jitter = |base: f64| {
                        if noise <= 0.0 {
                            base
                        } else {
                            base * (1.0 + rng.random_range(-noise..=noise))
                        }
                    };
                    on_event(SensorEvent {
                        sensor: "framesqueued".to_string(),
                        t_ns: now_ns,
                        scope: pod.scope.clone(),
                        value: jitter(pod.framesqueued),
                    });
                    on_event(SensorEvent {
                        sensor: "frameprocessingrate".to_string(),
                        t_ns: now_ns,
                        scope: pod.scope.clone(),
                        value: jitter(pod.frameprocessingrate),
                    });
                }
                thread::sleep(period);
            }
        });
    }
}

fn monotonic_ns() -> i64 {
    use std::time::Instant;
    static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    let start = START.get_or_init(Instant::now);
    start.elapsed().as_nanos() as i64
}
