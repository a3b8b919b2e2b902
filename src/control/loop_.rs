//! Fixed-cadence control loop (spec §4.7). Grounded on the teacher's
//! `main.rs::run_simulation_internal` for the thread/shutdown-flag shape and
//! `component_b/receiver.rs` for the drain-then-dispatch pattern it applies
//! each tick.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{info, warn};
use spin_sleep::SpinSleeper;

use crate::actuation::actuator::Actuator;
use crate::actuation::orchestrator::OrchestratorClient;
use crate::config::ControlConfig;
use crate::control::model_selector::{ModelSelector, SwapDecision};
use crate::control::pd::PdController;
use crate::control::state::{ActuationIntent, ControllerState};
use crate::metrics::sink::{MetricsSink, ScalarSample};
use crate::store::aggregator::Aggregator;
use crate::store::sliding::SlidingSensorStore;

/// Runs the control law on a fixed cadence against a shared
/// [`SlidingSensorStore`], reconciling the deployment through an
/// [`Actuator`] and teeing scalars into a [`MetricsSink`] each iteration.
pub struct ControlLoop<C: OrchestratorClient> {
    store: Arc<SlidingSensorStore>,
    pd: PdController,
    selector: ModelSelector,
    actuator: Actuator<C>,
    sink: Arc<dyn MetricsSink>,
    state: ControllerState,
    target_fps: f64,
    control_period: Duration,
    exclude_terminating: bool,
    iteration: u64,
}

impl<C: OrchestratorClient> ControlLoop<C> {
    pub fn new(
        config: &ControlConfig,
        store: Arc<SlidingSensorStore>,
        actuator: Actuator<C>,
        sink: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            store,
            pd: PdController::new(config.kp, config.kd, config.container_capacity),
            selector: ModelSelector::new(
                config.model_variants.clone(),
                config.backlog_high_water,
                config.model_swap_interval,
            ),
            actuator,
            sink,
            state: ControllerState::new(),
            target_fps: config.target_fps,
            control_period: config.control_period,
            exclude_terminating: config.exclude_terminating,
            iteration: 0,
        }
    }

    /// Runs until `shutdown` is observed, sleeping between ticks with
    /// sub-millisecond accuracy (spec §4.7, teacher's sensor-release pacing).
    pub fn run(&mut self, shutdown: Arc<AtomicBool>) {
        let sleeper = SpinSleeper::default();
        while !shutdown.load(Ordering::Acquire) {
            self.tick();
            sleeper.sleep(self.control_period);
        }
        self.sink.close();
    }

    /// Evaluates one control iteration: aggregate, possibly swap model,
    /// apply the PD law, reconcile the actuator, emit scalars (spec §4.7
    /// steps 1-9).
    pub fn tick(&mut self) {
        self.store.gc(self.store.now());
        let now = self.store.now();

        // exclude_terminating (spec §9 Open Question): default is to include
        // every sample in the window; when enabled, pods the orchestrator no
        // longer reports as Running are dropped from the aggregate before
        // the PD law sees it.
        let excluded = if self.exclude_terminating {
            self.actuator
                .terminating_pod_names(self.selector.active_model())
                .unwrap_or_default()
        } else {
            Default::default()
        };

        let (q, r) = {
            let agg = Aggregator::new(&self.store);
            (
                agg.total_queued_excluding(now, &excluded),
                agg.total_processing_rate_excluding(now, &excluded),
            )
        };

        if r == 0.0 {
            warn!("no processing rate reported, skipping control tick");
            self.emit(&[("q", q), ("r", r)]);
            self.iteration += 1;
            return;
        }

        if let SwapDecision::Swap { draining, next } = self.selector.evaluate(now, q) {
            info!("model swap triggered: draining {draining}, next {next}");
            let drain_intent = ActuationIntent {
                target_replicas: 0,
                model: draining,
            };
            if let Err(e) = self.actuator.reconcile(&drain_intent) {
                warn!("failed to drain outgoing model during swap: {e}");
            }
            self.emit(&[("q", q), ("r", r)]);
            self.iteration += 1;
            return;
        }

        let error = self.target_fps + q;
        let output = self.pd.step(error, self.state.previous_error);
        let diff_error = output.error - self.state.previous_error;
        self.state.previous_error = output.error;

        let intent = ActuationIntent {
            target_replicas: output.target_replicas,
            model: self.selector.active_model().to_string(),
        };

        let running_pods = match self.actuator.reconcile(&intent) {
            Ok(count) => count,
            Err(e) => {
                warn!("actuator reconcile failed this tick: {e}");
                0
            }
        };

        self.emit(&[
            ("error", output.error),
            ("diff_error", diff_error),
            ("control_signal", output.control_signal),
            ("target", output.target_replicas as f64),
            ("running_pods", running_pods as f64),
            ("q", q),
            ("r", r),
        ]);
        self.iteration += 1;
    }

    fn emit(&self, samples: &[(&'static str, f64)]) {
        for (name, value) in samples {
            self.sink.record(ScalarSample {
                iteration: self.iteration,
                name,
                value: *value,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuation::orchestrator::MockOrchestratorClient;
    use crate::metrics::sink::InMemoryMetricsSink;
    use crate::telemetry::event::{SensorKey, SensorSample};

    fn config() -> ControlConfig {
        let cli = crate::config::Cli {
            namespace: "workload".into(),
            deployment_name: "consumer".into(),
            log_dir: "logs".into(),
            name: Some("test".into()),
            target_fps: 600.0,
            kp: 1.0,
            kd: 3.0,
            container_capacity: 200.0,
            control_period: Duration::from_secs(2),
            window: Duration::from_secs(2),
            backlog_high_water: 0.0,
            model_swap_interval: Duration::from_secs(120),
            ingress_queue_capacity: 4096,
            exclude_terminating: false,
            bus_uri: None,
        };
        ControlConfig::from_cli(&cli).unwrap()
    }

    fn make_loop(
        config: &ControlConfig,
    ) -> (
        ControlLoop<MockOrchestratorClient>,
        Arc<SlidingSensorStore>,
        Arc<InMemoryMetricsSink>,
    ) {
        let store = Arc::new(SlidingSensorStore::new(config.sliding_window));
        let sink = Arc::new(InMemoryMetricsSink::new());
        let mock = MockOrchestratorClient::new();
        mock.set_replicas("consumer", 0);
        let actuator = Actuator::new(mock, config.namespace.clone(), config.deployment.clone());
        let control_loop = ControlLoop::new(config, store.clone(), actuator, sink.clone());
        (control_loop, store, sink)
    }

    #[test]
    fn cold_start_skips_control_with_no_events() {
        let config = config();
        let (mut control_loop, _store, sink) = make_loop(&config);

        control_loop.tick();

        assert_eq!(control_loop.state.previous_error, 0.0);
        let samples = sink.samples();
        assert!(!samples.iter().any(|s| s.name == "target"));
    }

    #[test]
    fn steady_backlog_two_ticks_match_scenario() {
        let config = config();
        let (mut control_loop, store, _sink) = make_loop(&config);

        store.put(
            SensorKey::new("framesqueued", "pod-a"),
            SensorSample {
                t: store.now(),
                value: 800.0,
            },
        );
        store.put(
            SensorKey::new("frameprocessingrate", "pod-a"),
            SensorSample {
                t: store.now(),
                value: 100.0,
            },
        );

        control_loop.tick();
        assert_eq!(control_loop.state.previous_error, 1400.0);

        store.put(
            SensorKey::new("framesqueued", "pod-a"),
            SensorSample {
                t: store.now(),
                value: 800.0,
            },
        );
        store.put(
            SensorKey::new("frameprocessingrate", "pod-a"),
            SensorSample {
                t: store.now(),
                value: 100.0,
            },
        );

        control_loop.tick();
        assert_eq!(control_loop.state.previous_error, 1400.0);
    }

    #[test]
    fn no_op_hysteresis_issues_single_patch() {
        // kd=0 so the PD law reduces to `target = max(1, floor(kp*error /
        // capacity))`: with unchanging inputs, `error` is identical every
        // tick and so is `target`, making a second tick a genuine no-op
        // regardless of how `previous_error` evolves.
        let cli = crate::config::Cli {
            namespace: "workload".into(),
            deployment_name: "consumer".into(),
            log_dir: "logs".into(),
            name: Some("test".into()),
            target_fps: 600.0,
            kp: 1.0,
            kd: 0.0,
            container_capacity: 200.0,
            control_period: Duration::from_secs(2),
            window: Duration::from_secs(2),
            backlog_high_water: 0.0,
            model_swap_interval: Duration::from_secs(120),
            ingress_queue_capacity: 4096,
            exclude_terminating: false,
            bus_uri: None,
        };
        let config = ControlConfig::from_cli(&cli).unwrap();
        let store = Arc::new(SlidingSensorStore::new(config.sliding_window));
        let sink = Arc::new(InMemoryMetricsSink::new());
        let mock = Arc::new(MockOrchestratorClient::new());
        mock.set_replicas("consumer", 0);
        let actuator = Actuator::new(mock.clone(), config.namespace.clone(), config.deployment.clone());
        let mut control_loop = ControlLoop::new(&config, store.clone(), actuator, sink);

        store.put(
            SensorKey::new("framesqueued", "pod-a"),
            SensorSample {
                t: store.now(),
                value: 0.0,
            },
        );
        store.put(
            SensorKey::new("frameprocessingrate", "pod-a"),
            SensorSample {
                t: store.now(),
                value: 100.0,
            },
        );

        control_loop.tick();
        let calls_after_first = mock.patch_call_count();
        assert_eq!(calls_after_first, 1);

        control_loop.tick();
        assert_eq!(mock.patch_call_count(), 1);
    }

    #[test]
    fn exclude_terminating_drops_terminating_pods_from_backlog() {
        let cli = crate::config::Cli {
            namespace: "workload".into(),
            deployment_name: "consumer".into(),
            log_dir: "logs".into(),
            name: Some("test".into()),
            target_fps: 600.0,
            kp: 1.0,
            kd: 0.0,
            container_capacity: 200.0,
            control_period: Duration::from_secs(2),
            window: Duration::from_secs(2),
            backlog_high_water: 0.0,
            model_swap_interval: Duration::from_secs(120),
            ingress_queue_capacity: 4096,
            exclude_terminating: true,
            bus_uri: None,
        };
        let config = ControlConfig::from_cli(&cli).unwrap();
        let store = Arc::new(SlidingSensorStore::new(config.sliding_window));
        let sink = Arc::new(InMemoryMetricsSink::new());
        let mock = MockOrchestratorClient::new();
        mock.set_replicas("consumer", 0);
        mock.set_pods(
            config.initial_model(),
            vec![("pod-a", "Running"), ("pod-b", "Terminating")],
        );
        let actuator = Actuator::new(mock, config.namespace.clone(), config.deployment.clone());
        let mut control_loop = ControlLoop::new(&config, store.clone(), actuator, sink);

        store.put(
            SensorKey::new("framesqueued", "pod-a"),
            SensorSample { t: store.now(), value: 100.0 },
        );
        store.put(
            SensorKey::new("framesqueued", "pod-b"),
            SensorSample { t: store.now(), value: 900.0 },
        );
        store.put(
            SensorKey::new("frameprocessingrate", "pod-a"),
            SensorSample { t: store.now(), value: 50.0 },
        );

        control_loop.tick();
        // Only pod-a's 100 counts toward backlog; pod-b (Terminating) is excluded.
        assert_eq!(control_loop.state.previous_error, 700.0);
    }
}
