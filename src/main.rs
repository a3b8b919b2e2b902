//! Binary entry point: CLI wiring for the closed-loop backlog autoscaler
//! (spec §6). Grounded on the teacher's `main.rs` thread-orchestration shape
//! (shared shutdown flag, explicit thread spawn/join per responsibility),
//! generalized from a fixed-duration local simulation to a long-running
//! service that exits on a shutdown signal (spec §5 cancellation).

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use clap::Parser;
use log::{error, info, warn};

use backlog_autoscaler::actuation::actuator::Actuator;
use backlog_autoscaler::actuation::orchestrator::KubeOrchestratorClient;
use backlog_autoscaler::config::{Cli, ControlConfig};
use backlog_autoscaler::control::loop_::ControlLoop;
use backlog_autoscaler::error::StartupError;
use backlog_autoscaler::metrics::sink::{append_ingress_counters, CsvMetricsSink};
use backlog_autoscaler::store::sliding::SlidingSensorStore;
use backlog_autoscaler::telemetry::bus::{SimulatedBus, SimulatedPod, TelemetryBus};
use backlog_autoscaler::telemetry::ingress::TelemetryIngress;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = ControlConfig::from_cli(&cli)?;

    info!(
        "starting backlog-autoscaler run={} namespace={} deployment={}",
        config.run_name, config.namespace, config.deployment
    );

    // The real bus client and orchestrator credential source are consumed
    // collaborators (spec §1); this binary builds a local runtime just to
    // construct them, then hands a blocking handle to the control loop.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| StartupError::BadConfig(format!("failed to start async runtime: {e}")))?;

    let kube_client = runtime
        .block_on(kube::Client::try_default())
        .map_err(StartupError::MissingCredentials)?;

    if let Some(uri) = &cli.bus_uri {
        info!("telemetry bus endpoint configured: {uri} (bus client is a consumed collaborator; using the in-process simulated adapter)");
    } else {
        warn!("no --bus-uri/NRM_URI set; using the in-process simulated telemetry adapter");
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            info!("shutdown signal received");
            shutdown.store(true, Ordering::Release);
        })
        .map_err(|e| StartupError::BadConfig(format!("failed to install signal handler: {e}")))?;
    }

    let store = Arc::new(SlidingSensorStore::new(config.sliding_window));

    let mut ingress = TelemetryIngress::new(config.ingress_queue_capacity);
    ingress.start(store.clone(), shutdown.clone());

    let bus = SimulatedBus::new(
        vec![
            SimulatedPod {
                scope: format!("{}-0", config.deployment),
                framesqueued: config.target_fps,
                frameprocessingrate: config.container_capacity,
            },
            SimulatedPod {
                scope: format!("{}-1", config.deployment),
                framesqueued: config.target_fps,
                frameprocessingrate: config.container_capacity,
            },
        ],
        config.control_period / 4,
    )
    .with_noise(0.05);

    // The bus callback thread only ever gets a producer handle, never the
    // ingress itself — it must never block, and never needs the worker's
    // lifecycle (spec §4.1, §5).
    let producer = ingress.producer();
    bus.subscribe(
        Arc::new(move |event| producer.enqueue(event)),
        shutdown.clone(),
    );

    let metrics_path: PathBuf = PathBuf::from(&config.metrics_dir)
        .join(&config.run_name)
        .join("control_metrics.csv");
    let sink = Arc::new(
        CsvMetricsSink::open(&metrics_path)
            .map_err(|source| StartupError::MetricsSinkInit {
                path: metrics_path.clone(),
                source,
            })?,
    );

    let orchestrator = KubeOrchestratorClient::new(
        kube_client,
        runtime.handle().clone(),
        config.control_period / 2,
    );
    let actuator = Actuator::new(orchestrator, config.namespace.clone(), config.deployment.clone());
    let mut control_loop = ControlLoop::new(&config, store, actuator, sink);

    let loop_shutdown = shutdown.clone();
    let loop_handle = thread::spawn(move || {
        control_loop.run(loop_shutdown);
    });

    loop_handle
        .join()
        .map_err(|_| anyhow::anyhow!("control loop thread panicked"))?;

    // Ingress worker drains whatever's pending up to its own 100ms deadline
    // (spec §5 cancellation) before exiting.
    ingress.join();

    let ingress_counters_path = PathBuf::from(&config.metrics_dir)
        .join(&config.run_name)
        .join("ingress_counters.csv");
    let dropped = ingress.dropped_count();
    let decode_errors = ingress.decode_error_count();
    if let Err(e) = append_ingress_counters(&ingress_counters_path, dropped, decode_errors) {
        error!("failed to write ingress counters: {e}");
    }
    info!(
        "shutdown complete: {} events dropped, {} decode errors",
        dropped, decode_errors
    );

    Ok(())
}
