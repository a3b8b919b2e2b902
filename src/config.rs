//! CLI surface and the immutable `ControlConfig` it builds (spec §3, §6).

use std::time::Duration;

use chrono::Utc;
use clap::Parser;

/// Closed-loop PD autoscaler for a streaming inference workload.
///
/// Ingests per-pod telemetry from a bus, estimates backlog pressure over a
/// sliding window, and reconciles the target deployment's replica count (and
/// optionally its model variant) on a fixed cadence.
#[derive(Debug, Parser)]
#[command(name = "backlog-autoscaler", version)]
pub struct Cli {
    /// Kubernetes namespace the target deployment lives in.
    #[arg(long, default_value = "workload")]
    pub namespace: String,

    /// Name of the deployment (and label value) being scaled.
    #[arg(long = "deployment-name", default_value = "consumer")]
    pub deployment_name: String,

    /// Directory scalar metrics are written under (one subdirectory per run).
    #[arg(long = "log-dir", default_value = "logs")]
    pub log_dir: String,

    /// Run name; defaults to `run_<UTC timestamp>`.
    #[arg(long)]
    pub name: Option<String>,

    /// Reference throughput added to backlog to form the PD error term.
    #[arg(long = "target-fps", default_value_t = 600.0)]
    pub target_fps: f64,

    /// Proportional gain.
    #[arg(long, default_value_t = 0.5)]
    pub kp: f64,

    /// Derivative gain.
    #[arg(long, default_value_t = 1.0)]
    pub kd: f64,

    /// Nominal per-replica processing budget, same units as the error signal.
    #[arg(long = "container-capacity", default_value_t = 64.0)]
    pub container_capacity: f64,

    /// Wall-clock interval between control-law evaluations.
    #[arg(long = "control-period", value_parser = parse_duration, default_value = "2s")]
    pub control_period: Duration,

    /// Sliding window for sensor aggregation.
    #[arg(long, value_parser = parse_duration, default_value = "2s")]
    pub window: Duration,

    /// Backlog threshold that enables the model-swap `ModelSelector`. `0`
    /// (or omitted) disables model swapping, per spec §4.5/§6.
    #[arg(long = "backlog-high-water", default_value_t = 0.0)]
    pub backlog_high_water: f64,

    /// Minimum interval between model swaps.
    #[arg(long = "model-swap-interval", value_parser = parse_duration, default_value = "120s")]
    pub model_swap_interval: Duration,

    /// Bounded ingress channel capacity (spec §4.1's `Q`).
    #[arg(long = "ingress-queue-capacity", default_value_t = 4096)]
    pub ingress_queue_capacity: usize,

    /// Whether pods the orchestrator reports as terminating are excluded
    /// from the backlog aggregate (spec §9 Open Question).
    #[arg(long = "exclude-terminating", default_value_t = false)]
    pub exclude_terminating: bool,

    /// Telemetry bus endpoint. Falls back to `NRM_URI` (spec §6).
    #[arg(long = "bus-uri", env = "NRM_URI")]
    pub bus_uri: Option<String>,
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let (num, unit) = s
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .map(|i| s.split_at(i))
        .ok_or_else(|| format!("missing time unit in {s:?}"))?;
    let n: f64 = num.parse().map_err(|_| format!("invalid number in {s:?}"))?;
    let secs = match unit {
        "ms" => n / 1000.0,
        "s" => n,
        "m" => n * 60.0,
        _ => return Err(format!("unknown duration unit {unit:?} in {s:?}")),
    };
    Ok(Duration::from_secs_f64(secs))
}

/// Immutable controller configuration (spec §3's `ControlConfig`), loaded
/// once at startup from `Cli`.
#[derive(Debug, Clone)]
pub struct ControlConfig {
    pub kp: f64,
    pub kd: f64,
    pub container_capacity: f64,
    pub target_fps: f64,
    pub backlog_high_water: f64,
    pub control_period: Duration,
    pub sliding_window: Duration,
    pub namespace: String,
    pub deployment: String,
    pub model_variants: [String; 2],
    pub model_swap_interval: Duration,
    pub ingress_queue_capacity: usize,
    pub exclude_terminating: bool,
    pub run_name: String,
    pub metrics_dir: String,
}

impl ControlConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self, crate::error::StartupError> {
        if cli.container_capacity <= 0.0 {
            return Err(crate::error::StartupError::BadConfig(
                "container-capacity must be > 0".into(),
            ));
        }
        if cli.control_period.is_zero() {
            return Err(crate::error::StartupError::BadConfig(
                "control-period must be > 0".into(),
            ));
        }

        let run_name = cli
            .name
            .clone()
            .unwrap_or_else(|| format!("run_{}", Utc::now().format("%Y%m%d-%H%M%S")));

        Ok(Self {
            kp: cli.kp,
            kd: cli.kd,
            container_capacity: cli.container_capacity,
            target_fps: cli.target_fps,
            backlog_high_water: cli.backlog_high_water,
            control_period: cli.control_period,
            sliding_window: cli.window,
            namespace: cli.namespace.clone(),
            deployment: cli.deployment_name.clone(),
            model_variants: [
                format!("{}-fp16", cli.deployment_name),
                format!("{}-fp32", cli.deployment_name),
            ],
            model_swap_interval: cli.model_swap_interval,
            ingress_queue_capacity: cli.ingress_queue_capacity,
            exclude_terminating: cli.exclude_terminating,
            run_name,
            metrics_dir: cli.log_dir.clone(),
        })
    }

    /// Whether model-swap behavior (`ModelSelector`) is enabled at all.
    pub fn model_swap_enabled(&self) -> bool {
        self.backlog_high_water > 0.0
    }

    /// The full-precision model variant, which the controller always starts
    /// on (spec §4.5).
    pub fn initial_model(&self) -> &str {
        &self.model_variants[1]
    }

    pub fn reduced_model(&self) -> &str {
        &self.model_variants[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_duration_suffixes() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
    }

    #[test]
    fn rejects_zero_capacity() {
        let cli = Cli::parse_from([
            "backlog-autoscaler",
            "--container-capacity",
            "0",
        ]);
        assert!(ControlConfig::from_cli(&cli).is_err());
    }

    #[test]
    fn default_run_name_has_prefix() {
        let cli = Cli::parse_from(["backlog-autoscaler"]);
        let cfg = ControlConfig::from_cli(&cli).unwrap();
        assert!(cfg.run_name.starts_with("run_"));
    }
}
