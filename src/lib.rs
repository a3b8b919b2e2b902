//! Closed-loop PD autoscaler for a streaming inference workload (spec §1-2).
//!
//! Data flow: a telemetry bus feeds [`telemetry::ingress::TelemetryIngress`],
//! which writes into the shared [`store::sliding::SlidingSensorStore`]. On a
//! fixed cadence, [`control::loop_::ControlLoop`] aggregates the window via
//! [`store::aggregator::Aggregator`], evaluates
//! [`control::model_selector::ModelSelector`] and
//! [`control::pd::PDController`], and reconciles the target deployment
//! through [`actuation::actuator::Actuator`]. Scalar metrics are teed to
//! [`metrics::sink::MetricsSink`] at each step.

pub mod actuation;
pub mod config;
pub mod control;
pub mod error;
pub mod metrics;
pub mod store;
pub mod telemetry;
