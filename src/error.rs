//! Typed error kinds for the seven failure modes spec.md §7 enumerates.
//! Ingress and control-loop errors never propagate out of their loop — they
//! are recovered locally and only surface as counters/log lines (spec §7).
//! `StartupError` is the one kind that does propagate, as the binary's
//! non-zero exit code (spec §6).

use thiserror::Error;

/// Kind 1 of spec §7: decode failures. Kind 2 (ingress-channel overflow) has
/// no typed variant of its own — `TelemetryIngress` counts it directly (spec
/// §4.1's `dropped` counter) since there is nothing to attach to it beyond
/// the fact that it happened.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum IngressError {
    #[error("malformed sensor event from scope {scope:?}: {reason}")]
    Decode { scope: String, reason: String },
}

/// Kinds 3–4 of spec §7: orchestrator read/patch failures.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("failed to list pods for model {model}: {source}")]
    ListPods {
        model: String,
        #[source]
        source: kube::Error,
    },

    #[error("failed to read deployment {namespace}/{name}: {source}")]
    ReadDeployment {
        namespace: String,
        name: String,
        #[source]
        source: kube::Error,
    },

    #[error("failed to patch deployment {namespace}/{name} to {target} replicas: {source}")]
    PatchDeployment {
        namespace: String,
        name: String,
        target: i32,
        #[source]
        source: kube::Error,
    },

    #[error("orchestrator call exceeded {0:?} timeout")]
    Timeout(std::time::Duration),
}

/// Kind 7 of spec §7: fatal startup failures. Returned from `main`, mapped
/// to the non-zero exit codes spec §6 specifies. (The bus-unreachable-at-
/// startup case spec §6 names has no variant here: this binary's bus is the
/// in-process `SimulatedBus`, which cannot fail to connect — a real bus
/// client would plug in its own connection error here.)
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    BadConfig(String),

    #[error("orchestrator credentials unavailable: {0}")]
    MissingCredentials(#[source] kube::Error),

    #[error("failed to initialize metrics sink at {path}: {source}")]
    MetricsSinkInit {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}
