//! Reconciles the target deployment to an `ActuationIntent`, suppressing
//! redundant patches. Grounded on `adaptive_control.py::take_action`
//! (list pods, no-op on unchanged target, read-then-patch, update
//! `current_replica` only on success) and the teacher's
//! `component_a/transmitter.rs` non-blocking, counted-drop style for the
//! failure path (spec §4.6).

use std::collections::HashMap;

use log::{error, info, warn};

use std::collections::HashSet;

use crate::control::state::ActuationIntent;
use crate::error::OrchestratorError;

use super::orchestrator::OrchestratorClient;

/// Reconciles a deployment's replica count to the intent produced each tick,
/// tracking hysteresis per active model name (spec §4.6 edge case: a model
/// swap must not be interpreted against the outgoing model's replica count).
pub struct Actuator<C: OrchestratorClient> {
    client: C,
    namespace: String,
    deployment: String,
    current_replicas: HashMap<String, i32>,
    patch_failures: u64,
}

impl<C: OrchestratorClient> Actuator<C> {
    pub fn new(client: C, namespace: impl Into<String>, deployment: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            deployment: deployment.into(),
            current_replicas: HashMap::new(),
            patch_failures: 0,
        }
    }

    pub fn patch_failure_count(&self) -> u64 {
        self.patch_failures
    }

    /// Names of pods for `model` not in the `Running` phase, keyed the same
    /// way the telemetry `scope` identifies a pod — used to implement
    /// `exclude_terminating` (spec §9 Open Question) before aggregation.
    pub fn terminating_pod_names(&self, model: &str) -> Result<HashSet<String>, OrchestratorError> {
        let pods = self.client.list_pods(&self.namespace, model)?;
        Ok(pods
            .into_iter()
            .filter(|p| p.phase != "Running")
            .map(|p| p.name)
            .collect())
    }

    /// Returns the count of `Running` pods observed for `intent.model`
    /// (recorded for the tick's metrics regardless of whether a patch is
    /// issued).
    pub fn reconcile(&mut self, intent: &ActuationIntent) -> Result<i32, OrchestratorError> {
        let pods = self.client.list_pods(&self.namespace, &intent.model)?;
        let running_pods = pods.iter().filter(|p| p.phase == "Running").count() as i32;

        let current = *self.current_replicas.get(&intent.model).unwrap_or(&0);
        if intent.target_replicas == current {
            return Ok(running_pods);
        }

        // current_replicas for this model hasn't been observed yet; seed it
        // from the orchestrator before deciding whether this is really a
        // no-op (spec §4.6 step 1-2).
        if !self.current_replicas.contains_key(&intent.model) {
            match self.client.read_replicas(&self.namespace, &self.deployment) {
                Ok(observed) => {
                    self.current_replicas.insert(intent.model.clone(), observed);
                    if observed == intent.target_replicas {
                        return Ok(running_pods);
                    }
                }
                Err(err) => {
                    warn!("failed to read current replicas, will attempt patch anyway: {err}");
                }
            }
        }

        match self.client.patch_replicas(
            &self.namespace,
            &self.deployment,
            intent.target_replicas,
        ) {
            Ok(()) => {
                self.current_replicas
                    .insert(intent.model.clone(), intent.target_replicas);
                info!(
                    "reconciled {}/{} to {} replicas (model {})",
                    self.namespace, self.deployment, intent.target_replicas, intent.model
                );
                Ok(running_pods)
            }
            Err(err) => {
                self.patch_failures += 1;
                error!("patch failed, current_replicas left unchanged: {err}");
                Err(err)
            }
        }
    }
}
