//! Orchestrator REST client boundary. Grounded on
//! `adaptive_control.py::take_action`: list pods by label, read a deployment,
//! patch its replica count (spec §6). `KubeOrchestratorClient` is the real
//! implementation; `MockOrchestratorClient` backs the actuator's tests.

use std::collections::HashMap;
use std::sync::Mutex;

use k8s_openapi::api::apps::v1::Deployment;
use kube::api::{Api, Patch, PatchParams};
use kube::{Client, ResourceExt};

use crate::error::OrchestratorError;

/// Phase string as reported by the orchestrator's pod list (e.g. `"Running"`,
/// `"Terminating"`, `"Pending"`).
pub type PodPhase = String;

/// One pod as reported by the orchestrator's list, identified by the same
/// name the per-pod metrics exporter uses as a telemetry `scope` (spec §6,
/// §9 Open Question on `exclude_terminating`).
#[derive(Debug, Clone, PartialEq)]
pub struct PodInfo {
    pub name: String,
    pub phase: PodPhase,
}

/// Operations the Actuator needs from the orchestrator (spec §6): list pods
/// by model label, read a deployment's replica count, patch it.
pub trait OrchestratorClient: Send + Sync {
    fn list_pods(
        &self,
        namespace: &str,
        model_label: &str,
    ) -> Result<Vec<PodInfo>, OrchestratorError>;

    fn read_replicas(&self, namespace: &str, name: &str) -> Result<i32, OrchestratorError>;

    fn patch_replicas(
        &self,
        namespace: &str,
        name: &str,
        target: i32,
    ) -> Result<(), OrchestratorError>;
}

impl<T: OrchestratorClient + ?Sized> OrchestratorClient for std::sync::Arc<T> {
    fn list_pods(
        &self,
        namespace: &str,
        model_label: &str,
    ) -> Result<Vec<PodInfo>, OrchestratorError> {
        (**self).list_pods(namespace, model_label)
    }

    fn read_replicas(&self, namespace: &str, name: &str) -> Result<i32, OrchestratorError> {
        (**self).read_replicas(namespace, name)
    }

    fn patch_replicas(
        &self,
        namespace: &str,
        name: &str,
        target: i32,
    ) -> Result<(), OrchestratorError> {
        (**self).patch_replicas(namespace, name, target)
    }
}

/// Real client backed by `kube` + `k8s-openapi`, driven synchronously from
/// the control loop's owned tokio runtime (spec §5).
pub struct KubeOrchestratorClient {
    client: Client,
    runtime: tokio::runtime::Handle,
    call_timeout: std::time::Duration,
}

impl KubeOrchestratorClient {
    /// `call_timeout` bounds every individual orchestrator call (spec §5:
    /// "a per-call timeout of `control_period/2` is REQUIRED so that a slow
    /// orchestrator cannot stall the tick cadence").
    pub fn new(client: Client, runtime: tokio::runtime::Handle, call_timeout: std::time::Duration) -> Self {
        Self {
            client,
            runtime,
            call_timeout,
        }
    }
}

impl OrchestratorClient for KubeOrchestratorClient {
    fn list_pods(
        &self,
        namespace: &str,
        model_label: &str,
    ) -> Result<Vec<PodInfo>, OrchestratorError> {
        let client = self.client.clone();
        let namespace = namespace.to_string();
        let model_label = model_label.to_string();
        let call_timeout = self.call_timeout;
        self.runtime.block_on(async move {
            let fut = async {
                let pods: Api<k8s_openapi::api::core::v1::Pod> = Api::namespaced(client, &namespace);
                let lp = kube::api::ListParams::default().labels(&format!("app={model_label}"));
                let list = pods
                    .list(&lp)
                    .await
                    .map_err(|source| OrchestratorError::ListPods {
                        model: model_label.clone(),
                        source,
                    })?;
                Ok(list
                    .items
                    .into_iter()
                    .filter_map(|p| {
                        let name = p.metadata.name?;
                        let phase = p.status.and_then(|s| s.phase)?;
                        Some(PodInfo { name, phase })
                    })
                    .collect())
            };
            tokio::time::timeout(call_timeout, fut)
                .await
                .unwrap_or(Err(OrchestratorError::Timeout(call_timeout)))
        })
    }

    fn read_replicas(&self, namespace: &str, name: &str) -> Result<i32, OrchestratorError> {
        let client = self.client.clone();
        let namespace = namespace.to_string();
        let name = name.to_string();
        let call_timeout = self.call_timeout;
        self.runtime.block_on(async move {
            let fut = async {
                let api: Api<Deployment> = Api::namespaced(client, &namespace);
                let dep = api
                    .get(&name)
                    .await
                    .map_err(|source| OrchestratorError::ReadDeployment {
                        namespace: namespace.clone(),
                        name: name.clone(),
                        source,
                    })?;
                Ok(dep.spec.and_then(|s| s.replicas).unwrap_or(0))
            };
            tokio::time::timeout(call_timeout, fut)
                .await
                .unwrap_or(Err(OrchestratorError::Timeout(call_timeout)))
        })
    }

    fn patch_replicas(
        &self,
        namespace: &str,
        name: &str,
        target: i32,
    ) -> Result<(), OrchestratorError> {
        let client = self.client.clone();
        let namespace = namespace.to_string();
        let name = name.to_string();
        let call_timeout = self.call_timeout;
        self.runtime.block_on(async move {
            let fut = async {
                let api: Api<Deployment> = Api::namespaced(client, &namespace);
                let patch = serde_json::json!({
                    "spec": { "replicas": target }
                });
                api.patch(
                    &name,
                    &PatchParams::apply("backlog-autoscaler"),
                    &Patch::Merge(&patch),
                )
                .await
                .map(|dep| {
                    let _ = dep.name_any();
                })
                .map_err(|source| OrchestratorError::PatchDeployment {
                    namespace: namespace.clone(),
                    name: name.clone(),
                    target,
                    source,
                })
            };
            tokio::time::timeout(call_timeout, fut)
                .await
                .unwrap_or(Err(OrchestratorError::Timeout(call_timeout)))
        })
    }
}

/// In-memory orchestrator for tests: fixed pod phases per model, a tracked
/// replica count per deployment, and an optional forced failure.
#[derive(Default)]
pub struct MockOrchestratorClient {
    pods_by_model: Mutex<HashMap<String, Vec<PodInfo>>>,
    replicas: Mutex<HashMap<String, i32>>,
    pub patch_calls: Mutex<Vec<(String, i32)>>,
    fail_patches: Mutex<bool>,
}

impl MockOrchestratorClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// `pods` is `(name, phase)` pairs, `name` matching the telemetry
    /// `scope` the same pod reports on the bus.
    pub fn set_pods(&self, model: impl Into<String>, pods: Vec<(&str, &str)>) {
        let pods = pods
            .into_iter()
            .map(|(name, phase)| PodInfo {
                name: name.to_string(),
                phase: phase.to_string(),
            })
            .collect();
        self.pods_by_model.lock().unwrap().insert(model.into(), pods);
    }

    pub fn set_replicas(&self, deployment: impl Into<String>, count: i32) {
        self.replicas.lock().unwrap().insert(deployment.into(), count);
    }

    pub fn fail_next_patches(&self, fail: bool) {
        *self.fail_patches.lock().unwrap() = fail;
    }

    pub fn patch_call_count(&self) -> usize {
        self.patch_calls.lock().unwrap().len()
    }
}

impl OrchestratorClient for MockOrchestratorClient {
    fn list_pods(
        &self,
        _namespace: &str,
        model_label: &str,
    ) -> Result<Vec<PodInfo>, OrchestratorError> {
        Ok(self
            .pods_by_model
            .lock()
            .unwrap()
            .get(model_label)
            .cloned()
            .unwrap_or_default())
    }

    fn read_replicas(&self, _namespace: &str, name: &str) -> Result<i32, OrchestratorError> {
        Ok(*self.replicas.lock().unwrap().get(name).unwrap_or(&0))
    }

    fn patch_replicas(
        &self,
        namespace: &str,
        name: &str,
        target: i32,
    ) -> Result<(), OrchestratorError> {
        if *self.fail_patches.lock().unwrap() {
            return Err(OrchestratorError::Timeout(std::time::Duration::from_secs(1)));
        }
        self.patch_calls
            .lock()
            .unwrap()
            .push((name.to_string(), target));
        self.replicas.lock().unwrap().insert(name.to_string(), target);
        let _ = namespace;
        Ok(())
    }
}
