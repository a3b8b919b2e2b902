//! Controller-owned mutable state and the per-tick intent handed to the
//! actuator (spec §3).

/// Mutable state exclusively owned by the control loop thread, initialised
/// from `ControlConfig` at startup.
#[derive(Debug, Clone)]
pub struct ControllerState {
    pub previous_error: f64,
    pub last_control_ts_secs: f64,
}

impl ControllerState {
    pub fn new() -> Self {
        Self {
            previous_error: 0.0,
            last_control_ts_secs: 0.0,
        }
    }
}

impl Default for ControllerState {
    fn default() -> Self {
        Self::new()
    }
}

/// What the actuator should reconcile the deployment toward this tick.
#[derive(Debug, Clone, PartialEq)]
pub struct ActuationIntent {
    pub target_replicas: i32,
    pub model: String,
}
