//! Proportional-derivative control law. Hand-rolled rather than built on a
//! general PID library (see `DESIGN.md`): the contract requires an exact,
//! bit-identical two-term formula with no integral term and a specific
//! floor-then-clamp output stage, matching `adaptive_control.py::pid_control`
//! and `python_codes/PID.py` exactly (spec §4.4).

/// Output of one PD evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdOutput {
    pub target_replicas: i32,
    pub error: f64,
    pub control_signal: f64,
}

/// Pure function over `(error, previous_error, kp, kd, capacity)`. Stateless:
/// callers own `previous_error` and decide when to persist the returned
/// value (spec §3: "`previous_error` is updated if and only if the PD law
/// was evaluated this tick").
#[derive(Debug, Clone, Copy)]
pub struct PdController {
    pub kp: f64,
    pub kd: f64,
    pub capacity: f64,
}

impl PdController {
    pub fn new(kp: f64, kd: f64, capacity: f64) -> Self {
        Self { kp, kd, capacity }
    }

    /// `diff = error - previous_error; u = kp*error + kd*diff;
    /// target = max(1, floor(u / capacity))`. The floor ties toward negative
    /// infinity (spec §4.4), so a small positive `u` below `capacity` floors
    /// to `0` before the `max(1, …)` clamp raises it to `1`.
    pub fn step(&self, error: f64, previous_error: f64) -> PdOutput {
        let diff = error - previous_error;
        let u = self.kp * error + self.kd * diff;
        let target = ((u / self.capacity).floor() as i32).max(1);
        PdOutput {
            target_replicas: target,
            error,
            control_signal: u,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steady_backlog_scenario_tick_one_and_two() {
        // spec.md §8 scenario 2: target_fps=600, kp=1, kd=3, capacity=200.
        let pd = PdController::new(1.0, 3.0, 200.0);

        let out1 = pd.step(1400.0, 0.0);
        assert_eq!(out1.control_signal, 5600.0);
        assert_eq!(out1.target_replicas, 28);

        let out2 = pd.step(1400.0, out1.error);
        assert_eq!(out2.control_signal, 1400.0);
        assert_eq!(out2.target_replicas, 7);
    }

    #[test]
    fn multi_pod_aggregation_scenario() {
        // spec.md §8 scenario 3: target_fps=600, kp=0.5, kd=1, capacity=64.
        let pd = PdController::new(0.5, 1.0, 64.0);
        let out = pd.step(1200.0, 0.0);
        assert_eq!(out.control_signal, 1800.0);
        assert_eq!(out.target_replicas, 28);
    }

    #[test]
    fn output_floors_toward_negative_infinity_then_clamps_to_one() {
        let pd = PdController::new(1.0, 0.0, 200.0);
        // error == capacity exactly: u/capacity == 1.0, floor -> 1, clamp -> 1.
        let at_capacity = pd.step(200.0, 200.0);
        assert_eq!(at_capacity.target_replicas, 1);

        // error below capacity with diff == 0: u/capacity < 1.0, floors to 0, clamped to 1.
        let below_capacity = pd.step(50.0, 50.0);
        assert_eq!(below_capacity.target_replicas, 1);
    }

    #[test]
    fn is_deterministic() {
        let pd = PdController::new(0.5, 1.0, 64.0);
        let a = pd.step(1200.0, 300.0);
        let b = pd.step(1200.0, 300.0);
        assert_eq!(a, b);
    }

    #[test]
    fn target_is_never_below_one_for_nonzero_error() {
        let pd = PdController::new(0.01, 0.01, 1_000_000.0);
        let out = pd.step(10.0, 0.0);
        assert_eq!(out.target_replicas, 1);
    }
}
