//! Drag-free projectile under uniform gravity.
//!
//! State is `[x, y, vx, vy]`. A zero initial velocity component is taken to
//! mean "derive it from the launch parameters": `vx = v0*cos(angle)` and
//! `vy = v0*sin(angle)` with the angle in degrees.

use super::{ParameterSpec, ParameterValues, SimulationModel};
use crate::error::{EngineError, EngineResult};
use crate::integrate::{integrate, IntegrationStats, IntegratorSettings, Method};
use crate::metrics::{argmax, max, Metrics};
use crate::time_span::TimeGrid;
use crate::traits::DynamicalSystem;
use crate::trajectory::Trajectory;

const STATES: &[&str] = &["x", "y", "vx", "vy"];
const X: usize = 0;
const Y: usize = 1;
const VX: usize = 2;
const VY: usize = 3;

static PARAMETERS: [ParameterSpec; 3] = [
    ParameterSpec::new("g", 9.81),
    ParameterSpec::new("v0", 20.0),
    ParameterSpec::new("angle", 45.0),
];

struct Ballistic {
    g: f64,
}

impl DynamicalSystem<f64> for Ballistic {
    fn dimension(&self) -> usize {
        4
    }

    fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
        out[X] = x[VX];
        out[Y] = x[VY];
        out[VX] = 0.0;
        out[VY] = -self.g;
    }
}

/// Initial state with zero velocity components filled from `v0` and `angle`.
fn launch_state(params: &ParameterValues, state0: &[f64]) -> Vec<f64> {
    let v0 = params.value("v0");
    let angle = params.value("angle").to_radians();
    let mut state = state0.to_vec();
    if state[VX] == 0.0 {
        state[VX] = v0 * angle.cos();
    }
    if state[VY] == 0.0 {
        state[VY] = v0 * angle.sin();
    }
    state
}

/// Index of the last downward crossing of `height`, or the final index when
/// the series never crosses.
fn landing_index(y: &[f64], height: f64) -> usize {
    let mut landing = y.len().saturating_sub(1);
    for i in 1..y.len() {
        if y[i] < height && y[i - 1] >= height {
            landing = i;
        }
    }
    landing
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Projectile;

impl SimulationModel for Projectile {
    fn state_names(&self) -> &'static [&'static str] {
        STATES
    }

    fn parameters(&self) -> &'static [ParameterSpec] {
        &PARAMETERS
    }

    fn validate(&self, params: &ParameterValues, _state0: &[f64]) -> EngineResult<()> {
        let v0 = params.value("v0");
        if v0 < 0.0 {
            return Err(EngineError::InvalidParameter(format!(
                "launch speed 'v0' must be non-negative (got {v0})"
            )));
        }
        Ok(())
    }

    fn integrate(
        &self,
        params: &ParameterValues,
        state0: &[f64],
        grid: &TimeGrid,
        method: Method,
        settings: &IntegratorSettings,
    ) -> EngineResult<(Trajectory, IntegrationStats)> {
        let system = Ballistic {
            g: params.value("g"),
        };
        let launch = launch_state(params, state0);
        integrate(&system, STATES, &launch, grid, method, settings)
            .map_err(|d| d.with_parameters(params))
    }

    fn extract_metrics(&self, params: &ParameterValues, trajectory: &Trajectory) -> Metrics {
        let times = trajectory.times();
        let x = trajectory.series(X);
        let y = trajectory.series(Y);
        let speed: Vec<f64> = (0..trajectory.len())
            .map(|i| trajectory.value(VX, i).hypot(trajectory.value(VY, i)))
            .collect();

        let apex = argmax(&y).unwrap_or(0);
        let max_height = y[apex];
        let t_max_height = times[apex];
        let landing = landing_index(&y, y[0]);
        let range = x[landing];
        let t_landing = times[landing];

        Metrics::new()
            .with("max_height", max_height)
            .with("t_max_height", t_max_height)
            .with("range", range)
            .with("t_landing", t_landing)
            .with("v_initial", params.value("v0"))
            .with("v_final", speed[landing])
            .with("v_max", max(&speed))
            .with("angle_deg", params.value("angle"))
            .summarized(format!(
                "Projectile reaches max height {max_height:.2}m at t ≈ {t_max_height:.2}s, \
                 lands at x={range:.2}m (t ≈ {t_landing:.2}s)"
            ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::{grid, map};
    use std::collections::BTreeMap;

    fn defaults() -> ParameterValues {
        ParameterValues::resolve(&PARAMETERS, &BTreeMap::new()).unwrap()
    }

    #[test]
    fn zero_velocities_come_from_launch_angle() {
        let state = launch_state(&defaults(), &[0.0, 0.0, 0.0, 0.0]);
        let component = 20.0 * std::f64::consts::FRAC_1_SQRT_2;
        assert!((state[VX] - component).abs() < 1e-12);
        assert!((state[VY] - component).abs() < 1e-12);

        let explicit = launch_state(&defaults(), &[0.0, 0.0, 3.0, 0.0]);
        assert_eq!(explicit[VX], 3.0);
    }

    #[test]
    fn range_matches_closed_form() {
        let run = Projectile
            .simulate(
                &defaults(),
                &[0.0, 0.0, 0.0, 0.0],
                &grid(0.0, 3.0, 301),
                Method::Rk45,
                &IntegratorSettings::default(),
            )
            .expect("run");
        // v0^2 * sin(2θ) / g
        let expected = 400.0 / 9.81;
        let range = run.metrics.get("range").unwrap();
        assert!((range - expected).abs() < 0.2, "range = {range}");
        let height = run.metrics.get("max_height").unwrap();
        assert!((height - 200.0 / (2.0 * 9.81)).abs() < 0.01, "max_height = {height}");
        assert_eq!(run.metrics.get("angle_deg"), Some(45.0));
        assert!(run.metrics.summary().starts_with("Projectile reaches max height 10.19m"));
    }

    #[test]
    fn landing_uses_last_downward_crossing() {
        assert_eq!(landing_index(&[0.0, 1.0, -0.5, 0.5, -1.0, -2.0], 0.0), 4);
        assert_eq!(landing_index(&[0.0, 1.0, 2.0], 0.0), 2);
    }

    #[test]
    fn rejects_negative_launch_speed() {
        let params = ParameterValues::resolve(&PARAMETERS, &map(&[("v0", -1.0)])).unwrap();
        let err = Projectile.validate(&params, &[0.0; 4]).unwrap_err();
        assert_eq!(err.kind(), "InvalidParameterError");
    }
}
