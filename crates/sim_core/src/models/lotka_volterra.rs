//! Lotka-Volterra predator-prey model.
//!
//! dx/dt = alpha*x - beta*x*y
//! dy/dt = delta*x*y - gamma*y

use super::{non_negative_parameter, non_negative_state, ParameterSpec, ParameterValues, SimulationModel};
use crate::error::EngineResult;
use crate::integrate::{integrate, IntegrationStats, IntegratorSettings, Method};
use crate::metrics::{max, mean, min, Metrics};
use crate::time_span::TimeGrid;
use crate::traits::DynamicalSystem;
use crate::trajectory::Trajectory;

const STATES: &[&str] = &["x", "y"];

static PARAMETERS: [ParameterSpec; 4] = [
    ParameterSpec::new("alpha", 1.0),
    ParameterSpec::new("beta", 0.1),
    ParameterSpec::new("delta", 0.075),
    ParameterSpec::new("gamma", 1.5),
];

struct PredatorPrey {
    alpha: f64,
    beta: f64,
    delta: f64,
    gamma: f64,
}

impl DynamicalSystem<f64> for PredatorPrey {
    fn dimension(&self) -> usize {
        2
    }

    fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
        let (prey, predator) = (x[0], x[1]);
        out[0] = self.alpha * prey - self.beta * prey * predator;
        out[1] = self.delta * prey * predator - self.gamma * predator;
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LotkaVolterra;

impl SimulationModel for LotkaVolterra {
    fn state_names(&self) -> &'static [&'static str] {
        STATES
    }

    fn parameters(&self) -> &'static [ParameterSpec] {
        &PARAMETERS
    }

    fn validate(&self, params: &ParameterValues, state0: &[f64]) -> EngineResult<()> {
        for (name, value) in params.iter() {
            non_negative_parameter(name, value)?;
        }
        for (name, &value) in STATES.iter().zip(state0) {
            non_negative_state(name, value)?;
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
        let system = PredatorPrey {
            alpha: params.value("alpha"),
            beta: params.value("beta"),
            delta: params.value("delta"),
            gamma: params.value("gamma"),
        };
        integrate(&system, STATES, state0, grid, method, settings)
            .map_err(|d| d.with_parameters(params))
    }

    fn extract_metrics(&self, _params: &ParameterValues, trajectory: &Trajectory) -> Metrics {
        let prey = trajectory.series(0);
        let predator = trajectory.series(1);
        let (x_min, x_max, x_mean) = (min(&prey), max(&prey), mean(&prey));
        let (y_min, y_max, y_mean) = (min(&predator), max(&predator), mean(&predator));
        Metrics::new()
            .with("x_max", x_max)
            .with("x_min", x_min)
            .with("x_mean", x_mean)
            .with("y_max", y_max)
            .with("y_min", y_min)
            .with("y_mean", y_mean)
            .summarized(format!(
                "Prey: {x_min:.2}-{x_max:.2} (avg {x_mean:.2}), Predator: {y_min:.2}-{y_max:.2} (avg {y_mean:.2})"
            ))
    }
}
