//! Logistic population growth: dP/dt = r*P*(1 - P/K).

use super::{non_negative_state, ParameterSpec, ParameterValues, SimulationModel};
use crate::error::{EngineError, EngineResult};
use crate::integrate::{integrate, IntegrationStats, IntegratorSettings, Method};
use crate::metrics::{max, nearest, Metrics};
use crate::time_span::TimeGrid;
use crate::traits::DynamicalSystem;
use crate::trajectory::Trajectory;

const STATES: &[&str] = &["P"];

static PARAMETERS: [ParameterSpec; 2] = [
    ParameterSpec::new("r", 0.5),
    ParameterSpec::new("K", 100.0),
];

struct LogisticGrowth {
    r: f64,
    k: f64,
}

impl DynamicalSystem<f64> for LogisticGrowth {
    fn dimension(&self) -> usize {
        1
    }

    fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
        out[0] = self.r * x[0] * (1.0 - x[0] / self.k);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Logistic;

impl SimulationModel for Logistic {
    fn state_names(&self) -> &'static [&'static str] {
        STATES
    }

    fn parameters(&self) -> &'static [ParameterSpec] {
        &PARAMETERS
    }

    fn validate(&self, params: &ParameterValues, state0: &[f64]) -> EngineResult<()> {
        let k = params.value("K");
        if k <= 0.0 {
            return Err(EngineError::InvalidParameter(format!(
                "carrying capacity 'K' must be positive (got {k})"
            )));
        }
        non_negative_state("P", state0[0])
    }

    fn integrate(
        &self,
        params: &ParameterValues,
        state0: &[f64],
        grid: &TimeGrid,
        method: Method,
        settings: &IntegratorSettings,
    ) -> EngineResult<(Trajectory, IntegrationStats)> {
        let system = LogisticGrowth {
            r: params.value("r"),
            k: params.value("K"),
        };
        integrate(&system, STATES, state0, grid, method, settings)
            .map_err(|d| d.with_parameters(params))
    }

    fn extract_metrics(&self, params: &ParameterValues, trajectory: &Trajectory) -> Metrics {
        let k = params.value("K");
        let population = trajectory.series(0);
        let times = trajectory.times();
        let p_initial = population[0];
        let p_final = population[population.len() - 1];
        let t_halfway = nearest(&population, 0.5 * k).map_or(f64::NAN, |i| times[i]);
        let t_ninety = nearest(&population, 0.9 * k).map_or(f64::NAN, |i| times[i]);
        Metrics::new()
            .with("P_initial", p_initial)
            .with("P_final", p_final)
            .with("P_max", max(&population))
            .with("K", k)
            .with("t_halfway", t_halfway)
            .with("t_ninety", t_ninety)
            .summarized(format!(
                "Population grows from {p_initial:.2} to {p_final:.2} (K={k:.2}), reaching 90% at t ≈ {t_ninety:.2}"
            ))
    }
}
