//! Susceptible-Infected-Recovered compartment model on population fractions.
//!
//! dS/dt = -beta*S*I
//! dI/dt =  beta*S*I - gamma*I
//! dR/dt =  gamma*I

use super::{non_negative_parameter, non_negative_state, ParameterSpec, ParameterValues, SimulationModel};
use crate::error::{EngineError, EngineResult};
use crate::integrate::{integrate, IntegrationStats, IntegratorSettings, Method};
use crate::metrics::{argmax, Metrics, TIME_DECIMALS, VALUE_DECIMALS};
use crate::time_span::TimeGrid;
use crate::traits::DynamicalSystem;
use crate::trajectory::Trajectory;

/// Allowed deviation of S0 + I0 + R0 from one.
pub const FRACTION_SUM_TOLERANCE: f64 = 1e-6;

const STATES: &[&str] = &["S", "I", "R"];
const INFECTED: usize = 1;

static PARAMETERS: [ParameterSpec; 2] = [
    ParameterSpec::new("beta", 0.3),
    ParameterSpec::new("gamma", 0.1),
];

struct SirSystem {
    beta: f64,
    gamma: f64,
}

impl DynamicalSystem<f64> for SirSystem {
    fn dimension(&self) -> usize {
        3
    }

    fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
        let (s, i) = (x[0], x[1]);
        let infection = self.beta * s * i;
        let recovery = self.gamma * i;
        out[0] = -infection;
        out[1] = infection - recovery;
        out[2] = recovery;
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Sir;

impl SimulationModel for Sir {
    fn state_names(&self) -> &'static [&'static str] {
        STATES
    }

    fn parameters(&self) -> &'static [ParameterSpec] {
        &PARAMETERS
    }

    fn validate(&self, params: &ParameterValues, state0: &[f64]) -> EngineResult<()> {
        non_negative_parameter("beta", params.value("beta"))?;
        non_negative_parameter("gamma", params.value("gamma"))?;
        for (name, &value) in STATES.iter().zip(state0) {
            non_negative_state(name, value)?;
        }
        let total: f64 = state0.iter().sum();
        if (total - 1.0).abs() > FRACTION_SUM_TOLERANCE {
            return Err(EngineError::InvalidState(format!(
                "S + I + R must sum to 1 within {FRACTION_SUM_TOLERANCE:e} (got {total})"
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
        let system = SirSystem {
            beta: params.value("beta"),
            gamma: params.value("gamma"),
        };
        integrate(&system, STATES, state0, grid, method, settings)
            .map_err(|d| d.with_parameters(params))
    }

    fn extract_metrics(&self, _params: &ParameterValues, trajectory: &Trajectory) -> Metrics {
        let infected = trajectory.series(INFECTED);
        let peak = argmax(&infected).unwrap_or(0);
        let i_peak = infected[peak];
        let t_peak = trajectory.times()[peak];
        Metrics::new()
            .with("I_peak", i_peak)
            .with("t_peak", t_peak)
            .summarized(format!(
                "Peak infection {:.*} at t ≈ {:.*}",
                VALUE_DECIMALS, i_peak, TIME_DECIMALS, t_peak
            ))
    }
}
