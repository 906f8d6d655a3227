//! Geometric Brownian motion sampled as a seeded path ensemble.
//!
//! Each path advances exactly between grid points:
//! `S(t+dt) = S(t) * exp((mu - sigma^2/2) dt + sigma dW)`, `dW ~ N(0, dt)`.
//! The reported trajectory is the ensemble mean. The integration method is
//! irrelevant here and ignored.

use super::{ModelRun, ParameterSpec, ParameterValues, SimulationModel};
use crate::error::{EngineError, EngineResult};
use crate::integrate::{IntegrationStats, IntegratorSettings, Method};
use crate::metrics::{mean, percentile, std_dev, Metrics};
use crate::time_span::TimeGrid;
use crate::trajectory::Trajectory;
use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};

pub const MAX_PATHS: usize = 100_000;

const STATES: &[&str] = &["S"];

static PARAMETERS: [ParameterSpec; 4] = [
    ParameterSpec::new("mu", 0.1),
    ParameterSpec::new("sigma", 0.2),
    ParameterSpec::new("n_paths", 100.0),
    ParameterSpec::new("seed", 42.0),
];

/// Ensemble summary kept after sampling: the mean path and every path's
/// terminal value.
struct Ensemble {
    mean_path: Vec<f64>,
    finals: Vec<f64>,
}

fn whole_number(name: &str, value: f64, min: f64, max: f64) -> EngineResult<()> {
    if value.fract() != 0.0 || value < min || value > max {
        return Err(EngineError::InvalidParameter(format!(
            "parameter '{name}' must be an integer in [{min}, {max}] (got {value})"
        )));
    }
    Ok(())
}

fn sample(params: &ParameterValues, s0: f64, times: &[f64]) -> Ensemble {
    let mu = params.value("mu");
    let sigma = params.value("sigma");
    let n_paths = params.value("n_paths") as usize;
    let drift = mu - 0.5 * sigma * sigma;
    let mut rng = StdRng::seed_from_u64(params.value("seed") as u64);

    let mut paths = vec![s0; n_paths];
    let mut mean_path = Vec::with_capacity(times.len());
    mean_path.push(s0);
    for window in times.windows(2) {
        let dt = window[1] - window[0];
        let scale = dt.sqrt();
        for s in paths.iter_mut() {
            let z: f64 = StandardNormal.sample(&mut rng);
            *s *= (drift * dt + sigma * scale * z).exp();
        }
        mean_path.push(mean(&paths));
    }
    Ensemble {
        mean_path,
        finals: paths,
    }
}

fn ensemble_metrics(params: &ParameterValues, s0: f64, ensemble: &Ensemble) -> Metrics {
    let mut finals = ensemble.finals.clone();
    finals.sort_by(f64::total_cmp);
    let n_paths = finals.len();

    let final_mean = mean(&finals);
    let final_min = finals.first().copied().unwrap_or(f64::NAN);
    let final_max = finals.last().copied().unwrap_or(f64::NAN);
    let pct_change = |v: f64| (v - s0) / s0 * 100.0;
    let expected_return = pct_change(final_mean);
    let profitable = finals.iter().filter(|&&s| s > s0).count();
    let prob_profit = profitable as f64 / n_paths as f64 * 100.0;

    Metrics::new()
        .with("S_initial", s0)
        .with("S_final_mean", final_mean)
        .with("S_final_median", percentile(&finals, 50.0))
        .with("S_final_std", std_dev(&finals))
        .with("S_final_min", final_min)
        .with("S_final_max", final_max)
        .with("S_final_p5", percentile(&finals, 5.0))
        .with("S_final_p25", percentile(&finals, 25.0))
        .with("S_final_p75", percentile(&finals, 75.0))
        .with("S_final_p95", percentile(&finals, 95.0))
        .with("expected_return_pct", expected_return)
        .with("max_return_pct", pct_change(final_max))
        .with("min_return_pct", pct_change(final_min))
        .with("prob_profit_pct", prob_profit)
        .with("n_paths", n_paths as f64)
        .with("mu", params.value("mu"))
        .with("sigma", params.value("sigma"))
        .summarized(format!(
            "Monte Carlo ({n_paths} paths): Mean final price {final_mean:.2} \
             (return {expected_return:.1}%), probability of profit {prob_profit:.1}%"
        ))
}

fn mean_trajectory(grid: &TimeGrid, ensemble: &Ensemble) -> Trajectory {
    let states = DMatrix::from_row_slice(1, ensemble.mean_path.len(), &ensemble.mean_path);
    Trajectory::from_names(STATES, grid.times().to_vec(), states)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MonteCarlo;

impl SimulationModel for MonteCarlo {
    fn state_names(&self) -> &'static [&'static str] {
        STATES
    }

    fn parameters(&self) -> &'static [ParameterSpec] {
        &PARAMETERS
    }

    fn validate(&self, params: &ParameterValues, state0: &[f64]) -> EngineResult<()> {
        let sigma = params.value("sigma");
        if sigma < 0.0 {
            return Err(EngineError::InvalidParameter(format!(
                "volatility 'sigma' must be non-negative (got {sigma})"
            )));
        }
        whole_number("n_paths", params.value("n_paths"), 1.0, MAX_PATHS as f64)?;
        whole_number("seed", params.value("seed"), 0.0, u64::MAX as f64)?;
        if state0[0] <= 0.0 {
            return Err(EngineError::InvalidState(format!(
                "initial price 'S' must be positive (got {})",
                state0[0]
            )));
        }
        Ok(())
    }

    fn integrate(
        &self,
        params: &ParameterValues,
        state0: &[f64],
        grid: &TimeGrid,
        _method: Method,
        _settings: &IntegratorSettings,
    ) -> EngineResult<(Trajectory, IntegrationStats)> {
        let ensemble = sample(params, state0[0], grid.times());
        Ok((mean_trajectory(grid, &ensemble), IntegrationStats::default()))
    }

    /// Re-samples the ensemble from the trajectory's grid; the seed makes this
    /// reproduce the paths behind `trajectory`.
    fn extract_metrics(&self, params: &ParameterValues, trajectory: &Trajectory) -> Metrics {
        let s0 = trajectory.value(0, 0);
        let ensemble = sample(params, s0, trajectory.times());
        ensemble_metrics(params, s0, &ensemble)
    }

    fn simulate(
        &self,
        params: &ParameterValues,
        state0: &[f64],
        grid: &TimeGrid,
        _method: Method,
        _settings: &IntegratorSettings,
    ) -> EngineResult<ModelRun> {
        let ensemble = sample(params, state0[0], grid.times());
        let metrics = ensemble_metrics(params, state0[0], &ensemble);
        Ok(ModelRun {
            trajectory: mean_trajectory(grid, &ensemble),
            stats: IntegrationStats::default(),
            metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::{grid, map};

    fn run(overrides: &[(&str, f64)]) -> ModelRun {
        let params = ParameterValues::resolve(&PARAMETERS, &map(overrides)).unwrap();
        MonteCarlo.validate(&params, &[100.0]).expect("valid");
        MonteCarlo
            .simulate(&params, &[100.0], &grid(0.0, 1.0, 253), Method::Rk45, &IntegratorSettings::default())
            .expect("run")
    }

    #[test]
    fn same_seed_same_paths() {
        let a = run(&[("seed", 7.0)]);
        let b = run(&[("seed", 7.0)]);
        assert_eq!(a.trajectory, b.trajectory);
        assert_eq!(a.metrics, b.metrics);

        let c = run(&[("seed", 8.0)]);
        assert_ne!(a.metrics.get("S_final_mean"), c.metrics.get("S_final_mean"));
    }

    #[test]
    fn extract_metrics_reproduces_simulate() {
        let params = ParameterValues::resolve(&PARAMETERS, &map(&[])).unwrap();
        let full = run(&[]);
        let again = MonteCarlo.extract_metrics(&params, &full.trajectory);
        assert_eq!(again, full.metrics);
    }

    #[test]
    fn zero_volatility_is_deterministic_growth() {
        let result = run(&[("sigma", 0.0), ("mu", 0.05), ("n_paths", 3.0)]);
        let expected = 100.0 * 0.05_f64.exp();
        let final_mean = result.metrics.get("S_final_mean").unwrap();
        assert!((final_mean - expected).abs() < 1e-9, "{final_mean}");
        assert!(result.metrics.get("S_final_std").unwrap() < 1e-9);
        assert_eq!(result.metrics.get("prob_profit_pct"), Some(100.0));
    }

    #[test]
    fn percentiles_are_ordered() {
        let m = run(&[("n_paths", 500.0)]).metrics;
        let keys = ["S_final_min", "S_final_p5", "S_final_p25", "S_final_median", "S_final_p75", "S_final_p95", "S_final_max"];
        let values: Vec<f64> = keys.iter().map(|k| m.get(k).unwrap()).collect();
        assert!(values.windows(2).all(|w| w[0] <= w[1]), "{values:?}");
        assert_eq!(m.get("n_paths"), Some(500.0));
        assert!(m.summary().starts_with("Monte Carlo (500 paths): Mean final price "));
    }

    #[test]
    fn mean_path_starts_at_initial_price() {
        let result = run(&[]);
        assert_eq!(result.trajectory.len(), 253);
        assert_eq!(result.trajectory.value(0, 0), 100.0);
    }

    #[test]
    fn rejects_fractional_or_out_of_range_path_counts() {
        for n in [0.0, 2.5, (MAX_PATHS + 1) as f64] {
            let params = ParameterValues::resolve(&PARAMETERS, &map(&[("n_paths", n)])).unwrap();
            let err = MonteCarlo.validate(&params, &[100.0]).unwrap_err();
            assert_eq!(err.kind(), "InvalidParameterError", "n_paths = {n}");
        }
    }

    #[test]
    fn rejects_non_positive_price() {
        let params = ParameterValues::resolve(&PARAMETERS, &map(&[])).unwrap();
        let err = MonteCarlo.validate(&params, &[0.0]).unwrap_err();
        assert_eq!(err.kind(), "InvalidStateError");
    }
}
