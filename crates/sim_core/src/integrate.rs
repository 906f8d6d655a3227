//! Adaptive integration onto a fixed output grid.
//!
//! Steps are chosen by the embedded error estimate but clipped so that every
//! grid time is landed on exactly. Only the grid points are recorded; the
//! intermediate adaptive steps never leave this module and no interpolation
//! is involved.

use crate::error::EngineError;
use crate::solvers::ExplicitRk;
use crate::time_span::TimeGrid;
use crate::traits::{AdaptiveStepper, DynamicalSystem};
use crate::trajectory::Trajectory;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;

/// Integration schemes accepted in requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    #[default]
    #[serde(rename = "RK45")]
    Rk45,
    #[serde(rename = "RK23")]
    Rk23,
    #[serde(rename = "DOP853")]
    Dop853,
}

impl Method {
    pub const ALL: [Method; 3] = [Method::Rk45, Method::Rk23, Method::Dop853];

    pub fn name(self) -> &'static str {
        match self {
            Method::Rk45 => "RK45",
            Method::Rk23 => "RK23",
            Method::Dop853 => "DOP853",
        }
    }

    pub fn supported_names() -> Vec<&'static str> {
        Self::ALL.iter().map(|m| m.name()).collect()
    }

    fn stepper(self, dim: usize) -> ExplicitRk<f64> {
        match self {
            Method::Rk45 => ExplicitRk::dopri5(dim),
            Method::Rk23 => ExplicitRk::rk23(dim),
            Method::Dop853 => ExplicitRk::dop853(dim),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Method {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.name() == s)
            .ok_or_else(|| EngineError::UnsupportedMethod {
                requested: s.to_string(),
                supported: Self::supported_names(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntegratorSettings {
    pub rtol: f64,
    pub atol: f64,
    /// Upper bound on accepted plus rejected steps between two grid points.
    pub max_steps_per_interval: usize,
}

impl Default for IntegratorSettings {
    fn default() -> Self {
        Self {
            rtol: 1e-6,
            atol: 1e-9,
            max_steps_per_interval: 100_000,
        }
    }
}

/// Solver diagnostics for one integration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationStats {
    pub evaluations: usize,
    pub accepted: usize,
    pub rejected: usize,
}

/// Point and cause of a failed integration. Models attach their parameters
/// when turning this into an `EngineError`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("integration failed at t = {t}: {reason}")]
pub struct Divergence {
    pub t: f64,
    pub reason: String,
}

impl Divergence {
    fn at(t: f64, reason: impl Into<String>) -> Self {
        Self {
            t,
            reason: reason.into(),
        }
    }

    pub fn with_parameters(self, parameters: impl fmt::Display) -> EngineError {
        EngineError::SolverDiverged {
            t: self.t,
            reason: self.reason,
            parameters: parameters.to_string(),
        }
    }
}

pub fn integrate<S>(
    system: &S,
    names: &[&str],
    initial_state: &[f64],
    grid: &TimeGrid,
    method: Method,
    settings: &IntegratorSettings,
) -> Result<(Trajectory, IntegrationStats), Divergence>
where
    S: DynamicalSystem<f64>,
{
    let dim = system.dimension();
    let t0 = grid.start();
    if initial_state.len() != dim || names.len() != dim {
        return Err(Divergence::at(
            t0,
            format!(
                "state dimension mismatch: system has {dim}, got {} values and {} names",
                initial_state.len(),
                names.len()
            ),
        ));
    }

    let mut stepper = method.stepper(dim);
    let exponent = -1.0 / (stepper.error_order() as f64 + 1.0);
    let mut stats = IntegrationStats::default();

    let mut t = t0;
    let mut y = initial_state.to_vec();
    let mut f = vec![0.0; dim];
    system.apply(t, &y, &mut f);
    stats.evaluations += 1;
    if !all_finite(&y) || !all_finite(&f) {
        return Err(Divergence::at(t, "non-finite initial state or derivative"));
    }

    let mut states = DMatrix::zeros(dim, grid.len());
    states.column_mut(0).copy_from_slice(&y);

    let mut h = initial_step(
        system,
        t,
        &y,
        &f,
        grid.end() - t,
        stepper.error_order(),
        settings,
        &mut stats,
    );
    let mut y_new = vec![0.0; dim];
    let mut f_new = vec![0.0; dim];

    for (col, &target) in grid.times().iter().enumerate().skip(1) {
        let mut attempts = 0usize;
        while t < target {
            if attempts >= settings.max_steps_per_interval {
                return Err(Divergence::at(
                    t,
                    format!(
                        "exceeded {} steps before reaching t = {target}",
                        settings.max_steps_per_interval
                    ),
                ));
            }
            attempts += 1;

            let min_step = 10.0 * f64::EPSILON * t.abs().max(f64::MIN_POSITIVE);
            if !(h >= min_step) {
                return Err(Divergence::at(
                    t,
                    format!("step size {h:e} fell below the minimum {min_step:e}"),
                ));
            }

            let remaining = target - t;
            let clipped = h >= remaining;
            let t_next = if clipped { target } else { t + h };
            let dt = t_next - t;

            let err = stepper.attempt(
                system,
                t,
                &y,
                &f,
                dt,
                settings.rtol,
                settings.atol,
                &mut y_new,
                &mut f_new,
            );
            stats.evaluations += stepper.evaluations_per_step();

            let usable = err.is_finite() && all_finite(&y_new) && all_finite(&f_new);
            if usable && err < 1.0 {
                let factor = if err == 0.0 {
                    MAX_FACTOR
                } else {
                    (SAFETY * err.powf(exponent)).min(MAX_FACTOR)
                };
                if !clipped {
                    h = dt * factor;
                }
                t = t_next;
                std::mem::swap(&mut y, &mut y_new);
                std::mem::swap(&mut f, &mut f_new);
                stats.accepted += 1;
            } else {
                let factor = if usable {
                    (SAFETY * err.powf(exponent)).max(MIN_FACTOR)
                } else {
                    MIN_FACTOR
                };
                h = dt * factor;
                stats.rejected += 1;
            }
        }
        states.column_mut(col).copy_from_slice(&y);
    }

    let names = names.iter().map(|n| n.to_string()).collect();
    Ok((Trajectory::new(names, grid.times().to_vec(), states), stats))
}

/// Hairer's starting step heuristic, bounded by the span length.
#[allow(clippy::too_many_arguments)]
fn initial_step<S: DynamicalSystem<f64>>(
    system: &S,
    t0: f64,
    y0: &[f64],
    f0: &[f64],
    span: f64,
    error_order: usize,
    settings: &IntegratorSettings,
    stats: &mut IntegrationStats,
) -> f64 {
    if y0.is_empty() {
        return span;
    }
    let scale: Vec<f64> = y0
        .iter()
        .map(|v| settings.atol + v.abs() * settings.rtol)
        .collect();
    let d0 = rms_scaled(y0, &scale);
    let d1 = rms_scaled(f0, &scale);
    let h0 = if d0 < 1e-5 || d1 < 1e-5 {
        1e-6
    } else {
        0.01 * d0 / d1
    };
    let h0 = h0.min(span);

    let y1: Vec<f64> = y0.iter().zip(f0).map(|(y, f)| y + h0 * f).collect();
    let mut f1 = vec![0.0; y0.len()];
    system.apply(t0 + h0, &y1, &mut f1);
    stats.evaluations += 1;

    let diff: Vec<f64> = f1.iter().zip(f0).map(|(a, b)| a - b).collect();
    let d2 = rms_scaled(&diff, &scale) / h0;

    let h1 = if d1 <= 1e-15 && d2 <= 1e-15 {
        (h0 * 1e-3).max(1e-6)
    } else {
        (0.01 / d1.max(d2)).powf(1.0 / (error_order as f64 + 1.0))
    };

    let h = (100.0 * h0).min(h1).min(span);
    if h.is_finite() && h > 0.0 {
        h
    } else {
        h0
    }
}

fn rms_scaled(values: &[f64], scale: &[f64]) -> f64 {
    let sum: f64 = values
        .iter()
        .zip(scale)
        .map(|(v, s)| (v / s) * (v / s))
        .sum();
    (sum / values.len() as f64).sqrt()
}

fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite())
}
