//! Pluggable simulation models.
//!
//! A model declares its state variables (in output order) and parameters,
//! checks its own invariants, integrates, and extracts its metrics. The
//! engine only ever talks to models through [`SimulationModel`].

pub mod logistic;
pub mod lotka_volterra;
pub mod monte_carlo;
pub mod projectile;
pub mod sir;

pub use logistic::Logistic;
pub use lotka_volterra::LotkaVolterra;
pub use monte_carlo::MonteCarlo;
pub use projectile::Projectile;
pub use sir::Sir;

use crate::error::{EngineError, EngineResult};
use crate::integrate::{IntegrationStats, IntegratorSettings, Method};
use crate::metrics::Metrics;
use crate::time_span::TimeGrid;
use crate::trajectory::Trajectory;
use std::collections::BTreeMap;
use std::fmt;

/// A declared model parameter and the value used when a request omits it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub default: f64,
}

impl ParameterSpec {
    pub const fn new(name: &'static str, default: f64) -> Self {
        Self { name, default }
    }
}

/// Parameter values resolved against a model's declarations, in declared order.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterValues {
    entries: Vec<(&'static str, f64)>,
}

impl ParameterValues {
    /// Fills in defaults for omitted parameters. Names the model does not
    /// declare are ignored.
    pub fn resolve(
        specs: &'static [ParameterSpec],
        given: &BTreeMap<String, f64>,
    ) -> EngineResult<Self> {
        for name in given.keys() {
            if !specs.iter().any(|s| s.name == name) {
                tracing::debug!(parameter = %name, "ignoring undeclared parameter");
            }
        }
        let mut entries = Vec::with_capacity(specs.len());
        for spec in specs {
            let value = given.get(spec.name).copied().unwrap_or(spec.default);
            if !value.is_finite() {
                return Err(EngineError::InvalidParameter(format!(
                    "parameter '{}' must be finite (got {value})",
                    spec.name
                )));
            }
            entries.push((spec.name, value));
        }
        Ok(Self { entries })
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
    }

    /// Value of a declared parameter; NaN if the name was never declared.
    pub fn value(&self, name: &str) -> f64 {
        self.get(name).unwrap_or(f64::NAN)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| *n == name)
    }

    /// Copy with one declared parameter replaced.
    pub fn with_value(&self, name: &str, value: f64) -> Self {
        let entries = self
            .entries
            .iter()
            .map(|&(n, v)| if n == name { (n, value) } else { (n, v) })
            .collect();
        Self { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        self.entries.iter().copied()
    }
}

impl fmt::Display for ParameterValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}

/// Orders `initial_conditions` by the model's declared state names.
///
/// The key sets must match exactly: a missing or unexpected name is an
/// `InvalidState` error listing both sides of the mismatch.
pub fn ordered_initial_state(
    names: &[&str],
    given: &BTreeMap<String, f64>,
) -> EngineResult<Vec<f64>> {
    let missing: Vec<&str> = names
        .iter()
        .copied()
        .filter(|n| !given.contains_key(*n))
        .collect();
    let unexpected: Vec<&str> = given
        .keys()
        .map(String::as_str)
        .filter(|k| !names.contains(k))
        .collect();
    if !missing.is_empty() || !unexpected.is_empty() {
        let mut problems = Vec::new();
        if !missing.is_empty() {
            problems.push(format!("missing [{}]", missing.join(", ")));
        }
        if !unexpected.is_empty() {
            problems.push(format!("unexpected [{}]", unexpected.join(", ")));
        }
        return Err(EngineError::InvalidState(format!(
            "initial_conditions must provide exactly [{}]: {}",
            names.join(", "),
            problems.join("; ")
        )));
    }

    let mut state = Vec::with_capacity(names.len());
    for name in names {
        let value = given[*name];
        if !value.is_finite() {
            return Err(EngineError::InvalidState(format!(
                "initial condition '{name}' must be finite (got {value})"
            )));
        }
        state.push(value);
    }
    Ok(state)
}

/// Output of one model run.
#[derive(Debug, Clone)]
pub struct ModelRun {
    pub trajectory: Trajectory,
    pub stats: IntegrationStats,
    pub metrics: Metrics,
}

/// The capability every registered model provides.
pub trait SimulationModel: Send + Sync {
    /// State variable names in output order.
    fn state_names(&self) -> &'static [&'static str];

    fn parameters(&self) -> &'static [ParameterSpec];

    /// Checks model-declared invariants on the resolved inputs.
    fn validate(&self, _params: &ParameterValues, _state0: &[f64]) -> EngineResult<()> {
        Ok(())
    }

    fn integrate(
        &self,
        params: &ParameterValues,
        state0: &[f64],
        grid: &TimeGrid,
        method: Method,
        settings: &IntegratorSettings,
    ) -> EngineResult<(Trajectory, IntegrationStats)>;

    fn extract_metrics(&self, params: &ParameterValues, trajectory: &Trajectory) -> Metrics;

    fn simulate(
        &self,
        params: &ParameterValues,
        state0: &[f64],
        grid: &TimeGrid,
        method: Method,
        settings: &IntegratorSettings,
    ) -> EngineResult<ModelRun> {
        let (trajectory, stats) = self.integrate(params, state0, grid, method, settings)?;
        let metrics = self.extract_metrics(params, &trajectory);
        Ok(ModelRun {
            trajectory,
            stats,
            metrics,
        })
    }
}

pub(crate) fn non_negative_parameter(name: &str, value: f64) -> EngineResult<()> {
    if value < 0.0 {
        return Err(EngineError::InvalidParameter(format!(
            "parameter '{name}' must be non-negative (got {value})"
        )));
    }
    Ok(())
}

pub(crate) fn non_negative_state(name: &str, value: f64) -> EngineResult<()> {
    if value < 0.0 {
        return Err(EngineError::InvalidState(format!(
            "initial condition '{name}' must be non-negative (got {value})"
        )));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::time_span::{resolve, TimeGrid, TimeSpan, PREVIEW_CAP};
    use std::collections::BTreeMap;

    pub fn map(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    pub fn grid(start: f64, end: f64, steps: usize) -> TimeGrid {
        resolve(&TimeSpan::new(start, end, steps), PREVIEW_CAP).expect("grid")
    }
}
