//! One-way parameter sensitivity by central differences.
//!
//! For each requested `(param, delta)` the model is re-run at `param ± delta`
//! on the same grid, and every base metric `m` gains a companion
//! `d{m}/d{param} = (m(p+δ) - m(p-δ)) / 2δ`.

use crate::error::{EngineError, EngineResult};
use crate::integrate::{IntegratorSettings, Method};
use crate::metrics::Metrics;
use crate::models::{ParameterValues, SimulationModel};
use crate::time_span::TimeGrid;
use std::collections::BTreeMap;

/// Everything needed to re-run a model with one parameter moved.
pub struct Perturbation<'a> {
    pub model: &'a dyn SimulationModel,
    pub params: &'a ParameterValues,
    pub state0: &'a [f64],
    pub grid: &'a TimeGrid,
    pub method: Method,
    pub settings: &'a IntegratorSettings,
}

impl Perturbation<'_> {
    fn metrics_at(&self, name: &str, value: f64) -> EngineResult<Metrics> {
        let params = self.params.with_value(name, value);
        self.model.validate(&params, self.state0)?;
        let run = self
            .model
            .simulate(&params, self.state0, self.grid, self.method, self.settings)?;
        Ok(run.metrics)
    }

    /// Sensitivity metrics for every requested parameter, keyed `d{m}/d{param}`.
    pub fn central_differences(
        &self,
        base: &Metrics,
        deltas: &BTreeMap<String, f64>,
    ) -> EngineResult<BTreeMap<String, f64>> {
        let mut out = BTreeMap::new();
        for (name, &delta) in deltas {
            let Some(value) = self.params.get(name) else {
                let declared: Vec<&str> = self.params.iter().map(|(n, _)| n).collect();
                return Err(EngineError::InvalidParameter(format!(
                    "sensitivity parameter '{name}' is not declared by this model (declared: {})",
                    declared.join(", ")
                )));
            };
            if !delta.is_finite() || delta <= 0.0 {
                return Err(EngineError::InvalidParameter(format!(
                    "sensitivity delta for '{name}' must be finite and positive (got {delta})"
                )));
            }

            let upper = self.metrics_at(name, value + delta)?;
            let lower = self.metrics_at(name, value - delta)?;
            for (metric, _) in base.values() {
                if let (Some(hi), Some(lo)) = (upper.get(metric), lower.get(metric)) {
                    out.insert(format!("d{metric}/d{name}"), (hi - lo) / (2.0 * delta));
                }
            }
            tracing::debug!(parameter = %name, delta, "sensitivity computed");
        }
        Ok(out)
    }
}
