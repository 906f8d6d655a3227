use crate::integrate::IntegratorSettings;
use crate::time_span::PREVIEW_CAP;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Engine-wide knobs. Every field has a default so partial config files work.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on output points when a request asks for preview mode.
    pub preview_cap: usize,
    pub rtol: f64,
    pub atol: f64,
    pub max_steps_per_interval: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let solver = IntegratorSettings::default();
        Self {
            preview_cap: PREVIEW_CAP,
            rtol: solver.rtol,
            atol: solver.atol,
            max_steps_per_interval: solver.max_steps_per_interval,
        }
    }
}

impl EngineConfig {
    pub fn validated(self) -> Result<Self> {
        if self.preview_cap < 2 {
            bail!("preview_cap must be at least 2 (got {})", self.preview_cap);
        }
        if !(self.rtol.is_finite() && self.rtol > 0.0) {
            bail!("rtol must be positive and finite (got {})", self.rtol);
        }
        if !(self.atol.is_finite() && self.atol > 0.0) {
            bail!("atol must be positive and finite (got {})", self.atol);
        }
        if self.max_steps_per_interval == 0 {
            bail!("max_steps_per_interval must be positive");
        }
        Ok(self)
    }

    pub fn integrator_settings(&self) -> IntegratorSettings {
        IntegratorSettings {
            rtol: self.rtol,
            atol: self.atol,
            max_steps_per_interval: self.max_steps_per_interval,
        }
    }
}
