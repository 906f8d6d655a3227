//! Lookup table from `(domain, model_type)` to model implementations.

use crate::error::{EngineError, EngineResult};
use crate::models::{Logistic, LotkaVolterra, MonteCarlo, Projectile, Sir, SimulationModel};
use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelKey {
    pub domain: String,
    pub model_type: String,
}

impl ModelKey {
    pub fn new(domain: impl Into<String>, model_type: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            model_type: model_type.into(),
        }
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.domain, self.model_type)
    }
}

/// Registered models. Populated once at startup and only read afterwards.
#[derive(Default)]
pub struct ModelRegistry {
    models: HashMap<ModelKey, Box<dyn SimulationModel>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtin_models() -> Self {
        let builtin: [(&str, &str, Box<dyn SimulationModel>); 5] = [
            ("epidemiology", "SIR", Box::new(Sir)),
            ("epidemiology", "LotkaVolterra", Box::new(LotkaVolterra)),
            ("epidemiology", "Logistic", Box::new(Logistic)),
            ("physics", "Projectile", Box::new(Projectile)),
            ("finance", "MonteCarlo", Box::new(MonteCarlo)),
        ];
        let mut registry = Self::new();
        for (domain, model_type, model) in builtin {
            registry
                .models
                .insert(ModelKey::new(domain, model_type), model);
        }
        registry
    }

    /// Adds a model under `domain/model_type`. Keys are registered at most once.
    pub fn register(
        &mut self,
        domain: &str,
        model_type: &str,
        model: Box<dyn SimulationModel>,
    ) -> anyhow::Result<()> {
        let key = ModelKey::new(domain, model_type);
        if self.models.contains_key(&key) {
            bail!("model {key} is already registered");
        }
        tracing::debug!(model = %key, "registered model");
        self.models.insert(key, model);
        Ok(())
    }

    pub fn lookup(&self, domain: &str, model_type: &str) -> EngineResult<&dyn SimulationModel> {
        let key = ModelKey::new(domain, model_type);
        match self.models.get(&key) {
            Some(model) => Ok(model.as_ref()),
            None => Err(EngineError::UnknownModel {
                key,
                available: self.keys(),
            }),
        }
    }

    /// Registered keys in sorted order.
    pub fn keys(&self) -> Vec<ModelKey> {
        let mut keys: Vec<ModelKey> = self.models.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("models", &self.keys())
            .finish()
    }
}
