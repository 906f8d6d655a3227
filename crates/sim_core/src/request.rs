//! Inbound simulation request.

use crate::time_span::TimeSpan;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn default_domain() -> String {
    "epidemiology".to_string()
}

fn default_model_type() -> String {
    "SIR".to_string()
}

fn default_method() -> String {
    "RK45".to_string()
}

fn default_true() -> bool {
    true
}

/// One `simulate` call. Built per request and dropped when the call returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRequest {
    #[serde(default = "default_domain")]
    pub domain: String,
    #[serde(default = "default_model_type")]
    pub model_type: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, f64>,
    pub initial_conditions: BTreeMap<String, f64>,
    pub time_span: TimeSpan,
    /// Parsed into a `Method` by the engine so unknown names surface as
    /// `UnsupportedMethodError` results rather than decode failures.
    #[serde(default = "default_method")]
    pub method: String,
    /// Parameter name to perturbation size for one-way sensitivity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensitivity: Option<BTreeMap<String, f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default = "default_true")]
    pub return_data: bool,
    #[serde(default)]
    pub save_artifacts: bool,
}

impl SimulationRequest {
    pub fn new(domain: &str, model_type: &str, time_span: TimeSpan) -> Self {
        Self {
            domain: domain.to_string(),
            model_type: model_type.to_string(),
            parameters: BTreeMap::new(),
            initial_conditions: BTreeMap::new(),
            time_span,
            method: default_method(),
            sensitivity: None,
            tags: None,
            return_data: true,
            save_artifacts: false,
        }
    }

    pub fn parameter(mut self, name: &str, value: f64) -> Self {
        self.parameters.insert(name.to_string(), value);
        self
    }

    pub fn initial(mut self, name: &str, value: f64) -> Self {
        self.initial_conditions.insert(name.to_string(), value);
        self
    }

    pub fn method(mut self, method: &str) -> Self {
        self.method = method.to_string();
        self
    }

    pub fn sensitivity(mut self, name: &str, delta: f64) -> Self {
        self.sensitivity
            .get_or_insert_with(BTreeMap::new)
            .insert(name.to_string(), delta);
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.tags.get_or_insert_with(Vec::new).push(tag.to_string());
        self
    }

    pub fn return_data(mut self, return_data: bool) -> Self {
        self.return_data = return_data;
        self
    }

    pub fn save_artifacts(mut self, save_artifacts: bool) -> Self {
        self.save_artifacts = save_artifacts;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_json_takes_defaults() {
        let request: SimulationRequest = serde_json::from_str(
            r#"{"initial_conditions": {"S": 0.99, "I": 0.01, "R": 0.0},
                "time_span": {"start": 0, "end": 160}}"#,
        )
        .expect("decode");
        assert_eq!(request.domain, "epidemiology");
        assert_eq!(request.model_type, "SIR");
        assert_eq!(request.method, "RK45");
        assert_eq!(request.time_span.steps, 400);
        assert!(!request.time_span.preview_mode);
        assert!(request.return_data);
        assert!(!request.save_artifacts);
        assert!(request.parameters.is_empty());
        assert!(request.sensitivity.is_none());
    }

    #[test]
    fn unknown_method_still_decodes() {
        let request: SimulationRequest = serde_json::from_str(
            r#"{"method": "Euler", "initial_conditions": {}, "time_span": {"start": 0, "end": 1}}"#,
        )
        .expect("decode");
        assert_eq!(request.method, "Euler");
    }

    #[test]
    fn builder_matches_decoded_request() {
        let built = SimulationRequest::new("physics", "Projectile", TimeSpan::new(0.0, 3.0, 50))
            .parameter("v0", 15.0)
            .initial("x", 0.0)
            .sensitivity("v0", 0.5)
            .tag("lab-3")
            .tag("draft");
        let decoded: SimulationRequest = serde_json::from_value(serde_json::json!({
            "domain": "physics",
            "model_type": "Projectile",
            "parameters": {"v0": 15.0},
            "initial_conditions": {"x": 0.0},
            "time_span": {"start": 0.0, "end": 3.0, "steps": 50},
            "sensitivity": {"v0": 0.5},
            "tags": ["lab-3", "draft"]
        }))
        .expect("decode");
        assert_eq!(built, decoded);
    }
}
