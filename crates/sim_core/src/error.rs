//! Error taxonomy for the simulation engine.
//!
//! Every failure a request can run into is one of these variants. The engine
//! converts them into `status = "error"` results at its boundary; the
//! `kind()` name prefixes the message callers see.

use crate::registry::ModelKey;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("no model registered for {key}; registered models: {}", join_keys(.available))]
    UnknownModel {
        key: ModelKey,
        available: Vec<ModelKey>,
    },

    #[error("{0}")]
    InvalidTimeSpan(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    InvalidParameter(String),

    #[error("unsupported integration method '{requested}'; supported methods: {}", .supported.join(", "))]
    UnsupportedMethod {
        requested: String,
        supported: Vec<&'static str>,
    },

    #[error("integration failed at t ≈ {t:.6}: {reason} (parameters: {parameters})")]
    SolverDiverged {
        t: f64,
        reason: String,
        parameters: String,
    },

    #[error("model {key} aborted: {message}")]
    ModelPanicked { key: ModelKey, message: String },
}

impl EngineError {
    /// Stable name of the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::UnknownModel { .. } => "UnknownModelError",
            EngineError::InvalidTimeSpan(_) => "InvalidTimeSpanError",
            EngineError::InvalidState(_) => "InvalidStateError",
            EngineError::InvalidParameter(_) => "InvalidParameterError",
            EngineError::UnsupportedMethod { .. } => "UnsupportedMethodError",
            EngineError::SolverDiverged { .. } => "SolverDivergedError",
            EngineError::ModelPanicked { .. } => "ModelError",
        }
    }

    /// `<kind>: <description>`, the message surfaced to callers.
    pub fn describe(&self) -> String {
        format!("{}: {}", self.kind(), self)
    }
}

fn join_keys(keys: &[ModelKey]) -> String {
    if keys.is_empty() {
        return "(none)".to_string();
    }
    keys.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_model_lists_available_keys() {
        let err = EngineError::UnknownModel {
            key: ModelKey::new("epidemiology", "DoesNotExist"),
            available: vec![
                ModelKey::new("epidemiology", "SIR"),
                ModelKey::new("physics", "Projectile"),
            ],
        };
        assert_eq!(
            err.describe(),
            "UnknownModelError: no model registered for epidemiology/DoesNotExist; \
             registered models: epidemiology/SIR, physics/Projectile"
        );
    }

    #[test]
    fn unknown_model_with_empty_registry() {
        let err = EngineError::UnknownModel {
            key: ModelKey::new("a", "b"),
            available: Vec::new(),
        };
        assert!(err.to_string().ends_with("registered models: (none)"));
    }

    #[test]
    fn unsupported_method_enumerates_supported_set() {
        let err = EngineError::UnsupportedMethod {
            requested: "Euler".to_string(),
            supported: vec!["RK45", "RK23", "DOP853"],
        };
        let message = err.describe();
        assert!(message.starts_with("UnsupportedMethodError: "));
        assert!(message.contains("'Euler'"));
        assert!(message.contains("RK45, RK23, DOP853"));
    }

    #[test]
    fn divergence_reports_time_and_parameters() {
        let err = EngineError::SolverDiverged {
            t: 1.25,
            reason: "non-finite state".to_string(),
            parameters: "beta=0.3, gamma=0.1".to_string(),
        };
        let message = err.describe();
        assert!(message.contains("t ≈ 1.250000"));
        assert!(message.contains("beta=0.3, gamma=0.1"));
    }
}
