//! Request execution: registry lookup, grid resolution, validation,
//! integration, metrics, optional sensitivity and export, result shaping.

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::export::{new_run_id, ArtifactExporter};
use crate::integrate::{IntegrationStats, Method};
use crate::metrics::Metrics;
use crate::models::{ordered_initial_state, ParameterValues};
use crate::registry::{ModelKey, ModelRegistry};
use crate::request::SimulationRequest;
use crate::result::{columns, data_points, Artifact, SimulationResult};
use crate::sensitivity::Perturbation;
use crate::time_span::{resolve, TimeGrid};
use crate::trajectory::Trajectory;
use chrono::Utc;
use serde::Serialize;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

/// A successful run before it is shaped for the caller.
#[derive(Debug, Clone)]
pub struct SimulationOutcome {
    pub run_id: String,
    pub key: ModelKey,
    pub method: Method,
    pub grid: TimeGrid,
    pub trajectory: Trajectory,
    pub stats: IntegrationStats,
    pub metrics: Metrics,
    pub artifacts: Vec<Artifact>,
}

impl SimulationOutcome {
    pub fn into_result(self, return_data: bool) -> SimulationResult {
        SimulationResult::success(&self.trajectory, self.metrics, self.artifacts, return_data)
    }
}

pub const SERVICE_NAME: &str = "simulation-engine";

/// Liveness snapshot reported by hosts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,
    pub solvers: usize,
}

/// Owns the model registry and configuration; shared by reference across
/// requests.
#[derive(Debug)]
pub struct Engine {
    registry: ModelRegistry,
    config: EngineConfig,
}

impl Default for Engine {
    fn default() -> Self {
        Self::with_builtin_models()
    }
}

impl Engine {
    pub fn new(registry: ModelRegistry, config: EngineConfig) -> Self {
        Self { registry, config }
    }

    pub fn with_builtin_models() -> Self {
        Self::new(ModelRegistry::with_builtin_models(), EngineConfig::default())
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn health(&self, storage: Option<&Path>) -> HealthReport {
        HealthReport {
            status: "healthy",
            service: SERVICE_NAME,
            version: env!("CARGO_PKG_VERSION"),
            storage: storage.map(|dir| dir.display().to_string()),
            solvers: self.registry.len(),
        }
    }

    /// Runs a request and shapes the outcome. Errors never escape: they come
    /// back as `status = "error"` results.
    pub fn simulate(
        &self,
        request: &SimulationRequest,
        exporter: Option<&dyn ArtifactExporter>,
    ) -> SimulationResult {
        match self.run(request, exporter) {
            Ok(outcome) => outcome.into_result(request.return_data),
            Err(err) => SimulationResult::failure(&err),
        }
    }

    pub fn run(
        &self,
        request: &SimulationRequest,
        exporter: Option<&dyn ArtifactExporter>,
    ) -> EngineResult<SimulationOutcome> {
        let run_id = new_run_id(&request.model_type);
        let started = Utc::now();
        tracing::info!(
            run_id = %run_id,
            domain = %request.domain,
            model_type = %request.model_type,
            method = %request.method,
            tags = ?request.tags,
            steps = request.time_span.steps,
            preview = request.time_span.preview_mode,
            "simulation requested"
        );

        let outcome = self.execute(run_id.clone(), request, exporter);
        let elapsed_ms = (Utc::now() - started).num_milliseconds();
        match &outcome {
            Ok(outcome) => tracing::info!(
                run_id = %run_id,
                points = outcome.grid.len(),
                elapsed_ms,
                "simulation completed"
            ),
            Err(err) => tracing::error!(
                run_id = %run_id,
                kind = err.kind(),
                elapsed_ms,
                "simulation failed: {err}"
            ),
        }
        outcome
    }

    fn execute(
        &self,
        run_id: String,
        request: &SimulationRequest,
        exporter: Option<&dyn ArtifactExporter>,
    ) -> EngineResult<SimulationOutcome> {
        let key = ModelKey::new(request.domain.as_str(), request.model_type.as_str());
        let model = self.registry.lookup(&key.domain, &key.model_type)?;

        let grid = resolve(&request.time_span, self.config.preview_cap)?;
        if grid.decimated() {
            tracing::info!(
                requested = grid.requested_steps(),
                resolved = grid.len(),
                "preview mode reduced output density"
            );
        }

        let method: Method = request.method.parse()?;
        let params = ParameterValues::resolve(model.parameters(), &request.parameters)?;
        let state0 = ordered_initial_state(model.state_names(), &request.initial_conditions)?;
        contain(&key, || model.validate(&params, &state0))?;

        let settings = self.config.integrator_settings();
        let run = contain(&key, || model.simulate(&params, &state0, &grid, method, &settings))?;
        tracing::debug!(
            evaluations = run.stats.evaluations,
            accepted = run.stats.accepted,
            rejected = run.stats.rejected,
            "solver statistics"
        );

        let mut metrics = run.metrics;
        if let Some(deltas) = request.sensitivity.as_ref().filter(|d| !d.is_empty()) {
            let perturbation = Perturbation {
                model,
                params: &params,
                state0: &state0,
                grid: &grid,
                method,
                settings: &settings,
            };
            let sensitivities = contain(&key, || perturbation.central_differences(&metrics, deltas))?;
            for (name, value) in sensitivities {
                metrics.insert(name, value);
            }
        }

        let artifacts = if request.save_artifacts {
            export_artifacts(exporter, &run.trajectory, &run_id)
        } else {
            Vec::new()
        };

        Ok(SimulationOutcome {
            run_id,
            key,
            method,
            grid,
            trajectory: run.trajectory,
            stats: run.stats,
            metrics,
            artifacts,
        })
    }
}

/// Export problems are reported but never fail the run.
fn export_artifacts(
    exporter: Option<&dyn ArtifactExporter>,
    trajectory: &Trajectory,
    run_id: &str,
) -> Vec<Artifact> {
    let Some(exporter) = exporter else {
        tracing::warn!(run_id, "save_artifacts requested but no exporter is configured");
        return Vec::new();
    };
    match exporter.export(&columns(trajectory), &data_points(trajectory), run_id) {
        Ok(artifacts) => {
            for artifact in &artifacts {
                tracing::info!(run_id, path = %artifact.path, "artifact saved");
            }
            artifacts
        }
        Err(err) => {
            tracing::warn!(run_id, "artifact export failed: {err:#}");
            Vec::new()
        }
    }
}

/// Runs model code so that a panic becomes `ModelPanicked` for `key`.
fn contain<T>(key: &ModelKey, f: impl FnOnce() -> EngineResult<T>) -> EngineResult<T> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| EngineError::ModelPanicked {
        key: key.clone(),
        message: panic_payload_to_string(payload),
    })?
}

fn panic_payload_to_string(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    "model panicked".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrate::IntegratorSettings;
    use crate::models::{ParameterSpec, SimulationModel};
    use crate::result::Status;
    use crate::time_span::TimeSpan;
    use anyhow::anyhow;
    use std::sync::Mutex;

    fn sir_request() -> SimulationRequest {
        SimulationRequest::new("epidemiology", "SIR", TimeSpan::new(0.0, 160.0, 400))
            .parameter("beta", 0.3)
            .parameter("gamma", 0.1)
            .initial("S", 0.99)
            .initial("I", 0.01)
            .initial("R", 0.0)
    }

    struct Exploding;

    impl SimulationModel for Exploding {
        fn state_names(&self) -> &'static [&'static str] {
            &["x"]
        }

        fn parameters(&self) -> &'static [ParameterSpec] {
            &[]
        }

        fn integrate(
            &self,
            _params: &ParameterValues,
            _state0: &[f64],
            _grid: &TimeGrid,
            _method: Method,
            _settings: &IntegratorSettings,
        ) -> EngineResult<(Trajectory, IntegrationStats)> {
            panic!("boom")
        }

        fn extract_metrics(&self, _params: &ParameterValues, _trajectory: &Trajectory) -> Metrics {
            Metrics::new()
        }
    }

    static FRAGILE_PARAMETERS: [ParameterSpec; 1] = [ParameterSpec::new("k", 1.0)];

    /// Integrates dx/dt = -k*x but only tolerates its default rate.
    struct Fragile;

    struct Decay {
        k: f64,
    }

    impl crate::traits::DynamicalSystem<f64> for Decay {
        fn dimension(&self) -> usize {
            1
        }

        fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
            out[0] = -self.k * x[0];
        }
    }

    impl SimulationModel for Fragile {
        fn state_names(&self) -> &'static [&'static str] {
            &["x"]
        }

        fn parameters(&self) -> &'static [ParameterSpec] {
            &FRAGILE_PARAMETERS
        }

        fn integrate(
            &self,
            params: &ParameterValues,
            state0: &[f64],
            grid: &TimeGrid,
            method: Method,
            settings: &IntegratorSettings,
        ) -> EngineResult<(Trajectory, IntegrationStats)> {
            let k = params.value("k");
            assert!(k == 1.0, "unsupported rate {k}");
            crate::integrate::integrate(&Decay { k }, &["x"], state0, grid, method, settings)
                .map_err(|d| d.with_parameters(params))
        }

        fn extract_metrics(&self, _params: &ParameterValues, trajectory: &Trajectory) -> Metrics {
            let x = trajectory.series(0);
            Metrics::new().with("x_final", x[x.len() - 1])
        }
    }

    #[derive(Default)]
    struct RecordingExporter {
        calls: Mutex<Vec<(Vec<String>, usize, String)>>,
        fail: bool,
    }

    impl ArtifactExporter for RecordingExporter {
        fn export(
            &self,
            columns: &[String],
            rows: &[crate::result::DataPoint],
            run_id: &str,
        ) -> anyhow::Result<Vec<Artifact>> {
            if self.fail {
                return Err(anyhow!("disk full"));
            }
            self.calls
                .lock()
                .unwrap()
                .push((columns.to_vec(), rows.len(), run_id.to_string()));
            Ok(vec![Artifact {
                kind: crate::result::ArtifactKind::Csv,
                path: format!("{run_id}.csv"),
                sha256: None,
            }])
        }
    }

    #[test]
    fn sir_request_succeeds() {
        let engine = Engine::with_builtin_models();
        let result = engine.simulate(&sir_request(), None);
        assert_eq!(result.status, Status::Success);
        assert_eq!(result.message, "Simulation completed");
        assert_eq!(
            result.columns.as_deref(),
            Some(&["t".to_string(), "S".to_string(), "I".to_string(), "R".to_string()][..])
        );
        assert_eq!(result.data.as_ref().map(Vec::len), Some(400));
        assert!(result.summary.unwrap().starts_with("Peak infection"));
    }

    #[test]
    fn tagged_request_runs_like_untagged() {
        let engine = Engine::with_builtin_models();
        let plain = engine.simulate(&sir_request(), None);
        let tagged = engine.simulate(&sir_request().tag("cohort-a").tag("baseline"), None);
        assert!(tagged.is_success());
        assert_eq!(tagged.metrics, plain.metrics);
        assert_eq!(tagged.summary, plain.summary);
    }

    #[test]
    fn unsupported_method_becomes_error_result() {
        let engine = Engine::with_builtin_models();
        let result = engine.simulate(&sir_request().method("Euler"), None);
        assert_eq!(result.status, Status::Error);
        assert!(result.message.starts_with("UnsupportedMethodError: "));
        assert!(result.message.contains("RK45, RK23, DOP853"));
        assert!(result.metrics.is_empty());
    }

    #[test]
    fn mismatched_initial_conditions_are_rejected() {
        let engine = Engine::with_builtin_models();
        let request = sir_request().initial("X", 0.0);
        let err = engine.run(&request, None).unwrap_err();
        assert_eq!(err.kind(), "InvalidStateError");
    }

    #[test]
    fn model_panic_is_contained() {
        let mut registry = ModelRegistry::new();
        registry
            .register("custom", "Exploding", Box::new(Exploding))
            .unwrap();
        let engine = Engine::new(registry, EngineConfig::default());
        let request = SimulationRequest::new("custom", "Exploding", TimeSpan::new(0.0, 1.0, 5))
            .initial("x", 1.0);
        let result = engine.simulate(&request, None);
        assert_eq!(result.status, Status::Error);
        assert_eq!(result.message, "ModelError: model custom/Exploding aborted: boom");
    }

    #[test]
    fn panic_during_sensitivity_rerun_is_contained() {
        let mut registry = ModelRegistry::new();
        registry.register("custom", "Fragile", Box::new(Fragile)).unwrap();
        let engine = Engine::new(registry, EngineConfig::default());
        let request = SimulationRequest::new("custom", "Fragile", TimeSpan::new(0.0, 1.0, 11))
            .initial("x", 1.0);

        let result = engine.simulate(&request, None);
        assert!(result.is_success(), "{}", result.message);

        let result = engine.simulate(&request.clone().sensitivity("k", 0.1), None);
        assert_eq!(result.status, Status::Error);
        assert!(
            result
                .message
                .starts_with("ModelError: model custom/Fragile aborted: unsupported rate"),
            "{}",
            result.message
        );
        assert!(result.data.is_none());

        assert!(engine.simulate(&request, None).is_success());
    }

    #[test]
    fn sensitivity_metrics_are_added() {
        let engine = Engine::with_builtin_models();
        let result = engine.simulate(&sir_request().sensitivity("beta", 0.01), None);
        assert!(result.is_success(), "{}", result.message);
        assert!(result.metrics.contains_key("dI_peak/dbeta"));
        assert!(result.metrics.contains_key("dt_peak/dbeta"));
        // A faster spread raises the peak.
        assert!(result.metrics["dI_peak/dbeta"] > 0.0);
    }

    #[test]
    fn artifacts_exported_only_when_requested() {
        let engine = Engine::with_builtin_models();
        let exporter = RecordingExporter::default();

        let result = engine.simulate(&sir_request(), Some(&exporter));
        assert!(result.artifacts.is_empty());
        assert!(exporter.calls.lock().unwrap().is_empty());

        let result = engine.simulate(&sir_request().save_artifacts(true), Some(&exporter));
        assert_eq!(result.artifacts.len(), 1);
        let calls = exporter.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, vec!["t", "S", "I", "R"]);
        assert_eq!(calls[0].1, 400);
        assert!(calls[0].2.starts_with("sir_"));
    }

    #[test]
    fn export_failure_keeps_the_run_successful() {
        let engine = Engine::with_builtin_models();
        let exporter = RecordingExporter {
            fail: true,
            ..Default::default()
        };
        let result = engine.simulate(&sir_request().save_artifacts(true), Some(&exporter));
        assert!(result.is_success());
        assert!(result.artifacts.is_empty());

        let result = engine.simulate(&sir_request().save_artifacts(true), None);
        assert!(result.is_success());
        assert!(result.artifacts.is_empty());
    }

    #[test]
    fn health_counts_registered_models() {
        let engine = Engine::with_builtin_models();
        let report = engine.health(Some(Path::new("/tmp/storage")));
        assert_eq!(report.status, "healthy");
        assert_eq!(report.solvers, 5);
        assert_eq!(report.version, "0.1.0");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["storage"], "/tmp/storage");
        assert!(serde_json::to_value(engine.health(None)).unwrap().get("storage").is_none());
    }

    #[test]
    fn preview_cap_comes_from_config() {
        let config = EngineConfig {
            preview_cap: 25,
            ..EngineConfig::default()
        };
        let engine = Engine::new(ModelRegistry::with_builtin_models(), config);
        let mut request = sir_request();
        request.time_span = request.time_span.preview();
        let outcome = engine.run(&request, None).expect("run");
        assert_eq!(outcome.grid.len(), 25);
        assert_eq!(outcome.grid.requested_steps(), 400);
    }
}
