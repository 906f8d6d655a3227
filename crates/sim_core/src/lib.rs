pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod integrate;
pub mod metrics;
pub mod models;
pub mod registry;
pub mod request;
pub mod result;
pub mod sensitivity;
pub mod solvers;
pub mod time_span;
/// The `sim_core` crate runs parameterised simulations of small dynamical
/// systems and shapes their output for callers.
///
/// Key components:
/// - **Traits**: `Scalar` (numeric type abstraction), `DynamicalSystem` (ODE right-hand sides), `AdaptiveStepper` (embedded RK steps).
/// - **Solvers**: Bogacki-Shampine 3(2), Dormand-Prince 5(4) and Dormand-Prince 8(5,3) tableaus.
/// - **Integrate**: adaptive stepping that lands exactly on every output grid point.
/// - **Models**: SIR, Lotka-Volterra, logistic growth, projectile and Monte Carlo GBM behind `SimulationModel`.
/// - **Engine**: registry dispatch, validation, sensitivity, artifact export and result shaping.
pub mod traits;
pub mod trajectory;

pub use config::EngineConfig;
pub use engine::{Engine, HealthReport, SimulationOutcome};
pub use error::{EngineError, EngineResult};
pub use export::{ArtifactExporter, FileExporter};
pub use integrate::{IntegratorSettings, Method};
pub use registry::{ModelKey, ModelRegistry};
pub use request::SimulationRequest;
pub use result::{Artifact, ArtifactKind, SimulationResult, Status};
pub use time_span::TimeSpan;
