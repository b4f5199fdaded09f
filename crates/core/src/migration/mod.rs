//! Versioned migrations: steps, the registry that chains them, and the engine
//! that applies a chain to a document.

pub mod condition;
pub mod engine;
pub mod operation;
pub mod registry;
pub mod report;
pub mod step;

pub use condition::Condition;
pub use engine::{EngineConfig, EngineState, MigrationEngine, MigrationOutcome};
pub use operation::Operation;
pub use registry::{MigrationPlan, MigrationRegistry, PlannedStep, RegistryBuilder};
pub use report::{MigrationReport, RunStatus, StepRecord, StepStatus};
pub use step::{DeclarativeStep, FnStep, MigrationStep, StepContext};
