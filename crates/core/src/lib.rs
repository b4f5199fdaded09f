//! configmigration-core: versioned migrations for configuration documents.
//!
//! Reads a JSON or YAML configuration document, detects its schema version,
//! and applies an ordered chain of conditional migration steps to bring it to
//! a target version, producing the migrated document and a report.
//!
//! # Public API
//!
//! Key types are re-exported at the crate root for convenience:
//!
//! - [`Document`] -- insertion-ordered document tree with path-addressed reads and writes
//! - [`JsonPath`] -- compiled path expression, evaluated to concrete [`Location`]s
//! - [`Version`] -- dotted numeric version identifier
//! - [`MigrationStep`] -- predicate + transform between two versions;
//!   [`DeclarativeStep`] and [`FnStep`] implement it
//! - [`RegistryBuilder`] / [`MigrationRegistry`] -- validated, immutable step chain
//! - [`MigrationEngine`] -- runs a plan and returns a [`MigrationOutcome`]
//! - [`DirectorySource`] -- loads steps from `V<version>__<description>.yaml` files
//!
//! ```
//! use configmigration_core::{
//!     Document, DocumentFormat, EngineConfig, MigrationEngine, MigrationRegistry,
//!     DeclarativeStep, Operation, JsonPath,
//! };
//!
//! let mut builder = MigrationRegistry::builder();
//! builder
//!     .register(DeclarativeStep::new(1u64, 2u64, vec![Operation::Rename {
//!         path: JsonPath::root(),
//!         old_key: "name".to_string(),
//!         new_key: "title".to_string(),
//!     }]))
//!     .unwrap();
//! let registry = builder.build();
//!
//! let doc = Document::parse(r#"{"version":1,"name":"x"}"#, DocumentFormat::Json).unwrap();
//! let engine = MigrationEngine::new(&registry, EngineConfig::default()).unwrap();
//! let outcome = engine.run(doc).unwrap();
//! assert_eq!(outcome.document().to_compact_json(), r#"{"version":2,"title":"x"}"#);
//! ```

pub mod document;
pub mod error;
pub mod loader;
pub mod migration;
pub mod path;
pub mod version;

// ── Convenience re-exports ───────────────────────────────────────────

pub use document::{Document, DocumentFormat, WriteOptions};
pub use error::{
    LoadError, MigrationError, ParseError, PathSyntaxError, RegistrationError, SerializeError,
    StepApplicationError, StructuralError, UnreachableReason, UnreachableVersionError,
    VersionError,
};
pub use loader::{DirectorySource, MigrationSource, StaticSource};
pub use migration::{
    Condition, DeclarativeStep, EngineConfig, EngineState, FnStep, MigrationEngine,
    MigrationOutcome, MigrationPlan, MigrationRegistry, MigrationReport, MigrationStep, Operation,
    PlannedStep, RegistryBuilder, RunStatus, StepContext, StepRecord, StepStatus,
};
pub use path::{JsonPath, Location, PathStep};
pub use version::Version;
