//! The migration engine.
//!
//! A run moves through `Idle -> Planning -> Applying -> Completed`, or ends
//! in `Failed` from either of the middle states:
//!
//! - **Planning** reads the document's version, resolves the target and asks
//!   the registry for a plan. Any error here is returned as `Err` and the
//!   document is never touched.
//! - **Applying** walks the plan in order. A step whose predicate does not
//!   hold is skipped. A step that applies runs against a working copy that is
//!   committed only when the transform succeeds, so a failure leaves the
//!   document exactly as the previous step left it. After each committed step
//!   the version field is rewritten to that step's target version.
//!
//! Step failures do not surface as `Err`: they end the run in `Failed` and are
//! recorded in the [`MigrationReport`] handed back with the partial document.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::document::{Document, WriteOptions};
use crate::error::{MigrationError, StepApplicationError};
use crate::path::JsonPath;
use crate::version::Version;

use super::registry::{MigrationPlan, MigrationRegistry};
use super::report::{MigrationReport, StepRecord, StepStatus};
use super::step::{MigrationStep, StepContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    Idle,
    Planning,
    Applying,
    Completed,
    Failed,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EngineState::Idle => "idle",
            EngineState::Planning => "planning",
            EngineState::Applying => "applying",
            EngineState::Completed => "completed",
            EngineState::Failed => "failed",
        })
    }
}

/// Caller-supplied settings for a run.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Version to migrate to. Defaults to the registry's latest version.
    pub target: Option<Version>,
    /// Where the version field lives.
    pub version_path: JsonPath,
    /// Version assumed when the document has no version field.
    pub default_version: Option<Version>,
    /// Let steps create missing intermediate mappings when writing.
    pub create_intermediate: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            target: None,
            version_path: default_version_path(),
            default_version: None,
            create_intermediate: false,
        }
    }
}

fn default_version_path() -> JsonPath {
    JsonPath::root().join("version")
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(mut self, target: impl Into<Version>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn version_path(mut self, path: JsonPath) -> Self {
        self.version_path = path;
        self
    }

    pub fn default_version(mut self, version: impl Into<Version>) -> Self {
        self.default_version = Some(version.into());
        self
    }

    pub fn create_intermediate(mut self, create: bool) -> Self {
        self.create_intermediate = create;
        self
    }

    fn write_options(&self) -> WriteOptions {
        WriteOptions {
            create_intermediate: self.create_intermediate,
        }
    }
}

/// The migrated (or partially migrated) document and its report.
#[derive(Debug, Clone)]
pub struct MigrationOutcome {
    document: Document,
    report: MigrationReport,
    state: EngineState,
}

impl MigrationOutcome {
    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn report(&self) -> &MigrationReport {
        &self.report
    }

    /// Terminal state of the run: `Completed` or `Failed`.
    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state == EngineState::Completed
    }

    pub fn into_parts(self) -> (Document, MigrationReport) {
        (self.document, self.report)
    }
}

/// Drives runs against a shared registry.
///
/// The engine holds no per-run state, so one engine can serve many threads.
#[derive(Debug, Clone)]
pub struct MigrationEngine<'r> {
    registry: &'r MigrationRegistry,
    config: EngineConfig,
}

impl<'r> MigrationEngine<'r> {
    /// Fails when the configured version path is not definite: a version
    /// field must live at exactly one location.
    pub fn new(
        registry: &'r MigrationRegistry,
        config: EngineConfig,
    ) -> Result<Self, MigrationError> {
        if !config.version_path.is_definite() {
            return Err(MigrationError::IndefiniteVersionPath {
                path: config.version_path.to_string(),
            });
        }
        Ok(MigrationEngine { registry, config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Version recorded in `doc`, or the configured default when absent.
    pub fn current_version(&self, doc: &Document) -> Result<Version, MigrationError> {
        match doc.get(&self.config.version_path) {
            Some(Value::Null) | None => {
                self.config
                    .default_version
                    .clone()
                    .ok_or_else(|| MigrationError::MissingVersion {
                        path: self.config.version_path.to_string(),
                    })
            }
            Some(value) => Ok(Version::from_value(value)?),
        }
    }

    /// Configured target, else the latest registered version, else `current`.
    pub fn target_version(&self, current: &Version) -> Version {
        self.config
            .target
            .clone()
            .or_else(|| self.registry.latest_version().cloned())
            .unwrap_or_else(|| current.clone())
    }

    pub fn plan(&self, doc: &Document) -> Result<MigrationPlan, MigrationError> {
        let current = self.current_version(doc)?;
        let target = self.target_version(&current);
        tracing::debug!(%current, %target, "planning migration");
        Ok(self.registry.plan(&current, &target)?)
    }

    /// Migrate `document` to the target version.
    pub fn run(&self, document: Document) -> Result<MigrationOutcome, MigrationError> {
        let mut run = Run::new();
        run.enter(EngineState::Planning);
        let plan = match self.plan(&document) {
            Ok(plan) => plan,
            Err(e) => {
                run.enter(EngineState::Failed);
                tracing::warn!(error = %e, "migration planning failed");
                return Err(e);
            }
        };

        let mut report = MigrationReport::new(plan.current().clone(), plan.target().clone());
        if plan.is_empty() {
            tracing::debug!(version = %plan.target(), "document already at target version");
            run.enter(EngineState::Completed);
            return Ok(run.finish(document, report));
        }

        run.enter(EngineState::Applying);
        let ctx = StepContext {
            write: self.config.write_options(),
        };
        let mut document = document;
        for step in plan.steps() {
            let applies = step.applies_to(&document);
            let mut working = document.clone();
            let applied = if applies {
                step.apply(&mut working, &ctx)
            } else {
                Ok(())
            };
            let result =
                applied.and_then(|()| self.stamp_version(&mut working, step.to_version()));

            match result {
                Ok(()) => {
                    document = working;
                    let status = if applies {
                        tracing::info!(step = %step.id(), "applied migration");
                        StepStatus::Applied
                    } else {
                        tracing::debug!(step = %step.id(), "predicate does not hold, skipping");
                        StepStatus::Skipped
                    };
                    report.record(record(step.as_ref(), status, None));
                }
                Err(e) => {
                    tracing::warn!(step = %step.id(), error = %e, "migration step failed");
                    report.record(record(step.as_ref(), StepStatus::Failed, Some(e.to_string())));
                    run.enter(EngineState::Failed);
                    return Ok(run.finish(document, report));
                }
            }
        }

        tracing::info!(
            from = %report.from(),
            to = %report.target(),
            applied = report.applied_count(),
            "migration completed"
        );
        run.enter(EngineState::Completed);
        Ok(run.finish(document, report))
    }

    /// Run against a copy of `document`, leaving the original untouched.
    pub fn dry_run(&self, document: &Document) -> Result<MigrationOutcome, MigrationError> {
        self.run(document.clone())
    }

    fn stamp_version(
        &self,
        doc: &mut Document,
        version: &Version,
    ) -> Result<(), StepApplicationError> {
        let path = &self.config.version_path;
        let value = version.to_value_like(doc.get(path));
        match doc.set(path, value, WriteOptions::creating())? {
            0 => Err(StepApplicationError::precondition(
                path.to_string(),
                "version field was not written",
            )),
            _ => Ok(()),
        }
    }
}

fn record(step: &dyn MigrationStep, status: StepStatus, message: Option<String>) -> StepRecord {
    StepRecord {
        step: step.id(),
        from: step.from_version().clone(),
        to: step.to_version().clone(),
        status,
        message,
    }
}

/// State of a single run; transitions are logged.
struct Run {
    state: EngineState,
}

impl Run {
    fn new() -> Self {
        Run {
            state: EngineState::Idle,
        }
    }

    fn enter(&mut self, next: EngineState) {
        tracing::debug!(from = %self.state, to = %next, "engine state transition");
        self.state = next;
    }

    fn finish(self, document: Document, report: MigrationReport) -> MigrationOutcome {
        MigrationOutcome {
            document,
            report,
            state: self.state,
        }
    }
}
