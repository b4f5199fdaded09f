//! Migration steps: a predicate plus a transform between two versions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::document::{Document, WriteOptions};
use crate::error::StepApplicationError;
use crate::version::Version;

use super::condition::Condition;
use super::operation::Operation;

/// Per-run settings handed to every step.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepContext {
    pub write: WriteOptions,
}

/// A single versioned, conditional transformation.
///
/// Implementations must be deterministic: no clocks, randomness or
/// environment reads. They are shared across threads through the registry.
pub trait MigrationStep: Send + Sync {
    fn from_version(&self) -> &Version;

    fn to_version(&self) -> &Version;

    fn description(&self) -> &str {
        ""
    }

    /// Identity used in reports, e.g. `1->2`.
    fn id(&self) -> String {
        format!("{}->{}", self.from_version(), self.to_version())
    }

    /// Whether the step applies to `doc`. Non-applicable steps are skipped.
    fn applies_to(&self, doc: &Document) -> bool;

    /// Transform `doc` in place.
    fn apply(&self, doc: &mut Document, ctx: &StepContext) -> Result<(), StepApplicationError>;
}

impl fmt::Debug for dyn MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationStep")
            .field("from", self.from_version())
            .field("to", self.to_version())
            .field("description", &self.description())
            .finish()
    }
}

/// A step described by data: an optional condition and a list of operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclarativeStep {
    pub from: Version,
    pub to: Version,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<Condition>,
    pub operations: Vec<Operation>,
}

impl DeclarativeStep {
    pub fn new(from: impl Into<Version>, to: impl Into<Version>, operations: Vec<Operation>) -> Self {
        DeclarativeStep {
            from: from.into(),
            to: to.into(),
            description: String::new(),
            when: None,
            operations,
        }
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.when = Some(condition);
        self
    }
}

impl MigrationStep for DeclarativeStep {
    fn from_version(&self) -> &Version {
        &self.from
    }

    fn to_version(&self) -> &Version {
        &self.to
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn applies_to(&self, doc: &Document) -> bool {
        self.when.as_ref().map_or(true, |c| c.holds(doc))
    }

    fn apply(&self, doc: &mut Document, ctx: &StepContext) -> Result<(), StepApplicationError> {
        for operation in &self.operations {
            tracing::trace!(step = %self.id(), %operation, "applying operation");
            operation.apply(doc, ctx.write)?;
        }
        Ok(())
    }
}

type Predicate = dyn Fn(&Document) -> bool + Send + Sync;
type Transform = dyn Fn(&mut Document, &StepContext) -> Result<(), StepApplicationError> + Send + Sync;

/// A step built from closures, for migrations written in code.
pub struct FnStep {
    from: Version,
    to: Version,
    description: String,
    predicate: Option<Box<Predicate>>,
    transform: Box<Transform>,
}

impl FnStep {
    pub fn new<F>(from: impl Into<Version>, to: impl Into<Version>, transform: F) -> Self
    where
        F: Fn(&mut Document, &StepContext) -> Result<(), StepApplicationError>
            + Send
            + Sync
            + 'static,
    {
        FnStep {
            from: from.into(),
            to: to.into(),
            description: String::new(),
            predicate: None,
            transform: Box::new(transform),
        }
    }

    pub fn when<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&Document) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Box::new(predicate));
        self
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl MigrationStep for FnStep {
    fn from_version(&self) -> &Version {
        &self.from
    }

    fn to_version(&self) -> &Version {
        &self.to
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn applies_to(&self, doc: &Document) -> bool {
        self.predicate.as_ref().map_or(true, |p| p(doc))
    }

    fn apply(&self, doc: &mut Document, ctx: &StepContext) -> Result<(), StepApplicationError> {
        (self.transform)(doc, ctx)
    }
}
