//! The migration registry and plan computation.
//!
//! A registry is assembled once through [`RegistryBuilder`], validated step by
//! step, and is immutable afterwards. It is `Send + Sync` and can be shared by
//! any number of concurrent engine runs.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{LoadError, RegistrationError, UnreachableReason, UnreachableVersionError};
use crate::loader::MigrationSource;
use crate::version::Version;

use super::step::MigrationStep;

/// Collects and validates steps before freezing them into a registry.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    steps: BTreeMap<Version, Arc<dyn MigrationStep>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a step.
    ///
    /// Rejects a step that does not move strictly forward, and a second step
    /// leaving an already-registered version. Together these rule out cycles
    /// and ambiguous chains.
    pub fn register(
        &mut self,
        step: impl MigrationStep + 'static,
    ) -> Result<&mut Self, RegistrationError> {
        self.register_shared(Arc::new(step))
    }

    pub fn register_shared(
        &mut self,
        step: Arc<dyn MigrationStep>,
    ) -> Result<&mut Self, RegistrationError> {
        let from = step.from_version().clone();
        if step.to_version() <= &from {
            return Err(RegistrationError::NotIncreasing {
                step: step.id(),
                from,
                to: step.to_version().clone(),
            });
        }
        if let Some(existing) = self.steps.get(&from) {
            return Err(RegistrationError::DuplicateSource {
                from,
                existing: existing.id(),
            });
        }
        tracing::debug!(step = %step.id(), "registered migration");
        self.steps.insert(from, step);
        Ok(self)
    }

    pub fn build(self) -> MigrationRegistry {
        MigrationRegistry { steps: self.steps }
    }
}

/// Immutable, validated set of migration steps keyed by source version.
#[derive(Debug, Default)]
pub struct MigrationRegistry {
    steps: BTreeMap<Version, Arc<dyn MigrationStep>>,
}

impl MigrationRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Build a registry from every step a source provides.
    pub fn from_source(source: &dyn MigrationSource) -> Result<MigrationRegistry, LoadError> {
        let mut builder = RegistryBuilder::new();
        for step in source.load()? {
            builder.register_shared(step)?;
        }
        Ok(builder.build())
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Steps ordered by source version.
    pub fn steps(&self) -> impl Iterator<Item = &Arc<dyn MigrationStep>> {
        self.steps.values()
    }

    /// The step leaving `from`, if any.
    pub fn next(&self, from: &Version) -> Option<&Arc<dyn MigrationStep>> {
        self.steps.get(from)
    }

    /// Highest version any step migrates to.
    pub fn latest_version(&self) -> Option<&Version> {
        self.steps.values().map(|s| s.to_version()).max()
    }

    /// Compute the chain of steps leading from `current` to `target`.
    pub fn plan(
        &self,
        current: &Version,
        target: &Version,
    ) -> Result<MigrationPlan, UnreachableVersionError> {
        let unreachable = |reason| UnreachableVersionError {
            current: current.clone(),
            target: target.clone(),
            reason,
        };

        if target < current {
            return Err(unreachable(UnreachableReason::Downgrade));
        }

        let mut steps = Vec::new();
        let mut at = current.clone();
        while &at < target {
            let step = self
                .next(&at)
                .ok_or_else(|| unreachable(UnreachableReason::MissingStep { at: at.clone() }))?;
            if step.to_version() > target {
                return Err(unreachable(UnreachableReason::Overshoot {
                    step_from: at.clone(),
                    to: step.to_version().clone(),
                }));
            }
            at = step.to_version().clone();
            steps.push(Arc::clone(step));
        }

        Ok(MigrationPlan {
            current: current.clone(),
            target: target.clone(),
            steps,
        })
    }
}

/// Ordered chain of steps from `current` to `target`.
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    current: Version,
    target: Version,
    steps: Vec<Arc<dyn MigrationStep>>,
}

/// Serializable summary of one planned step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedStep {
    pub step: String,
    pub from: Version,
    pub to: Version,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl MigrationPlan {
    pub fn current(&self) -> &Version {
        &self.current
    }

    pub fn target(&self) -> &Version {
        &self.target
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[Arc<dyn MigrationStep>] {
        &self.steps
    }

    pub fn summary(&self) -> Vec<PlannedStep> {
        self.steps
            .iter()
            .map(|s| PlannedStep {
                step: s.id(),
                from: s.from_version().clone(),
                to: s.to_version().clone(),
                description: s.description().to_string(),
            })
            .collect()
    }
}
