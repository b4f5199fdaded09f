//! Error taxonomy for document handling, planning and step application.
//!
//! Parse, path-syntax, version and planning errors are returned to the caller
//! before any mutation happens. Step application errors never escape a run as
//! `Err`: the engine records them in the report and hands back the partial
//! document.

use std::path::PathBuf;

use crate::version::Version;

/// Document text could not be parsed.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid JSON document: {0}")]
    Json(#[source] serde_json::Error),

    #[error("invalid YAML document: {0}")]
    Yaml(#[source] serde_yaml::Error),
}

/// Document could not be rendered in the requested format.
#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("could not render document as JSON: {0}")]
    Json(#[source] serde_json::Error),

    #[error("could not render document as YAML: {0}")]
    Yaml(#[source] serde_yaml::Error),
}

/// A path expression is malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid path expression '{expression}' at offset {offset}: {message}")]
pub struct PathSyntaxError {
    pub expression: String,
    pub offset: usize,
    pub message: String,
}

/// A write could not be carried out without changing the shape of the tree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("structural error at {path}: {message}")]
pub struct StructuralError {
    pub path: String,
    pub message: String,
}

impl StructuralError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        StructuralError {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A version identifier could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid version '{input}': {message}")]
pub struct VersionError {
    pub input: String,
    pub message: String,
}

/// Why no chain of steps connects two versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnreachableReason {
    /// The target is older than the current version.
    Downgrade,
    /// No registered step starts at `at`.
    MissingStep { at: Version },
    /// The step leaving `step_from` jumps past the target to `to`.
    Overshoot { step_from: Version, to: Version },
}

impl std::fmt::Display for UnreachableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnreachableReason::Downgrade => write!(f, "migrations are forward-only"),
            UnreachableReason::MissingStep { at } => {
                write!(f, "no migration starts at version {}", at)
            }
            UnreachableReason::Overshoot { step_from, to } => write!(
                f,
                "migration from version {} jumps past the target to {}",
                step_from, to
            ),
        }
    }
}

/// Planning failed: the target cannot be reached from the current version.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot migrate from version {current} to {target}: {reason}")]
pub struct UnreachableVersionError {
    pub current: Version,
    pub target: Version,
    pub reason: UnreachableReason,
}

/// A step was rejected by the registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    /// Two steps would leave the same version.
    #[error("ambiguous chain: a migration from version {from} is already registered ({existing})")]
    DuplicateSource { from: Version, existing: String },

    /// `to` must be strictly greater than `from`.
    #[error("migration {step} does not move forward: {from} -> {to}")]
    NotIncreasing {
        step: String,
        from: Version,
        to: Version,
    },
}

/// A step's transform failed for the document at hand.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StepApplicationError {
    #[error(transparent)]
    Structural(#[from] StructuralError),

    /// The document does not satisfy an operation's requirement.
    #[error("value at {path} {message}")]
    Precondition { path: String, message: String },

    /// A node has a different kind than the operation expects.
    #[error("expected {expected} at {path}, found {found}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Raised by programmatic steps.
    #[error("{0}")]
    Custom(String),
}

impl StepApplicationError {
    pub fn precondition(path: impl Into<String>, message: impl Into<String>) -> Self {
        StepApplicationError::Precondition {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Migration files could not be read or understood.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("could not read migrations from '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid migration file '{}': {message}", path.display())]
    InvalidFile { path: PathBuf, message: String },

    #[error(transparent)]
    Registration(#[from] RegistrationError),
}

/// Top-level error for engine construction, planning and loading.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    PathSyntax(#[from] PathSyntaxError),

    #[error(transparent)]
    Version(#[from] VersionError),

    #[error("no version found at {path} and no default version is configured")]
    MissingVersion { path: String },

    #[error("version path {path} must name exactly one location")]
    IndefiniteVersionPath { path: String },

    #[error(transparent)]
    Unreachable(#[from] UnreachableVersionError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Load(#[from] LoadError),
}
