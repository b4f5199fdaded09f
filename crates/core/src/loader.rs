//! Loading migration steps from outside the program.
//!
//! [`DirectorySource`] reads a directory of migration files named
//! `V<version>__<description>.<ext>`, where `<version>` uses `_` or `.` as
//! the component separator and `<ext>` is `yaml`, `yml` or `json`. Files that
//! do not follow the pattern are ignored.
//!
//! A file holds either a bare list of operations or a mapping:
//!
//! ```yaml
//! from: 1            # optional, defaults to the previous file's version
//! description: move the port under server
//! when: { type: exists, path: $.port }
//! operations:
//!   - { type: delete, path: $.port }
//! ```
//!
//! Every path in a file is compiled while the file is loaded, so a malformed
//! path is reported here and never during a run.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::document::{Document, DocumentFormat};
use crate::error::LoadError;
use crate::migration::{Condition, DeclarativeStep, MigrationStep, Operation};
use crate::version::Version;

/// Anything that can supply migration steps.
pub trait MigrationSource {
    fn load(&self) -> Result<Vec<Arc<dyn MigrationStep>>, LoadError>;
}

/// Steps assembled in code.
#[derive(Debug, Default, Clone)]
pub struct StaticSource {
    steps: Vec<Arc<dyn MigrationStep>>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, step: impl MigrationStep + 'static) -> Self {
        self.steps.push(Arc::new(step));
        self
    }
}

impl MigrationSource for StaticSource {
    fn load(&self) -> Result<Vec<Arc<dyn MigrationStep>>, LoadError> {
        Ok(self.steps.clone())
    }
}

/// A directory of `V<version>__<description>.<ext>` files.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
    base_version: Version,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MigrationBody {
    #[serde(default)]
    from: Option<Version>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    when: Option<Condition>,
    #[serde(default)]
    operations: Vec<Operation>,
}

struct MigrationFile {
    path: PathBuf,
    version: Version,
    description: String,
    format: DocumentFormat,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DirectorySource {
            dir: dir.into(),
            base_version: Version::from(0u64),
        }
    }

    /// Version the first file migrates from when it does not name one.
    pub fn base_version(mut self, version: impl Into<Version>) -> Self {
        self.base_version = version.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn scan(&self) -> Result<Vec<MigrationFile>, LoadError> {
        let io_err = |source| LoadError::Io {
            path: self.dir.clone(),
            source,
        };
        let pattern = FILE_PATTERN.as_ref().map_err(|e| LoadError::InvalidFile {
            path: self.dir.clone(),
            message: e.to_string(),
        })?;

        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(caps) = pattern.captures(name) else {
                tracing::debug!(file = %path.display(), "ignoring non-migration file");
                continue;
            };

            let version = Version::parse(&caps[1]).map_err(|e| LoadError::InvalidFile {
                path: path.clone(),
                message: format!("file name does not start with a valid version: {}", e),
            })?;
            let description = caps[2].replace('_', " ").trim().to_string();
            let format = if &caps[3] == "json" {
                DocumentFormat::Json
            } else {
                DocumentFormat::Yaml
            };
            files.push(MigrationFile {
                path,
                version,
                description,
                format,
            });
        }

        files.sort_by(|a, b| a.version.cmp(&b.version));
        for pair in files.windows(2) {
            if pair[0].version == pair[1].version {
                return Err(LoadError::InvalidFile {
                    path: pair[1].path.clone(),
                    message: format!(
                        "version {} is also used by '{}'",
                        pair[1].version,
                        pair[0].path.display()
                    ),
                });
            }
        }
        Ok(files)
    }
}

impl MigrationSource for DirectorySource {
    fn load(&self) -> Result<Vec<Arc<dyn MigrationStep>>, LoadError> {
        let mut steps: Vec<Arc<dyn MigrationStep>> = Vec::new();
        let mut previous = self.base_version.clone();
        for file in self.scan()? {
            let step = read_step(&file, &previous)?;
            tracing::debug!(
                file = %file.path.display(),
                step = %step.id(),
                operations = step.operations.len(),
                "loaded migration file"
            );
            previous = file.version.clone();
            steps.push(Arc::new(step));
        }
        Ok(steps)
    }
}

/// `V<version>__<description>.<ext>`; version components are separated by a
/// single `_` or `.`.
static FILE_PATTERN: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^V([0-9]+(?:[_.][0-9]+)*)__(.+)\.(yaml|yml|json)$"));

fn read_step(file: &MigrationFile, previous: &Version) -> Result<DeclarativeStep, LoadError> {
    let invalid = |message: String| LoadError::InvalidFile {
        path: file.path.clone(),
        message,
    };

    let text = fs::read_to_string(&file.path).map_err(|source| LoadError::Io {
        path: file.path.clone(),
        source,
    })?;
    let value = Document::parse(&text, file.format)
        .map_err(|e| invalid(e.to_string()))?
        .into_value();

    let body = match value {
        Value::Null => MigrationBody {
            from: None,
            description: None,
            when: None,
            operations: Vec::new(),
        },
        Value::Array(_) => MigrationBody {
            from: None,
            description: None,
            when: None,
            operations: serde_json::from_value(value).map_err(|e| invalid(e.to_string()))?,
        },
        Value::Object(_) => serde_json::from_value(value).map_err(|e| invalid(e.to_string()))?,
        _ => {
            return Err(invalid(
                "expected a list of operations or a mapping with 'operations'".to_string(),
            ))
        }
    };

    let from = body.from.unwrap_or_else(|| previous.clone());
    let mut step = DeclarativeStep::new(from, file.version.clone(), body.operations)
        .described(body.description.unwrap_or_else(|| file.description.clone()));
    step.when = body.when;
    Ok(step)
}
