//! Settings file for `configmigration`.
//!
//! Every key is optional; command-line flags override the file.
//!
//! # Example
//!
//! ```toml
//! migrations = "config/migrations"
//! target = "4"
//! version_path = "$.meta.schema_version"
//! default_version = "1"
//! create_missing = true
//! format = "yaml"
//! ```

use std::path::{Path, PathBuf};

use configmigration_core::{DirectorySource, DocumentFormat, EngineConfig, JsonPath, Version};
use serde::Deserialize;

use crate::RunArgs;

const DEFAULT_MIGRATIONS_DIR: &str = "migrations";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub migrations: Option<PathBuf>,
    pub target: Option<String>,
    pub version_path: Option<String>,
    pub default_version: Option<String>,
    #[serde(default)]
    pub create_missing: bool,
    pub format: Option<DocumentFormat>,
}

pub fn read_settings(path: &Path) -> Result<Settings, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;
    toml::from_str(&content).map_err(|e| format!("could not parse '{}': {}", path.display(), e))
}

/// Settings and flags merged into what a command needs.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub migrations: PathBuf,
    pub engine: EngineConfig,
    pub format: Option<DocumentFormat>,
}

impl Resolved {
    pub fn source(&self) -> DirectorySource {
        DirectorySource::new(&self.migrations)
    }
}

impl Settings {
    /// Apply command-line flags on top of the file. Versions and the version
    /// path are validated here, before any document is read.
    pub fn resolve(&self, args: &RunArgs) -> Result<Resolved, String> {
        let migrations = args
            .migrations
            .clone()
            .or_else(|| self.migrations.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MIGRATIONS_DIR));

        let mut engine = EngineConfig::new()
            .create_intermediate(args.create_missing || self.create_missing);

        if let Some(target) = args.target.as_ref().or(self.target.as_ref()) {
            engine = engine.target(parse_version("target", target)?);
        }
        if let Some(default) = args
            .default_version
            .as_ref()
            .or(self.default_version.as_ref())
        {
            engine = engine.default_version(parse_version("default version", default)?);
        }
        if let Some(path) = args.version_path.as_ref().or(self.version_path.as_ref()) {
            let path = JsonPath::compile(path).map_err(|e| e.to_string())?;
            if !path.is_definite() {
                return Err(format!(
                    "invalid version path '{}': must name exactly one location",
                    path
                ));
            }
            engine = engine.version_path(path);
        }

        Ok(Resolved {
            migrations,
            engine,
            format: self.format,
        })
    }
}

fn parse_version(what: &str, text: &str) -> Result<Version, String> {
    Version::parse(text).map_err(|e| format!("invalid {}: {}", what, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_settings_file() {
        let settings: Settings = toml::from_str(
            r#"
migrations = "db/migrations"
target = "3"
version_path = "$.meta.schema"
default_version = "1"
create_missing = true
format = "yaml"
"#,
        )
        .unwrap();
        assert_eq!(settings.migrations, Some(PathBuf::from("db/migrations")));
        assert_eq!(settings.format, Some(DocumentFormat::Yaml));
        assert!(settings.create_missing);
    }

    #[test]
    fn flags_override_file() {
        let settings = Settings {
            migrations: Some(PathBuf::from("from-file")),
            target: Some("2".to_string()),
            ..Settings::default()
        };
        let args = RunArgs {
            migrations: Some(PathBuf::from("from-flag")),
            target: Some("5".to_string()),
            ..RunArgs::default()
        };
        let resolved = settings.resolve(&args).unwrap();
        assert_eq!(resolved.migrations, PathBuf::from("from-flag"));
        assert_eq!(resolved.engine.target, Some(Version::from(5u64)));
    }

    #[test]
    fn defaults_apply_without_file_or_flags() {
        let resolved = Settings::default().resolve(&RunArgs::default()).unwrap();
        assert_eq!(resolved.migrations, PathBuf::from("migrations"));
        assert_eq!(resolved.engine.version_path.as_str(), "$.version");
        assert!(!resolved.engine.create_intermediate);
    }

    #[test]
    fn bad_values_are_rejected_up_front() {
        let args = RunArgs {
            version_path: Some("$.a[?(@.b)]".to_string()),
            ..RunArgs::default()
        };
        assert!(Settings::default().resolve(&args).is_err());

        let args = RunArgs {
            target: Some("latest".to_string()),
            ..RunArgs::default()
        };
        let err = Settings::default().resolve(&args).unwrap_err();
        assert!(err.starts_with("invalid target"));
    }

    #[test]
    fn wildcard_version_path_is_rejected() {
        for expr in ["$..version", "$.*.v", "$.items[*].version"] {
            let settings = Settings {
                version_path: Some(expr.to_string()),
                ..Settings::default()
            };
            let err = settings.resolve(&RunArgs::default()).unwrap_err();
            assert!(err.contains("exactly one location"), "{expr}: {err}");
        }
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<Settings>("colour = \"blue\"").is_err());
    }
}
