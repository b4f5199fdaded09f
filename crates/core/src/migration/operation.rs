//! Declarative document operations used by migration files.
//!
//! Each operation checks its preconditions against the current document and
//! fails with a [`StepApplicationError`] when they do not hold; nothing is
//! silently ignored.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::{kind_name, Document, WriteOptions};
use crate::error::StepApplicationError;
use crate::path::JsonPath;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Operation {
    /// Replace the value at every match of `path`.
    Set { path: JsonPath, value: Value },

    /// With `key`: add a field to every mapping at `path`.
    /// Without `key`: append `value` to every sequence at `path`.
    Put {
        path: JsonPath,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<String>,
        value: Value,
    },

    /// Rename a field of every mapping at `path`.
    Rename {
        path: JsonPath,
        #[serde(alias = "oldKey")]
        old_key: String,
        #[serde(alias = "newKey")]
        new_key: String,
    },

    /// Remove every match of `path`.
    Delete { path: JsonPath },
}

impl Operation {
    pub fn apply(
        &self,
        doc: &mut Document,
        options: WriteOptions,
    ) -> Result<(), StepApplicationError> {
        match self {
            Operation::Set { path, value } => {
                require_exists(doc, path, "does not exist and therefore can't be updated")?;
                doc.set(path, value.clone(), options)?;
            }
            Operation::Put {
                path,
                key: Some(key),
                value,
            } => {
                if !doc.exists(path) && !path.is_definite() {
                    return Err(StepApplicationError::precondition(
                        path.as_str(),
                        "does not exist and can not be added to",
                    ));
                }
                let target = path.join(key);
                if doc.exists(&target) {
                    return Err(StepApplicationError::precondition(
                        target.as_str(),
                        "already exists and can not be added",
                    ));
                }
                doc.insert(path, key, value.clone(), options)?;
            }
            Operation::Put {
                path,
                key: None,
                value,
            } => {
                require_exists(doc, path, "does not exist and can not be added to")?;
                for found in doc.query(path) {
                    if !found.is_array() {
                        return Err(StepApplicationError::TypeMismatch {
                            path: path.as_str().to_string(),
                            expected: "sequence",
                            found: kind_name(found),
                        });
                    }
                }
                doc.append(path, value.clone())?;
            }
            Operation::Rename {
                path,
                old_key,
                new_key,
            } => {
                require_exists(doc, path, "does not exist and can not be renamed")?;
                for found in doc.query(path) {
                    if !found.is_object() {
                        return Err(StepApplicationError::TypeMismatch {
                            path: path.as_str().to_string(),
                            expected: "mapping",
                            found: kind_name(found),
                        });
                    }
                }
                let old_path = path.join(old_key);
                let new_path = path.join(new_key);
                require_exists(doc, &old_path, "does not exist and can not be renamed")?;
                if doc.exists(&new_path) {
                    return Err(StepApplicationError::precondition(
                        new_path.as_str(),
                        "exists and can not be used to be renamed to",
                    ));
                }
                doc.rename_key(path, old_key, new_key)?;
            }
            Operation::Delete { path } => {
                require_exists(doc, path, "does not exist and therefore can't be deleted")?;
                if doc.delete(path) == 0 {
                    return Err(StepApplicationError::precondition(
                        path.as_str(),
                        "is the document root and can't be deleted",
                    ));
                }
            }
        }
        Ok(())
    }
}

fn require_exists(
    doc: &Document,
    path: &JsonPath,
    message: &str,
) -> Result<(), StepApplicationError> {
    if doc.exists(path) {
        Ok(())
    } else {
        Err(StepApplicationError::precondition(path.as_str(), message))
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Set { path, value } => write!(f, "set {} = {}", path, value),
            Operation::Put {
                path,
                key: Some(key),
                value,
            } => write!(f, "put {}.{} = {}", path, key, value),
            Operation::Put {
                path,
                key: None,
                value,
            } => write!(f, "append {} <- {}", path, value),
            Operation::Rename {
                path,
                old_key,
                new_key,
            } => write!(f, "rename {} {} -> {}", path, old_key, new_key),
            Operation::Delete { path } => write!(f, "delete {}", path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StructuralError;
    use serde_json::json;

    fn op(value: Value) -> Operation {
        serde_json::from_value(value).unwrap()
    }

    fn run(doc: Value, operation: Value) -> Result<Value, StepApplicationError> {
        let mut doc = Document::from_value(doc);
        op(operation).apply(&mut doc, WriteOptions::default())?;
        Ok(doc.into_value())
    }

    #[test]
    fn deserializes_tagged_operations() {
        let parsed = op(json!({"type": "rename", "path": "$", "oldKey": "a", "newKey": "b"}));
        assert_eq!(
            parsed,
            Operation::Rename {
                path: JsonPath::root(),
                old_key: "a".to_string(),
                new_key: "b".to_string(),
            }
        );
        assert!(serde_json::from_value::<Operation>(json!({"type": "explode", "path": "$"})).is_err());
        assert!(serde_json::from_value::<Operation>(json!({"type": "delete", "path": "$["})).is_err());
    }

    #[test]
    fn set_requires_existing_value() {
        assert_eq!(
            run(json!({"a": 1}), json!({"type": "set", "path": "$.a", "value": 2})).unwrap(),
            json!({"a": 2})
        );
        let err = run(json!({}), json!({"type": "set", "path": "$.a", "value": 2})).unwrap_err();
        assert!(matches!(err, StepApplicationError::Precondition { .. }));
    }

    #[test]
    fn put_with_key_adds_field() {
        assert_eq!(
            run(
                json!({"server": {"port": 1}}),
                json!({"type": "put", "path": "$.server", "key": "host", "value": "h"})
            )
            .unwrap(),
            json!({"server": {"port": 1, "host": "h"}})
        );
    }

    #[test]
    fn put_refuses_existing_field() {
        let err = run(
            json!({"server": {"host": "x"}}),
            json!({"type": "put", "path": "$.server", "key": "host", "value": "h"}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn put_into_missing_parent_is_structural() {
        let err = run(
            json!({}),
            json!({"type": "put", "path": "$.server", "key": "host", "value": "h"}),
        )
        .unwrap_err();
        assert_eq!(
            err,
            StepApplicationError::Structural(StructuralError::new(
                "$.server",
                "parent mapping does not exist"
            ))
        );

        let mut doc = Document::from_value(json!({}));
        op(json!({"type": "put", "path": "$.server", "key": "host", "value": "h"}))
            .apply(&mut doc, WriteOptions::creating())
            .unwrap();
        assert_eq!(doc.value(), &json!({"server": {"host": "h"}}));
    }

    #[test]
    fn put_without_key_appends() {
        assert_eq!(
            run(
                json!({"list": ["a"]}),
                json!({"type": "put", "path": "$.list", "value": "b"})
            )
            .unwrap(),
            json!({"list": ["a", "b"]})
        );
        let err = run(
            json!({"list": {}}),
            json!({"type": "put", "path": "$.list", "value": "b"}),
        )
        .unwrap_err();
        assert!(matches!(err, StepApplicationError::TypeMismatch { .. }));
    }

    #[test]
    fn rename_checks_both_keys() {
        assert_eq!(
            run(
                json!({"version": 1, "name": "x"}),
                json!({"type": "rename", "path": "$", "old_key": "name", "new_key": "title"})
            )
            .unwrap(),
            json!({"version": 1, "title": "x"})
        );
        assert!(run(
            json!({"a": 1}),
            json!({"type": "rename", "path": "$", "old_key": "missing", "new_key": "b"})
        )
        .is_err());
        assert!(run(
            json!({"a": 1, "b": 2}),
            json!({"type": "rename", "path": "$", "old_key": "a", "new_key": "b"})
        )
        .is_err());
        let err = run(
            json!({"a": 1}),
            json!({"type": "rename", "path": "$.a", "old_key": "x", "new_key": "y"}),
        )
        .unwrap_err();
        assert!(matches!(err, StepApplicationError::TypeMismatch { .. }));
    }

    #[test]
    fn delete_requires_existing_value() {
        assert_eq!(
            run(json!({"a": 1, "b": 2}), json!({"type": "delete", "path": "$.a"})).unwrap(),
            json!({"b": 2})
        );
        assert!(run(json!({}), json!({"type": "delete", "path": "$.a"})).is_err());
    }

    #[test]
    fn deleting_the_root_fails() {
        let mut doc = Document::from_value(json!({"a": 1}));
        let err = Operation::Delete {
            path: JsonPath::root(),
        }
        .apply(&mut doc, WriteOptions::default())
        .unwrap_err();
        assert!(matches!(err, StepApplicationError::Precondition { .. }));
        assert_eq!(doc.value(), &json!({"a": 1}));
    }

    #[test]
    fn display_is_readable() {
        assert_eq!(
            op(json!({"type": "delete", "path": "$.a"})).to_string(),
            "delete $.a"
        );
    }
}
