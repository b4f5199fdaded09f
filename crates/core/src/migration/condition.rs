//! Step preconditions.
//!
//! A condition is evaluated against the document as it stands when the step
//! is reached, after every earlier step has been committed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::Document;
use crate::path::JsonPath;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Condition {
    /// `path` matches at least one value.
    Exists { path: JsonPath },
    /// `path` matches nothing.
    Absent { path: JsonPath },
    /// Some value matched by `path` equals `value`.
    Equals { path: JsonPath, value: Value },
    All { of: Vec<Condition> },
    Any { of: Vec<Condition> },
    Not { condition: Box<Condition> },
}

impl Condition {
    pub fn holds(&self, doc: &Document) -> bool {
        match self {
            Condition::Exists { path } => doc.exists(path),
            Condition::Absent { path } => !doc.exists(path),
            Condition::Equals { path, value } => doc.query(path).into_iter().any(|v| v == value),
            Condition::All { of } => of.iter().all(|c| c.holds(doc)),
            Condition::Any { of } => of.iter().any(|c| c.holds(doc)),
            Condition::Not { condition } => !condition.holds(doc),
        }
    }
}
