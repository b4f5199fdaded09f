//! Compiled path expressions over document trees.
//!
//! Supported syntax: `$` (root), `.name`, `['name']`, `[n]` (negative counts
//! from the end), `.*` / `[*]`, and recursive descent with `..`. Filters,
//! slices and unions are rejected at compile time.
//!
//! A [`JsonPath`] is compiled once and evaluated any number of times. Evaluation
//! yields concrete [`Location`]s in document order: left-to-right, depth-first,
//! parents before their descendants.

mod parser;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PathSyntaxError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Selector {
    Name(String),
    Index(i64),
    Wildcard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Segment {
    pub(crate) selector: Selector,
    pub(crate) descendant: bool,
}

/// A compiled path expression.
///
/// Equality compares the compiled form, so `a.b` equals `$.a.b`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JsonPath {
    source: String,
    segments: Vec<Segment>,
}

impl PartialEq for JsonPath {
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments
    }
}

impl Eq for JsonPath {}

impl JsonPath {
    pub fn compile(expression: &str) -> Result<JsonPath, PathSyntaxError> {
        let segments = parser::parse(expression)?;
        Ok(JsonPath {
            source: expression.trim().to_string(),
            segments,
        })
    }

    /// The document root, `$`.
    pub fn root() -> JsonPath {
        JsonPath {
            source: "$".to_string(),
            segments: Vec::new(),
        }
    }

    /// The expression as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// True when the path can address at most one node.
    pub fn is_definite(&self) -> bool {
        self.segments
            .iter()
            .all(|s| !s.descendant && s.selector != Selector::Wildcard)
    }

    /// Split a definite path ending in a field name into the parent path and
    /// that name: `$.a.b` becomes (`$.a`, `b`).
    pub fn split_last(&self) -> Option<(JsonPath, &str)> {
        let (last, rest) = self.segments.split_last()?;
        if !self.is_definite() {
            return None;
        }
        match &last.selector {
            Selector::Name(name) => Some((JsonPath::from_segments(rest.to_vec()), name.as_str())),
            _ => None,
        }
    }

    /// Append a field name: joining `$.a` with `b` gives `$.a.b`.
    pub fn join(&self, key: &str) -> JsonPath {
        let mut segments = self.segments.clone();
        segments.push(Segment {
            selector: Selector::Name(key.to_string()),
            descendant: false,
        });
        JsonPath::from_segments(segments)
    }

    /// Every location in `root` matched by this path, in document order.
    pub fn locate(&self, root: &Value) -> Vec<Location> {
        let mut current = vec![Location::root()];
        for segment in &self.segments {
            let mut next = Vec::new();
            for location in &current {
                let Some(node) = location.resolve(root) else {
                    continue;
                };
                if segment.descendant {
                    descend(node, location, &segment.selector, &mut next);
                } else {
                    select(node, location, &segment.selector, &mut next);
                }
            }
            current = next;
        }

        if !self.is_definite() {
            sort_document_order(root, &mut current);
        }
        current
    }

    pub(crate) fn segments(&self) -> &[Segment] {
        &self.segments
    }

    fn from_segments(segments: Vec<Segment>) -> JsonPath {
        JsonPath {
            source: render(&segments),
            segments,
        }
    }
}

impl FromStr for JsonPath {
    type Err = PathSyntaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JsonPath::compile(s)
    }
}

impl TryFrom<String> for JsonPath {
    type Error = PathSyntaxError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        JsonPath::compile(&s)
    }
}

impl From<JsonPath> for String {
    fn from(path: JsonPath) -> Self {
        path.source
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// One step of a concrete location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathStep {
    Key(String),
    Index(usize),
}

/// The concrete address of one node in a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Location {
    steps: Vec<PathStep>,
}

impl Location {
    pub fn root() -> Location {
        Location { steps: Vec::new() }
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    pub fn is_root(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn child(&self, step: PathStep) -> Location {
        let mut steps = self.steps.clone();
        steps.push(step);
        Location { steps }
    }

    /// Split into the parent location and the final step.
    pub fn split_last(&self) -> Option<(Location, &PathStep)> {
        let (last, rest) = self.steps.split_last()?;
        Some((
            Location {
                steps: rest.to_vec(),
            },
            last,
        ))
    }

    pub fn resolve<'v>(&self, root: &'v Value) -> Option<&'v Value> {
        let mut node = root;
        for step in &self.steps {
            node = match (step, node) {
                (PathStep::Key(k), Value::Object(map)) => map.get(k)?,
                (PathStep::Index(i), Value::Array(items)) => items.get(*i)?,
                _ => return None,
            };
        }
        Some(node)
    }

    pub fn resolve_mut<'v>(&self, root: &'v mut Value) -> Option<&'v mut Value> {
        let mut node = root;
        for step in &self.steps {
            node = match (step, node) {
                (PathStep::Key(k), Value::Object(map)) => map.get_mut(k)?,
                (PathStep::Index(i), Value::Array(items)) => items.get_mut(*i)?,
                _ => return None,
            };
        }
        Some(node)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for step in &self.steps {
            match step {
                PathStep::Key(k) => write!(f, "['{}']", escape_quoted(k))?,
                PathStep::Index(i) => write!(f, "[{}]", i)?,
            }
        }
        Ok(())
    }
}

fn select(node: &Value, at: &Location, selector: &Selector, out: &mut Vec<Location>) {
    match (selector, node) {
        (Selector::Name(name), Value::Object(map)) => {
            if map.contains_key(name) {
                out.push(at.child(PathStep::Key(name.clone())));
            }
        }
        (Selector::Index(i), Value::Array(items)) => {
            let len = items.len() as i64;
            let idx = if *i < 0 { len + i } else { *i };
            if (0..len).contains(&idx) {
                out.push(at.child(PathStep::Index(idx as usize)));
            }
        }
        (Selector::Wildcard, Value::Object(map)) => {
            for key in map.keys() {
                out.push(at.child(PathStep::Key(key.clone())));
            }
        }
        (Selector::Wildcard, Value::Array(items)) => {
            for i in 0..items.len() {
                out.push(at.child(PathStep::Index(i)));
            }
        }
        _ => {}
    }
}

/// Apply `selector` to `node` and every node below it, pre-order.
fn descend(node: &Value, at: &Location, selector: &Selector, out: &mut Vec<Location>) {
    select(node, at, selector, out);
    match node {
        Value::Object(map) => {
            for (key, child) in map {
                descend(child, &at.child(PathStep::Key(key.clone())), selector, out);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                descend(child, &at.child(PathStep::Index(i)), selector, out);
            }
        }
        _ => {}
    }
}

/// Order locations by their position in the tree and drop duplicates.
fn sort_document_order(root: &Value, locations: &mut Vec<Location>) {
    let mut keyed: Vec<(Vec<usize>, Location)> = locations
        .drain(..)
        .map(|loc| (position(root, &loc), loc))
        .collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    keyed.dedup_by(|a, b| a.1 == b.1);
    locations.extend(keyed.into_iter().map(|(_, loc)| loc));
}

fn position(root: &Value, location: &Location) -> Vec<usize> {
    let mut out = Vec::with_capacity(location.steps.len());
    let mut node = root;
    for step in &location.steps {
        match (step, node) {
            (PathStep::Key(k), Value::Object(map)) => {
                out.push(map.keys().position(|key| key == k).unwrap_or(usize::MAX));
                match map.get(k) {
                    Some(next) => node = next,
                    None => break,
                }
            }
            (PathStep::Index(i), Value::Array(items)) => {
                out.push(*i);
                match items.get(*i) {
                    Some(next) => node = next,
                    None => break,
                }
            }
            _ => break,
        }
    }
    out
}

fn render(segments: &[Segment]) -> String {
    let mut out = String::from("$");
    for segment in segments {
        if segment.descendant {
            out.push_str("..");
        }
        match &segment.selector {
            Selector::Name(name) if is_plain_name(name) => {
                if !segment.descendant {
                    out.push('.');
                }
                out.push_str(name);
            }
            Selector::Name(name) => out.push_str(&format!("['{}']", escape_quoted(name))),
            Selector::Index(i) => out.push_str(&format!("[{}]", i)),
            Selector::Wildcard if segment.descendant => out.push('*'),
            Selector::Wildcard => out.push_str(".*"),
        }
    }
    out
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn escape_quoted(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}
