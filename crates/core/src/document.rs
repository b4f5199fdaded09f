//! In-memory configuration documents.
//!
//! A [`Document`] wraps a `serde_json::Value` tree whose mappings keep their
//! insertion order. Reads through a path never fail: a path that matches
//! nothing is simply absent. Writes fail with [`StructuralError`] instead of
//! changing the kind of an existing node.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ParseError, SerializeError, StructuralError};
use crate::path::{JsonPath, Location, PathStep, Selector};

/// Text format a document is read from and written back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    #[default]
    Json,
    Yaml,
}

impl DocumentFormat {
    /// Pick a format from a file extension (`.json`, `.yaml`, `.yml`).
    pub fn from_path(path: &Path) -> Option<DocumentFormat> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Some(DocumentFormat::Json),
            Some("yaml") | Some("yml") => Some(DocumentFormat::Yaml),
            _ => None,
        }
    }
}

/// Options controlling how writes treat missing parents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteOptions {
    /// Create missing intermediate mappings instead of failing.
    pub create_intermediate: bool,
}

impl WriteOptions {
    pub fn creating() -> Self {
        WriteOptions {
            create_intermediate: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    root: Value,
    format: DocumentFormat,
}

impl Document {
    pub fn parse(text: &str, format: DocumentFormat) -> Result<Document, ParseError> {
        let root = match format {
            DocumentFormat::Json => serde_json::from_str(text).map_err(ParseError::Json)?,
            DocumentFormat::Yaml => serde_yaml::from_str(text).map_err(ParseError::Yaml)?,
        };
        Ok(Document { root, format })
    }

    pub fn from_value(root: Value) -> Document {
        Document {
            root,
            format: DocumentFormat::Json,
        }
    }

    pub fn with_format(mut self, format: DocumentFormat) -> Document {
        self.format = format;
        self
    }

    pub fn value(&self) -> &Value {
        &self.root
    }

    pub fn into_value(self) -> Value {
        self.root
    }

    pub fn format(&self) -> DocumentFormat {
        self.format
    }

    /// Render in the document's own format.
    pub fn serialize(&self) -> Result<String, SerializeError> {
        self.serialize_as(self.format)
    }

    /// Pretty-printed JSON or YAML.
    pub fn serialize_as(&self, format: DocumentFormat) -> Result<String, SerializeError> {
        match format {
            DocumentFormat::Json => {
                serde_json::to_string_pretty(&self.root).map_err(SerializeError::Json)
            }
            DocumentFormat::Yaml => serde_yaml::to_string(&self.root).map_err(SerializeError::Yaml),
        }
    }

    /// Single-line JSON with keys in document order.
    pub fn to_compact_json(&self) -> String {
        self.root.to_string()
    }

    // ── Reads ────────────────────────────────────────────────────────────

    /// First value matched by `path`, or `None` when the path matches nothing.
    pub fn get(&self, path: &JsonPath) -> Option<&Value> {
        path.locate(&self.root)
            .first()
            .and_then(|loc| loc.resolve(&self.root))
    }

    /// All values matched by `path`, in document order.
    pub fn query(&self, path: &JsonPath) -> Vec<&Value> {
        path.locate(&self.root)
            .iter()
            .filter_map(|loc| loc.resolve(&self.root))
            .collect()
    }

    pub fn locate(&self, path: &JsonPath) -> Vec<Location> {
        path.locate(&self.root)
    }

    pub fn exists(&self, path: &JsonPath) -> bool {
        !path.locate(&self.root).is_empty()
    }

    pub fn get_at(&self, location: &Location) -> Option<&Value> {
        location.resolve(&self.root)
    }

    // ── Writes ───────────────────────────────────────────────────────────

    /// Replace every value matched by `path`. When nothing matches and the
    /// path is definite, the final field is inserted into its parent mapping.
    ///
    /// Returns the number of values written.
    pub fn set(
        &mut self,
        path: &JsonPath,
        value: Value,
        options: WriteOptions,
    ) -> Result<usize, StructuralError> {
        let locations = path.locate(&self.root);
        if !locations.is_empty() {
            let mut written = 0;
            for location in &locations {
                if let Some(slot) = location.resolve_mut(&mut self.root) {
                    *slot = value.clone();
                    written += 1;
                }
            }
            return Ok(written);
        }

        if !path.is_definite() {
            return Ok(0);
        }
        let Some((parent, key)) = path.split_last() else {
            return Err(StructuralError::new(
                path.as_str(),
                "only mapping fields can be created; sequence elements must already exist",
            ));
        };
        self.insert(&parent, key, value, options)
    }

    /// Add `key` to every mapping matched by `parent`.
    ///
    /// A definite `parent` that does not exist is created when
    /// `options.create_intermediate` is set and is a [`StructuralError`]
    /// otherwise. Fails without writing anything when a target is not a
    /// mapping or already has `key`.
    pub fn insert(
        &mut self,
        parent: &JsonPath,
        key: &str,
        value: Value,
        options: WriteOptions,
    ) -> Result<usize, StructuralError> {
        let mut targets = parent.locate(&self.root);
        if targets.is_empty() {
            if !parent.is_definite() {
                return Ok(0);
            }
            if !options.create_intermediate {
                return Err(StructuralError::new(
                    parent.as_str(),
                    "parent mapping does not exist",
                ));
            }
            targets.push(self.ensure_mappings(parent)?);
        }

        for target in &targets {
            match target.resolve(&self.root) {
                Some(Value::Object(map)) if map.contains_key(key) => {
                    return Err(StructuralError::new(
                        target.child(PathStep::Key(key.to_string())).to_string(),
                        "field already exists",
                    ));
                }
                Some(Value::Object(_)) => {}
                Some(other) => {
                    return Err(StructuralError::new(
                        target.to_string(),
                        format!("expected a mapping, found {}", kind_name(other)),
                    ));
                }
                None => {}
            }
        }

        let mut written = 0;
        for target in &targets {
            if let Some(Value::Object(map)) = target.resolve_mut(&mut self.root) {
                map.insert(key.to_string(), value.clone());
                written += 1;
            }
        }
        Ok(written)
    }

    /// Push `value` onto every sequence matched by `path`.
    pub fn append(&mut self, path: &JsonPath, value: Value) -> Result<usize, StructuralError> {
        let targets = path.locate(&self.root);
        for target in &targets {
            if let Some(other) = target.resolve(&self.root).filter(|v| !v.is_array()) {
                return Err(StructuralError::new(
                    target.to_string(),
                    format!("expected a sequence, found {}", kind_name(other)),
                ));
            }
        }

        let mut written = 0;
        for target in &targets {
            if let Some(Value::Array(items)) = target.resolve_mut(&mut self.root) {
                items.push(value.clone());
                written += 1;
            }
        }
        Ok(written)
    }

    /// Remove every value matched by `path`. The root itself is never removed.
    pub fn delete(&mut self, path: &JsonPath) -> usize {
        let mut removed = 0;
        // Reverse document order keeps the remaining sequence indices valid.
        for location in path.locate(&self.root).iter().rev() {
            let Some((parent, last)) = location.split_last() else {
                continue;
            };
            let gone = match (parent.resolve_mut(&mut self.root), last) {
                (Some(Value::Object(map)), PathStep::Key(k)) => map.shift_remove(k).is_some(),
                (Some(Value::Array(items)), PathStep::Index(i)) if *i < items.len() => {
                    items.remove(*i);
                    true
                }
                _ => false,
            };
            if gone {
                removed += 1;
            }
        }
        removed
    }

    /// Rename `old` to `new` in every mapping matched by `path`, keeping the
    /// field's position. Mappings without `old` are left alone.
    pub fn rename_key(
        &mut self,
        path: &JsonPath,
        old: &str,
        new: &str,
    ) -> Result<usize, StructuralError> {
        let targets = path.locate(&self.root);
        for target in &targets {
            match target.resolve(&self.root) {
                Some(Value::Object(map)) if map.contains_key(old) && map.contains_key(new) => {
                    return Err(StructuralError::new(
                        target.child(PathStep::Key(new.to_string())).to_string(),
                        "field already exists",
                    ));
                }
                Some(Value::Object(_)) | None => {}
                Some(other) => {
                    return Err(StructuralError::new(
                        target.to_string(),
                        format!("expected a mapping, found {}", kind_name(other)),
                    ));
                }
            }
        }

        let mut renamed = 0;
        for target in &targets {
            if let Some(Value::Object(map)) = target.resolve_mut(&mut self.root) {
                if !map.contains_key(old) {
                    continue;
                }
                let entries = std::mem::take(map);
                for (k, v) in entries {
                    if k == old {
                        map.insert(new.to_string(), v);
                    } else {
                        map.insert(k, v);
                    }
                }
                renamed += 1;
            }
        }
        Ok(renamed)
    }

    /// Walk a definite path, creating empty mappings for missing fields.
    /// Nothing is created unless the whole path can be.
    fn ensure_mappings(&mut self, path: &JsonPath) -> Result<Location, StructuralError> {
        let mut root = self.root.clone();
        let location = create_mappings(&mut root, path)?;
        self.root = root;
        Ok(location)
    }
}

fn create_mappings(root: &mut Value, path: &JsonPath) -> Result<Location, StructuralError> {
    let mut location = Location::root();
    let mut node = root;
    for segment in path.segments() {
        match (&segment.selector, node) {
            (Selector::Name(name), Value::Object(map)) => {
                location = location.child(PathStep::Key(name.clone()));
                node = map
                    .entry(name.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
            }
            (Selector::Index(i), Value::Array(items)) => {
                let len = items.len() as i64;
                let idx = if *i < 0 { len + i } else { *i };
                if !(0..len).contains(&idx) {
                    return Err(StructuralError::new(
                        location.to_string(),
                        format!("sequence has no element {}", i),
                    ));
                }
                location = location.child(PathStep::Index(idx as usize));
                node = &mut items[idx as usize];
            }
            (Selector::Index(_), other) => {
                return Err(StructuralError::new(
                    location.to_string(),
                    format!("expected a sequence, found {}", kind_name(other)),
                ));
            }
            (_, other) => {
                return Err(StructuralError::new(
                    location.to_string(),
                    format!("cannot create a field inside {}", kind_name(other)),
                ));
            }
        }
    }
    Ok(location)
}

/// Human-readable name of a node kind.
pub(crate) fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}
