//! Core data types for the retrieval pipeline.
//!
//! Dataset rows arrive as loosely-typed records ([`Record`]); the normalizer
//! turns each into chunked document text plus a [`Metadata`] entry. Retrieval
//! returns [`Retrieved`] hits filtered by a [`MetadataFilter`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Default dataset label when none is configured.
pub const DEFAULT_DATASET: &str = "default";
/// Default person scope assigned to documents without an explicit person column.
pub const DEFAULT_PERSON: &str = "student_1";

/// A single scalar cell of a dataset record.
///
/// Tabular data is heterogeneous: CSV cells may be empty, numeric, or free
/// text, and JSON rows carry native types. Modeled as a closed variant rather
/// than an untyped string bag so filters compare values exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Num(n) => Some(*n),
            _ => None,
        }
    }

    /// True for null, NaN, empty strings, and pandas-style `"nan"` cells.
    pub fn is_missing(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Num(n) => n.is_nan(),
            FieldValue::Str(s) => {
                let t = s.trim();
                t.is_empty() || t == "nan"
            }
            FieldValue::Bool(_) => false,
        }
    }

    /// Render the value as display text (used for person/lesson columns and
    /// synthesized sentences).
    pub fn render(&self) -> String {
        match self {
            FieldValue::Null => String::new(),
            FieldValue::Bool(b) => b.to_string(),
            FieldValue::Num(n) => format!("{}", n),
            FieldValue::Str(s) => s.clone(),
        }
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => FieldValue::Null,
            serde_json::Value::Bool(b) => FieldValue::Bool(b),
            serde_json::Value::Number(n) => FieldValue::Num(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => FieldValue::Str(s),
            // Nested structures are flattened to their JSON text; dataset rows
            // are expected to be scalar-valued.
            other => FieldValue::Str(other.to_string()),
        }
    }
}

/// One row of a dataset: an open string-keyed mapping of scalar cells.
pub type Record = BTreeMap<String, FieldValue>;

/// Per-document metadata, aligned positionally with the document array and
/// the vector index.
///
/// The reserved keys are always present (`lesson_id` may be absent when no
/// heuristic matched); everything else from the source record is carried in
/// `extra` and serialized inline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub dataset_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lesson_id: Option<String>,
    pub person_id: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, FieldValue>,
}

impl Metadata {
    pub fn new(dataset_name: impl Into<String>) -> Self {
        Self {
            dataset_name: dataset_name.into(),
            lesson_id: None,
            person_id: DEFAULT_PERSON.to_string(),
            extra: BTreeMap::new(),
        }
    }

    /// True when every active predicate of `filter` matches exactly.
    pub fn matches(&self, filter: &MetadataFilter) -> bool {
        if let Some(ref ds) = filter.dataset_name {
            if &self.dataset_name != ds {
                return false;
            }
        }
        if let Some(ref lesson) = filter.lesson_id {
            if self.lesson_id.as_deref() != Some(lesson.as_str()) {
                return false;
            }
        }
        if let Some(ref person) = filter.person_id {
            if &self.person_id != person {
                return false;
            }
        }
        filter
            .extra
            .iter()
            .all(|(key, want)| self.extra.get(key) == Some(want))
    }
}

/// Conjunction of exact-match predicates applied after nearest-neighbor
/// search. An empty filter admits everything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetadataFilter {
    pub dataset_name: Option<String>,
    pub lesson_id: Option<String>,
    pub person_id: Option<String>,
    #[serde(default)]
    pub extra: BTreeMap<String, FieldValue>,
}

impl MetadataFilter {
    pub fn is_empty(&self) -> bool {
        self.dataset_name.is_none()
            && self.lesson_id.is_none()
            && self.person_id.is_none()
            && self.extra.is_empty()
    }
}

/// A retrieval hit: document text, its metadata, and the squared Euclidean
/// distance from the query embedding. Smaller distance = better match.
#[derive(Debug, Clone, Serialize)]
pub struct Retrieved {
    pub text: String,
    pub metadata: Metadata,
    pub distance: f32,
}
