use serde::{Serialize, Deserialize};
use serde_json::{Map, Value};
use chrono::{DateTime, Utc};

/// Opaque key/value attachment passed through the store untouched.
pub type Metadata = Map<String, Value>;

/// Attributes produced by the upstream generator. Every field is optional;
/// anything the assessor does not read is kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consciousness_level: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub effects: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RecordContent {
    pub fn new() -> Self {
        RecordContent::default()
    }

    pub fn with_level(mut self, level: f64) -> Self {
        self.consciousness_level = Some(level);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_effects(mut self, effects: Vec<Value>) -> Self {
        self.effects = effects;
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }
}

/// Caller-side input to `Store::insert`. The id is assigned by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub id: String,
    pub content: RecordContent,
}

impl NewRecord {
    pub fn new(id: impl Into<String>, content: RecordContent) -> Self {
        NewRecord {
            id: id.into(),
            content,
        }
    }
}

/// A stored, scored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    #[serde(flatten)]
    pub content: RecordContent,
    pub quality_score: f64,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub metadata: Metadata,
    pub stored_at: DateTime<Utc>,
}

impl Record {
    pub fn kind(&self) -> Option<&str> {
        self.content.kind.as_deref()
    }
}
