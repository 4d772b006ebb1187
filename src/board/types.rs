use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::priority::Priority;
use crate::remote::StoreError;

/// A pipeline column. Positions are unique and totally order the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub id: String,
    pub name: String,
    pub color: String,
    pub position: u32,
}

/// Check the stage invariant: ids and positions must be unique.
pub fn validate_stages(stages: &[Stage]) -> Result<(), StoreError> {
    let mut seen_ids = std::collections::HashSet::new();
    let mut seen_positions = std::collections::HashSet::new();
    for stage in stages {
        if !seen_ids.insert(stage.id.as_str()) {
            return Err(StoreError::Validation(format!(
                "duplicate stage id {:?}",
                stage.id
            )));
        }
        if !seen_positions.insert(stage.position) {
            return Err(StoreError::Validation(format!(
                "stages {:?} share position {}",
                stage.id, stage.position
            )));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Number,
    Date,
    Reference,
}

/// Tagged value for a free-form named field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Date(NaiveDate),
    Reference(String),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Text(_) => FieldKind::Text,
            FieldValue::Number(_) => FieldKind::Number,
            FieldValue::Date(_) => FieldKind::Date,
            FieldValue::Reference(_) => FieldKind::Reference,
        }
    }

    /// Human-readable rendering, used by templates and CSV export.
    pub fn render(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            FieldValue::Date(d) => d.to_string(),
            FieldValue::Reference(r) => r.clone(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// Declared field schema entry; records are validated against these rather
/// than left fully dynamic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub key: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
}

/// Validate a record's field map against the declared schema.
pub fn validate_fields(
    schema: &[FieldDef],
    fields: &BTreeMap<String, FieldValue>,
) -> Result<(), StoreError> {
    for def in schema {
        match fields.get(&def.key) {
            Some(value) if value.kind() != def.kind => {
                return Err(StoreError::Validation(format!(
                    "field {:?} expects {:?}, got {:?}",
                    def.key,
                    def.kind,
                    value.kind()
                )));
            }
            None if def.required => {
                return Err(StoreError::Validation(format!(
                    "missing required field {:?}",
                    def.key
                )));
            }
            _ => {}
        }
    }
    for key in fields.keys() {
        if !schema.iter().any(|def| &def.key == key) {
            return Err(StoreError::Validation(format!(
                "unknown field {key:?} not declared in the schema"
            )));
        }
    }
    Ok(())
}

/// A startup card on the deal board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Startup {
    pub id: String,
    /// Stage reference; `None` is a data-integrity defect repaired by
    /// the bulk-repair operation.
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub labels: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Startup {
    /// Named-field lookup with built-ins: `id`, `stage`, `priority`,
    /// `labels`, then the free-form field map.
    pub fn field_text(&self, field: &str) -> Option<String> {
        match field {
            "id" => Some(self.id.clone()),
            "stage" => self.stage.clone(),
            "priority" => Some(self.priority.to_string()),
            "labels" => Some(self.labels.join(",")),
            _ => self.fields.get(field).map(FieldValue::render),
        }
    }

    pub fn field_number(&self, field: &str) -> Option<f64> {
        self.fields.get(field).and_then(FieldValue::as_number)
    }
}

/// Fields of a new record; the id and timestamps are assigned on create.
#[derive(Debug, Clone, Default)]
pub struct NewStartup {
    pub stage: Option<String>,
    pub fields: BTreeMap<String, FieldValue>,
    pub priority: Priority,
    pub labels: Vec<String>,
}

/// Partial update; unset members leave the record untouched.
#[derive(Debug, Clone, Default)]
pub struct StartupUpdate {
    pub stage: Option<String>,
    pub priority: Option<Priority>,
    pub labels: Option<Vec<String>>,
    pub fields: BTreeMap<String, FieldValue>,
}

impl StartupUpdate {
    pub fn move_to(stage: impl Into<String>) -> Self {
        Self {
            stage: Some(stage.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stage.is_none()
            && self.priority.is_none()
            && self.labels.is_none()
            && self.fields.is_empty()
    }
}
