use serde::{Deserialize, Serialize};

use crate::board::FieldValue;
use crate::priority::Priority;

/// A stored automation rule: all conditions must hold for the actions to
/// fire. Rules are independent; evaluation order is storage order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
    pub active: bool,
}

/// One condition, one variant per operator. Field references cover the
/// built-ins (`stage`, `priority`, `labels`) and the free-form field map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Condition {
    Equals { field: String, value: String },
    NotEquals { field: String, value: String },
    Contains { field: String, value: String },
    GreaterThan { field: String, value: f64 },
    LessThan { field: String, value: f64 },
    ChangedSinceLast { field: String },
}

/// One action, one variant per effect type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    MoveToStage { stage: String },
    SetPriority { priority: Priority },
    SetField { field: String, value: FieldValue },
    AddLabel { label: String },
    SendTemplate { template: String },
}

impl Action {
    pub fn describe(&self) -> String {
        match self {
            Action::MoveToStage { stage } => format!("move to stage {stage:?}"),
            Action::SetPriority { priority } => format!("set priority to {priority}"),
            Action::SetField { field, value } => {
                format!("set field {:?} to {:?}", field, value.render())
            }
            Action::AddLabel { label } => format!("add label {label:?}"),
            Action::SendTemplate { template } => format!("send template {template:?}"),
        }
    }
}

/// What happened to trigger an evaluation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleEvent {
    /// A specific named field changed.
    FieldChanged(String),
    /// Any change to the record.
    AnyChange,
}
