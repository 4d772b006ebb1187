// Stateless rule evaluation: each pass is a pure function of the previous
// and current record snapshots.

use tracing::{debug, warn};

use super::types::{Action, Condition, Rule, RuleEvent};
use crate::board::{Pipeline, Startup, StartupUpdate};
use crate::remote::StoreError;
use crate::templates::{render, EmailTemplate};

/// A rule whose conditions all held, with the actions it wants to run.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub rule_id: String,
    pub rule_name: String,
    pub actions: Vec<Action>,
}

/// Scan active rules in storage order and collect those whose conditions all
/// hold (logical AND) against the snapshots.
pub fn evaluate(
    rules: &[Rule],
    event: &RuleEvent,
    previous: Option<&Startup>,
    current: &Startup,
) -> Vec<Evaluation> {
    let mut fired = Vec::new();
    for rule in rules.iter().filter(|r| r.active) {
        let holds = rule
            .conditions
            .iter()
            .all(|c| condition_holds(c, previous, current));
        if holds {
            debug!(rule = %rule.name, event = ?event, "rule fired");
            fired.push(Evaluation {
                rule_id: rule.id.clone(),
                rule_name: rule.name.clone(),
                actions: rule.actions.clone(),
            });
        }
    }
    fired
}

pub fn condition_holds(
    condition: &Condition,
    previous: Option<&Startup>,
    current: &Startup,
) -> bool {
    match condition {
        Condition::Equals { field, value } => {
            current.field_text(field).as_deref() == Some(value.as_str())
        }
        Condition::NotEquals { field, value } => {
            current.field_text(field).as_deref() != Some(value.as_str())
        }
        Condition::Contains { field, value } => current
            .field_text(field)
            .map(|text| text.contains(value.as_str()))
            .unwrap_or(false),
        Condition::GreaterThan { field, value } => current
            .field_number(field)
            .map(|n| n > *value)
            .unwrap_or(false),
        Condition::LessThan { field, value } => current
            .field_number(field)
            .map(|n| n < *value)
            .unwrap_or(false),
        Condition::ChangedSinceLast { field } => {
            let before = previous.and_then(|p| p.field_text(field));
            let after = current.field_text(field);
            before != after
        }
    }
}

/// Result of applying one action. Failures are recorded, not propagated;
/// the remaining actions still run and earlier effects stand.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    pub description: String,
    pub error: Option<String>,
}

impl ActionOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Apply a fired rule's actions in order, best-effort.
pub async fn apply_actions(
    pipeline: &Pipeline,
    templates: &[EmailTemplate],
    startup_id: &str,
    actions: &[Action],
) -> Vec<ActionOutcome> {
    let mut outcomes = Vec::with_capacity(actions.len());
    for action in actions {
        let result = apply_action(pipeline, templates, startup_id, action).await;
        let outcome = ActionOutcome {
            description: action.describe(),
            error: result.err().map(|e| e.to_string()),
        };
        if let Some(error) = &outcome.error {
            warn!(startup_id, action = %outcome.description, error, "rule action failed");
        }
        outcomes.push(outcome);
    }
    outcomes
}

async fn apply_action(
    pipeline: &Pipeline,
    templates: &[EmailTemplate],
    startup_id: &str,
    action: &Action,
) -> Result<(), StoreError> {
    match action {
        Action::MoveToStage { stage } => {
            pipeline.move_startup(startup_id, stage).await?;
        }
        Action::SetPriority { priority } => {
            let update = StartupUpdate {
                priority: Some(*priority),
                ..StartupUpdate::default()
            };
            pipeline.update_startup(startup_id, update).await?;
        }
        Action::SetField { field, value } => {
            let mut update = StartupUpdate::default();
            update.fields.insert(field.clone(), value.clone());
            pipeline.update_startup(startup_id, update).await?;
        }
        Action::AddLabel { label } => {
            let current = pipeline.startup(startup_id).await?;
            if !current.labels.contains(label) {
                let mut labels = current.labels.clone();
                labels.push(label.clone());
                let update = StartupUpdate {
                    labels: Some(labels),
                    ..StartupUpdate::default()
                };
                pipeline.update_startup(startup_id, update).await?;
            }
        }
        Action::SendTemplate { template } => {
            let found = templates
                .iter()
                .find(|t| t.id == *template || t.name == *template)
                .ok_or_else(|| {
                    StoreError::NotFound(format!("email template {template:?}"))
                })?;
            let startup = pipeline.startup(startup_id).await?;
            let subject = render(&found.subject, &startup);
            let body = render(&found.body, &startup);
            tracing::info!(startup_id, template = %found.name, %subject, body_len = body.len(), "email template rendered for delivery");
        }
    }
    Ok(())
}
