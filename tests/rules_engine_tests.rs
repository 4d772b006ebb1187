//! End-to-end rule evaluation and best-effort action application against the
//! pipeline service.

mod common;

use common::{build_pipeline, startup_row, MockStore};
use dealboard::priority::Priority;
use dealboard::rules::{apply_actions, evaluate, Action, Condition, Rule, RuleEvent};
use serde_json::Value;
use std::sync::Arc;

fn escalation_rule() -> Rule {
    Rule {
        id: "r1".into(),
        name: "escalate applied deals".into(),
        conditions: vec![Condition::Equals {
            field: "stage".into(),
            value: "applied".into(),
        }],
        actions: vec![
            Action::MoveToStage {
                stage: "due-diligence".into(),
            },
            Action::SetPriority {
                priority: Priority::High,
            },
        ],
        active: true,
    }
}

#[tokio::test]
async fn fired_actions_apply_in_order() {
    let store = Arc::new(
        MockStore::new()
            .with_default_stages()
            .with_table("startups", vec![startup_row("s1", Some("applied"), "Acme")]),
    );
    let pipeline = build_pipeline(store.clone());

    let startup = pipeline.startup("s1").await.unwrap();
    let fired = evaluate(&[escalation_rule()], &RuleEvent::AnyChange, None, &startup);
    assert_eq!(fired.len(), 1);

    let outcomes = apply_actions(&pipeline, &[], "s1", &fired[0].actions).await;
    assert!(outcomes.iter().all(|o| o.succeeded()));

    let row = store.row("startups", "s1").unwrap();
    assert_eq!(row.get("stage").and_then(Value::as_str), Some("due-diligence"));
    assert_eq!(row.get("priority").and_then(Value::as_str), Some("high"));
}

#[tokio::test]
async fn failing_action_is_recorded_and_later_actions_still_run() {
    let store = Arc::new(
        MockStore::new()
            .with_default_stages()
            .with_table("startups", vec![startup_row("s1", Some("applied"), "Acme")]),
    );
    let pipeline = build_pipeline(store.clone());

    let actions = vec![
        Action::MoveToStage {
            stage: "nonexistent-stage".into(),
        },
        Action::AddLabel {
            label: "reviewed".into(),
        },
    ];
    let outcomes = apply_actions(&pipeline, &[], "s1", &actions).await;

    assert_eq!(outcomes.len(), 2);
    assert!(!outcomes[0].succeeded());
    assert!(outcomes[1].succeeded());

    // No rollback: the failed move left the stage alone, the label landed.
    let row = store.row("startups", "s1").unwrap();
    assert_eq!(row.get("stage").and_then(Value::as_str), Some("applied"));
    let labels = row.get("labels").and_then(Value::as_array).unwrap();
    assert_eq!(labels.len(), 1);
}

#[tokio::test]
async fn send_template_renders_against_the_record() {
    let store = Arc::new(
        MockStore::new()
            .with_default_stages()
            .with_table("startups", vec![startup_row("s1", Some("applied"), "Acme")]),
    );
    let pipeline = build_pipeline(store);

    let templates = vec![dealboard::templates::EmailTemplate {
        id: "t1".into(),
        name: "welcome".into(),
        subject: "Welcome {{name}}".into(),
        body: "You're in {{stage}}.".into(),
    }];

    let ok = apply_actions(
        &pipeline,
        &templates,
        "s1",
        &[Action::SendTemplate {
            template: "welcome".into(),
        }],
    )
    .await;
    assert!(ok[0].succeeded());

    let missing = apply_actions(
        &pipeline,
        &templates,
        "s1",
        &[Action::SendTemplate {
            template: "does-not-exist".into(),
        }],
    )
    .await;
    assert!(!missing[0].succeeded());
}

#[tokio::test]
async fn add_label_is_idempotent() {
    let store = Arc::new(
        MockStore::new()
            .with_default_stages()
            .with_table("startups", vec![startup_row("s1", Some("applied"), "Acme")]),
    );
    let pipeline = build_pipeline(store.clone());

    let action = [Action::AddLabel {
        label: "reviewed".into(),
    }];
    apply_actions(&pipeline, &[], "s1", &action).await;
    apply_actions(&pipeline, &[], "s1", &action).await;

    let row = store.row("startups", "s1").unwrap();
    let labels = row.get("labels").and_then(Value::as_array).unwrap();
    assert_eq!(labels.len(), 1);
}
