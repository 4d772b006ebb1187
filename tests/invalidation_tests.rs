//! Mutation side effects on the cache: stage changes invalidate exactly the
//! affected stage-grouped views, and the repair path goes through the same
//! affected-key rule.

mod common;

use common::{build_pipeline, startup_row, MockStore};
use dealboard::board::{Pipeline, StartupUpdate};
use dealboard::priority::Priority;
use serde_json::Value;
use std::sync::Arc;

#[tokio::test]
async fn stage_change_invalidates_both_stage_views_and_no_others() {
    let store = Arc::new(
        MockStore::new()
            .with_default_stages()
            .with_table("startups", vec![startup_row("s1", Some("applied"), "Acme")]),
    );
    let pipeline = build_pipeline(store.clone());

    // Warm every view that matters.
    pipeline.startups().await.unwrap();
    pipeline.startup("s1").await.unwrap();
    pipeline.startups_by_stage("applied").await.unwrap();
    pipeline.startups_by_stage("due-diligence").await.unwrap();
    pipeline.startups_by_stage("term-sheet").await.unwrap();

    pipeline.move_startup("s1", "due-diligence").await.unwrap();

    let cache = pipeline.cache();
    assert!(!cache.is_fresh(&Pipeline::stage_view_key("applied")));
    assert!(!cache.is_fresh(&Pipeline::stage_view_key("due-diligence")));
    // The unrelated view is untouched.
    assert!(cache.is_fresh(&Pipeline::stage_view_key("term-sheet")));
}

#[tokio::test]
async fn stage_preserving_update_leaves_stage_views_fresh() {
    let store = Arc::new(
        MockStore::new()
            .with_default_stages()
            .with_table("startups", vec![startup_row("s1", Some("applied"), "Acme")]),
    );
    let pipeline = build_pipeline(store.clone());

    pipeline.startups().await.unwrap();
    pipeline.startups_by_stage("applied").await.unwrap();

    let update = StartupUpdate {
        priority: Some(Priority::High),
        ..StartupUpdate::default()
    };
    pipeline.update_startup("s1", update).await.unwrap();

    let cache = pipeline.cache();
    // Record and list are always part of the affected set...
    assert!(!cache.is_fresh(&dealboard::cache::CacheKey::record("startups", "s1")));
    assert!(!cache.is_fresh(&dealboard::cache::CacheKey::collection("startups")));
    // ...but an unchanged stage reference keeps its grouped view.
    assert!(cache.is_fresh(&Pipeline::stage_view_key("applied")));
}

#[tokio::test]
async fn repair_assigns_the_default_stage_and_reports_the_count() {
    let store = Arc::new(
        MockStore::new()
            .with_default_stages()
            .with_table(
                "startups",
                vec![
                    startup_row("s1", Some("applied"), "Acme"),
                    startup_row("s9", None, "Globex"),
                ],
            ),
    );
    let pipeline = build_pipeline(store.clone());

    pipeline.startups_by_stage("declined").await.unwrap();

    let report = pipeline.repair_missing_stages().await.unwrap();
    assert_eq!(report.updated, 1);

    // The record now carries the default terminal stage...
    let row = store.row("startups", "s9").unwrap();
    assert_eq!(row.get("stage").and_then(Value::as_str), Some("declined"));
    // ...and the declined view was invalidated by the same rule as a move.
    assert!(!pipeline.cache().is_fresh(&Pipeline::stage_view_key("declined")));

    let declined = pipeline.startups_by_stage("declined").await.unwrap();
    assert_eq!(declined.len(), 1);
    assert_eq!(declined[0].id, "s9");
}

#[tokio::test]
async fn repair_with_no_orphans_reports_zero() {
    let store = Arc::new(
        MockStore::new()
            .with_default_stages()
            .with_table("startups", vec![startup_row("s1", Some("applied"), "Acme")]),
    );
    let pipeline = build_pipeline(store);

    let report = pipeline.repair_missing_stages().await.unwrap();
    assert_eq!(report.updated, 0);
}

#[tokio::test]
async fn moving_to_an_unknown_stage_is_a_validation_error() {
    let store = Arc::new(
        MockStore::new()
            .with_default_stages()
            .with_table("startups", vec![startup_row("s1", Some("applied"), "Acme")]),
    );
    let pipeline = build_pipeline(store);

    let err = pipeline.move_startup("s1", "moonshot").await.unwrap_err();
    assert!(matches!(err, dealboard::remote::StoreError::Validation(_)));
}

#[tokio::test]
async fn delete_invalidates_the_records_stage_view() {
    let store = Arc::new(
        MockStore::new()
            .with_default_stages()
            .with_table("startups", vec![startup_row("s1", Some("applied"), "Acme")]),
    );
    let pipeline = build_pipeline(store.clone());

    pipeline.startups_by_stage("applied").await.unwrap();
    pipeline.delete_startup("s1").await.unwrap();

    assert!(!pipeline.cache().is_fresh(&Pipeline::stage_view_key("applied")));
    assert!(pipeline.startups_by_stage("applied").await.unwrap().is_empty());
}
