//! REST transport against a mocked backend: query rendering, write headers,
//! and the error taxonomy mapping.

use dealboard::config::RateLimitConfig;
use dealboard::remote::{RemoteStore, RestStore, SelectQuery, StoreError};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn rate_limit() -> RateLimitConfig {
    RateLimitConfig {
        requests_per_second: 1000,
        burst_capacity: 1000,
    }
}

async fn store_for(server: &MockServer) -> RestStore {
    RestStore::new(&format!("{}/rest/", server.uri()), None, &rate_limit())
        .expect("endpoint URL is valid")
}

#[tokio::test]
async fn select_renders_filters_order_and_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/startups"))
        .and(query_param("stage", "eq.applied"))
        .and(query_param("order", "updated_at.desc"))
        .and(query_param("limit", "25"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "s1"}])))
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    let query = SelectQuery::new()
        .eq("stage", json!("applied"))
        .order_by("updated_at", false)
        .limit(25);
    let rows = store.select("startups", &query).await.unwrap();
    assert_eq!(rows, vec![json!({"id": "s1"})]);
}

#[tokio::test]
async fn null_filters_render_as_is_null() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/startups"))
        .and(query_param("stage", "is.null"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    let rows = store
        .select("startups", &SelectQuery::new().is_null("stage"))
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn get_unwraps_the_single_row_or_reports_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/startups"))
        .and(query_param("id", "eq.s1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "s1"}])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/startups"))
        .and(query_param("id", "eq.missing"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    assert_eq!(
        store.get("startups", "s1").await.unwrap(),
        json!({"id": "s1"})
    );
    assert_eq!(
        store.get("startups", "missing").await.unwrap_err(),
        StoreError::NotFound("startups/missing".into())
    );
}

#[tokio::test]
async fn insert_asks_for_the_representation_back() {
    let server = MockServer::start().await;
    let record = json!({"id": "s2", "stage": "applied"});
    Mock::given(method("POST"))
        .and(path("/rest/startups"))
        .and(header("Prefer", "return=representation"))
        .and(body_json(&record))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{"id": "s2", "stage": "applied"}])))
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    let created = store.insert("startups", &record).await.unwrap();
    assert_eq!(created["id"], "s2");
}

#[tokio::test]
async fn update_patches_by_id_filter() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/rest/startups"))
        .and(query_param("id", "eq.s1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"id": "s1", "stage": "due-diligence"}])),
        )
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    let updated = store
        .update("startups", "s1", &json!({"stage": "due-diligence"}))
        .await
        .unwrap();
    assert_eq!(updated["stage"], "due-diligence");
}

#[tokio::test]
async fn backend_message_bodies_map_onto_the_error_taxonomy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/invalid"))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(json!({"message": "stage is required"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/forbidden"))
        .respond_with(ResponseTemplate::new(403).set_body_string("no access"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/broken"))
        .respond_with(ResponseTemplate::new(503).set_body_string("try later"))
        .mount(&server)
        .await;

    let store = store_for(&server).await;

    let err = store
        .select("invalid", &SelectQuery::new())
        .await
        .unwrap_err();
    assert_eq!(err, StoreError::Validation("stage is required".into()));
    assert!(!err.is_retryable());

    let err = store
        .select("forbidden", &SelectQuery::new())
        .await
        .unwrap_err();
    assert_eq!(err, StoreError::Permission("no access".into()));

    let err = store
        .select("broken", &SelectQuery::new())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        StoreError::Server {
            status: 503,
            message: "try later".into()
        }
    );
    assert!(err.is_retryable());
}

#[tokio::test]
async fn delete_tolerates_an_empty_response_body() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/rest/startups"))
        .and(query_param("id", "eq.s1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    store.delete("startups", "s1").await.unwrap();
}
