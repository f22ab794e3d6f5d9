//! Wire-level tests for the Weaviate backend against a mock server.
#![cfg(feature = "weaviate")]

use std::sync::Mutex;
use std::time::Duration;

use adk_vdb::batch::BatchPolicy;
use adk_vdb::document::{DOC_ID_KEY, Document, MetadataValue};
use adk_vdb::query::{FullTextQuery, VectorQuery};
use adk_vdb::vectorstore::VectorStore;
use adk_vdb::weaviate::WeaviateVectorStore;
use adk_vdb::{Dataset, MetadataFilter, VdbError, VectorStoreConfig, create_vector_store};
use chrono::{TimeZone, Utc};
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const CLASS: &str = "Vector_index_ds_1_Node";

fn config(server: &MockServer) -> VectorStoreConfig {
    VectorStoreConfig::builder()
        .endpoint(server.uri())
        .api_key("secret")
        .batch_size(2)
        .build()
        .unwrap()
}

fn store(server: &MockServer) -> WeaviateVectorStore {
    let config = config(server);
    WeaviateVectorStore::new(CLASS, &config, adk_vdb::default_attributes())
        .unwrap()
        .with_batch_policy(BatchPolicy::from_config(&config).with_retry_backoff(Duration::ZERO))
}

fn node(doc_id: &str, text: &str) -> Document {
    Document::new(text).with_metadata(DOC_ID_KEY, doc_id).with_metadata("document_id", "d1")
}

/// Answers batch writes with one result per object, failing objects whose
/// text is listed in `failing` a given number of times.
struct BatchResponder {
    failing: Mutex<Vec<(String, u32)>>,
}

impl BatchResponder {
    fn ok() -> Self {
        Self { failing: Mutex::new(Vec::new()) }
    }

    fn failing(text: &str, times: u32) -> Self {
        Self { failing: Mutex::new(vec![(text.to_string(), times)]) }
    }
}

impl Respond for BatchResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = request.body_json().unwrap();
        let mut failing = self.failing.lock().unwrap();
        let results: Vec<Value> = body["objects"]
            .as_array()
            .unwrap()
            .iter()
            .map(|object| {
                let text = object["properties"]["text"].as_str().unwrap_or_default();
                let fail = failing.iter_mut().find(|(t, left)| t == text && *left > 0);
                match fail {
                    Some((_, left)) => {
                        *left -= 1;
                        json!({
                            "id": object["id"],
                            "result": {"errors": {"error": [{"message": "store is read-only"}]}}
                        })
                    }
                    None => json!({"id": object["id"], "result": {}}),
                }
            })
            .collect();
        ResponseTemplate::new(200).set_body_json(results)
    }
}

async fn batch_requests(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == "/v1/batch/objects")
        .map(|r| r.body_json::<Value>().unwrap())
        .collect()
}

#[test]
fn empty_endpoint_is_a_config_error() {
    let config = VectorStoreConfig { endpoint: String::new(), ..VectorStoreConfig::default() };
    let err = WeaviateVectorStore::new(CLASS, &config, vec![]).err().unwrap();
    assert!(matches!(err, VdbError::ConfigError(_)));

    let config = VectorStoreConfig { endpoint: "not a url".into(), ..VectorStoreConfig::default() };
    let err = WeaviateVectorStore::new(CLASS, &config, vec![]).err().unwrap();
    assert!(matches!(err, VdbError::ConfigError(_)));
}

#[tokio::test]
async fn unreachable_server_is_a_connection_error() {
    let config = VectorStoreConfig::builder().endpoint("http://127.0.0.1:1").build().unwrap();
    let err = WeaviateVectorStore::connect(CLASS, &config, vec![]).await.err().unwrap();
    assert!(matches!(err, VdbError::ConnectionError { .. }));
}

#[tokio::test]
async fn unreachable_server_during_upsert_is_not_retried() {
    // Non-routable address: the connect either times out or fails outright.
    let config = VectorStoreConfig::builder()
        .endpoint("http://10.255.255.1:8080")
        .timeouts(1, 5)
        .build()
        .unwrap();
    let store = WeaviateVectorStore::new(CLASS, &config, vec![]).unwrap();

    let err = store.upsert(&[node("n1", "a")], None).await.unwrap_err();
    assert!(matches!(err, VdbError::ConnectionError { .. }), "unexpected error: {err}");
}

#[tokio::test]
async fn factory_builds_weaviate_store_for_dataset() {
    let server = MockServer::start().await;
    let store =
        create_vector_store(&config(&server), &Dataset::new("ds-1"), adk_vdb::default_attributes())
            .unwrap();
    assert_eq!(store.collection(), CLASS);
    assert_eq!(
        serde_json::to_value(store.describe_storage()).unwrap(),
        json!({"type": "weaviate", "vector_store": {"class_prefix": CLASS}})
    );
}

#[tokio::test]
async fn ensure_collection_creates_missing_class_with_text_property() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/schema/{CLASS}")))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/schema"))
        .and(body_partial_json(json!({
            "class": CLASS,
            "properties": [{"name": "text", "dataType": ["text"]}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"class": CLASS})))
        .expect(1)
        .mount(&server)
        .await;

    store(&server).ensure_collection().await.unwrap();
}

#[tokio::test]
async fn ensure_collection_skips_existing_class() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/schema/{CLASS}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"class": CLASS})))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/schema"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let store = store(&server);
    store.ensure_collection().await.unwrap();
    store.ensure_collection().await.unwrap();
}

#[tokio::test]
async fn concurrent_class_creation_is_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/schema/{CLASS}")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/schema"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "error": [{"message": format!("class name {CLASS} already exists")}]
        })))
        .mount(&server)
        .await;

    store(&server).ensure_collection().await.unwrap();
}

#[tokio::test]
async fn upsert_batches_objects_and_returns_ids_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/batch/objects"))
        .respond_with(BatchResponder::ok())
        .mount(&server)
        .await;

    let created_at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
    let docs = vec![
        node("n1", "a").with_metadata("created_at", created_at),
        node("n2", "b"),
        node("n3", "c"),
    ];
    let vectors = vec![vec![0.1, 0.2], vec![0.3, 0.4], vec![0.5, 0.6]];
    let ids = store(&server).upsert(&docs, Some(vectors.as_slice())).await.unwrap();

    let expected: Vec<String> = docs.iter().map(|d| adk_vdb::assign_id(d).to_string()).collect();
    assert_eq!(ids, expected);

    let batches = batch_requests(&server).await;
    assert_eq!(batches.len(), 2);
    let first = &batches[0]["objects"];
    assert_eq!(first.as_array().unwrap().len(), 2);
    assert_eq!(first[0]["class"], CLASS);
    assert_eq!(first[0]["id"], json!(ids[0]));
    assert_eq!(first[0]["properties"]["text"], "a");
    assert_eq!(first[0]["properties"]["doc_id"], "n1");
    assert_eq!(first[0]["properties"]["created_at"], "2024-03-01T12:30:00+00:00");
    let vector: Vec<f32> = serde_json::from_value(first[0]["vector"].clone()).unwrap();
    assert_eq!(vector, vec![0.1, 0.2]);
    assert_eq!(batches[1]["objects"][0]["properties"]["text"], "c");
}

#[tokio::test]
async fn upsert_without_vectors_omits_vector_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/batch/objects"))
        .respond_with(BatchResponder::ok())
        .mount(&server)
        .await;

    store(&server).upsert(&[node("n1", "a")], None).await.unwrap();

    let batches = batch_requests(&server).await;
    assert!(batches[0]["objects"][0].get("vector").is_none());
}

#[tokio::test]
async fn failed_items_are_retried_then_succeed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/batch/objects"))
        .respond_with(BatchResponder::failing("b", 2))
        .mount(&server)
        .await;

    store(&server).upsert(&[node("n1", "a"), node("n2", "b")], None).await.unwrap();

    let batches = batch_requests(&server).await;
    assert_eq!(batches.len(), 3);
    assert_eq!(batches[1]["objects"].as_array().unwrap().len(), 1);
    assert_eq!(batches[2]["objects"][0]["properties"]["text"], "b");
}

#[tokio::test]
async fn persistent_item_failure_surfaces_batch_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/batch/objects"))
        .respond_with(BatchResponder::failing("c", 100))
        .mount(&server)
        .await;

    let docs = vec![node("n1", "a"), node("n2", "b"), node("n3", "c")];
    let err = store(&server).upsert(&docs, None).await.unwrap_err();

    match err {
        VdbError::BatchWriteError { batch, attempts, message, .. } => {
            assert_eq!(batch, 1);
            assert_eq!(attempts, 4);
            assert!(message.contains("store is read-only"));
        }
        other => panic!("unexpected error: {other}"),
    }
    // The first batch stays written: 1 request for it, 4 for the failing one.
    assert_eq!(batch_requests(&server).await.len(), 5);
}

#[tokio::test]
async fn vector_search_filters_by_threshold_and_attaches_score() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/graphql"))
        .and(body_string_contains("nearVector"))
        .and(body_string_contains("limit: 4"))
        .and(body_string_contains("_additional { id distance }"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"Get": {CLASS: [
                {"text": "a", "doc_id": "n1", "_additional": {"id": "x", "distance": 0.1}},
                {"text": "b", "doc_id": "n2", "_additional": {"id": "y", "distance": 0.5}},
                {"text": "c", "doc_id": "n3", "_additional": {"id": "z", "distance": 0.9}}
            ]}}
        })))
        .mount(&server)
        .await;

    let query = VectorQuery::new().score_threshold(0.5);
    let results = store(&server).search_by_vector(&[0.1, 0.2], &query).await.unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].document.content, "a");
    assert_eq!(results[0].document.metadata.get(DOC_ID_KEY), Some(&MetadataValue::from("n1")));
    assert!((results[0].document.score().unwrap() - 0.1).abs() < 1e-6);
    assert!(!results[0].document.metadata.contains_key("_additional"));
}

#[tokio::test]
async fn vector_search_sends_filter() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/graphql"))
        .and(body_string_contains("operator: Equal"))
        .and(body_string_contains("document_id"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": {"Get": {CLASS: []}}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let query = VectorQuery::new().filter(MetadataFilter::equal("document_id", "d1"));
    let results = store(&server).search_by_vector(&[1.0], &query).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn query_errors_are_surfaced_with_backend_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"Get": {CLASS: null}},
            "errors": [{"message": "vector lengths don't match"}]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let store = store(&server);
    let err = store.search_by_vector(&[1.0], &VectorQuery::new()).await.unwrap_err();
    match err {
        VdbError::QueryError { message, .. } => assert!(message.contains("vector lengths")),
        other => panic!("unexpected error: {other}"),
    }
    assert!(matches!(store.exists("n1").await, Err(VdbError::QueryError { .. })));
}

#[tokio::test]
async fn malformed_rows_fail_the_whole_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"Get": {CLASS: [
                {"text": "a", "_additional": {"distance": 0.1}},
                {"doc_id": "n2", "_additional": {"distance": 0.2}}
            ]}}
        })))
        .mount(&server)
        .await;

    let err = store(&server).search_by_vector(&[1.0], &VectorQuery::new()).await.unwrap_err();
    assert!(matches!(err, VdbError::MalformedResponse { .. }));
}

#[tokio::test]
async fn full_text_search_uses_bm25_and_passes_additional_through() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/graphql"))
        .and(body_string_contains("bm25"))
        .and(body_string_contains("limit: 2"))
        .and(body_string_contains("_additional { score }"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"Get": {CLASS: [
                {"text": "a", "doc_id": "n1", "_additional": {"score": "1.5"}},
                {"text": "b", "doc_id": "n2", "_additional": {"score": "0.7"}}
            ]}}
        })))
        .mount(&server)
        .await;

    let query = FullTextQuery::new().additional("score");
    let docs = store(&server).search_by_full_text("weaviate", &query).await.unwrap();

    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].content, "a");
    assert_eq!(
        docs[0].metadata.get("_additional"),
        Some(&MetadataValue::Json(json!({"score": "1.5"})))
    );
}

#[tokio::test]
async fn exists_queries_doc_id_with_limit_one() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/graphql"))
        .and(body_string_contains("\\\"n1\\\""))
        .and(body_string_contains("limit: 1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"Get": {CLASS: [{"_additional": {"id": "x"}}]}}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/graphql"))
        .and(body_string_contains("\\\"gone\\\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"Get": {CLASS: []}}
        })))
        .mount(&server)
        .await;

    let store = store(&server);
    assert!(store.exists("n1").await.unwrap());
    assert!(!store.exists("gone").await.unwrap());
}

#[tokio::test]
async fn delete_by_ids_ignores_missing_objects() {
    let server = MockServer::start().await;
    let present = adk_vdb::id_for_doc_id("n1").to_string();
    let missing = adk_vdb::id_for_doc_id("n2").to_string();
    Mock::given(method("DELETE"))
        .and(path(format!("/v1/objects/{CLASS}/{present}")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("/v1/objects/{CLASS}/{missing}")))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    store(&server).delete_by_ids(&[present, missing]).await.unwrap();
}

#[tokio::test]
async fn delete_by_ids_skips_ids_that_are_not_uuids() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let ids = vec![
        format!("../../schema/{CLASS}"),
        "a".to_string(),
        "x?class=Other".to_string(),
        format!("{}#frag", adk_vdb::id_for_doc_id("n1")),
    ];
    store(&server).delete_by_ids(&ids).await.unwrap();

    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_by_ids_only_touches_object_endpoints() {
    let server = MockServer::start().await;
    let id = adk_vdb::id_for_doc_id("n1").to_string();
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    store(&server)
        .delete_by_ids(&[format!("../../schema/{CLASS}"), id.clone()])
        .await
        .unwrap();

    let paths: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.url.path().to_string())
        .collect();
    assert_eq!(paths, vec![format!("/v1/objects/{CLASS}/{id}")]);
}

#[tokio::test]
async fn delete_by_metadata_sends_equal_filter() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v1/batch/objects"))
        .and(body_partial_json(json!({
            "match": {
                "class": CLASS,
                "where": {"path": ["document_id"], "operator": "Equal", "valueText": "d1"}
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": {"failed": 0, "matches": 3, "successful": 3}
        })))
        .expect(1)
        .mount(&server)
        .await;

    store(&server).delete_by_metadata_field("document_id", "d1").await.unwrap();
}

#[tokio::test]
async fn drop_collection_deletes_class() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(format!("/v1/schema/{CLASS}")))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    store(&server).drop_collection().await.unwrap();
}
