use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use elklens_core::ai_provider::HeuristicProvider;
use elklens_core::{
    AIError, AnalysisConfig, AnalysisPrompt, Config, ElkLens, MemoryReportStore, ReasoningService,
    StorageBackend, StorageConfig,
};
use elklens_web::{create_app, AppState, WebConfig};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

/// Fails every call with the same non-retryable error.
struct Refusing;

#[async_trait::async_trait]
impl ReasoningService for Refusing {
    async fn complete(&self, _prompt: &AnalysisPrompt) -> Result<String, AIError> {
        Err(AIError::AuthenticationError)
    }

    fn provider_name(&self) -> &str {
        "refusing"
    }
}

/// Replies with whitespace only.
struct Mute;

#[async_trait::async_trait]
impl ReasoningService for Mute {
    async fn complete(&self, _prompt: &AnalysisPrompt) -> Result<String, AIError> {
        Ok("\n".to_string())
    }

    fn provider_name(&self) -> &str {
        "mute"
    }
}

fn test_state_with(service: Arc<dyn ReasoningService>) -> AppState {
    let config = Config {
        analysis: AnalysisConfig {
            max_retries: 1,
            initial_backoff_ms: 1,
            ..AnalysisConfig::default()
        },
        ..Config::default()
    };
    let lens = ElkLens::new(config, service, Arc::new(MemoryReportStore::new()));
    AppState::with_lens(lens, WebConfig::default())
}

fn test_state() -> AppState {
    test_state_with(Arc::new(HeuristicProvider::new()))
}

async fn send(state: &AppState, request: Request<Body>) -> (StatusCode, Value) {
    let response = create_app(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

fn connection_refused_hits() -> Value {
    json!([{
        "_index": "laravel-2024.03.01",
        "_id": "doc-1",
        "_type": "_doc",
        "elk_id": "elk-1",
        "_source": {
            "message": "Connection refused",
            "@timestamp": "2024-03-01T10:00:00.000Z",
            "level": "ERROR",
            "file": "/path/to/file.php"
        }
    }])
}

#[tokio::test]
async fn test_health_endpoint() {
    let state = test_state();
    let (status, body) = send(&state, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["provider"], "heuristic");
}

#[tokio::test]
async fn test_receive_logs_then_fetch_report() {
    let state = test_state();

    let (status, body) = send(&state, post_json("/receive-logs", &connection_refused_hits())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Analysis complete");
    assert_eq!(body["elk_ids"], json!(["elk-1"]));
    let batch_id = body["batch_id"].as_str().unwrap().to_string();

    let (status, report) = send(&state, get(&format!("/analyze/{}", batch_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["batch_id"], batch_id.as_str());
    assert_eq!(report["total_errors"], 1);
    assert_eq!(report["summary"]["high_severity"], 1);
    assert_eq!(report["summary"]["critical_files"][0]["file"], "/path/to/file.php");
    assert_eq!(report["summary"]["critical_files"][0]["elk_id"], "elk-1");

    let (status, analyses) = send(&state, get(&format!("/analyze/{}/analyses", batch_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(analyses.as_array().unwrap().len(), 1);
    assert_eq!(analyses[0]["error_type"], "Connection Error");
    assert_eq!(analyses[0]["needs_immediate_attention"], true);
}

#[tokio::test]
async fn test_unknown_batch_is_404() {
    let state = test_state();
    let (status, body) = send(&state, get("/analyze/nonexistent")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
    assert_eq!(body["code"], "NOT_FOUND");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_analyze_prompt() {
    let state = test_state();

    let (status, report) = send(
        &state,
        post_json(
            "/analyze-prompt",
            &json!({"prompt": "Why is checkout slow?", "context": {"service": "checkout"}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["total_errors"], 1);
    assert_eq!(report["elk_ids"], json!([]));

    let (status, body) = send(&state, post_json("/analyze-prompt", &json!({"prompt": "  "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let state = test_state();
    let request = Request::builder()
        .method("POST")
        .uri("/receive-logs")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let (status, body) = send(&state, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_invalid_and_empty_ingests() {
    let state = test_state();

    let missing_message = json!([{"_source": {"@timestamp": "2024-03-01T10:00:00Z"}}]);
    let (status, body) = send(&state, post_json("/receive-logs", &missing_message)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_FAILED");

    let (status, body) = send(&state, post_json("/receive-logs", &json!([]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "EMPTY_BATCH");
}

#[tokio::test]
async fn test_failing_service_is_502_and_stores_nothing() {
    let state = test_state_with(Arc::new(Refusing));

    let (status, body) = send(&state, post_json("/receive-logs", &connection_refused_hits())).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "ANALYSIS_SERVICE_ERROR");
}

#[tokio::test]
async fn test_blank_model_reply_is_422() {
    let state = test_state_with(Arc::new(Mute));

    let (status, body) = send(&state, post_json("/receive-logs", &connection_refused_hits())).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "PARSE_ERROR");
}

#[tokio::test]
async fn test_rerun_replaces_report() {
    let state = test_state();

    let (_, body) = send(&state, post_json("/receive-logs", &connection_refused_hits())).await;
    let batch_id = body["batch_id"].as_str().unwrap().to_string();
    let (_, first) = send(&state, get(&format!("/analyze/{}", batch_id))).await;

    let rerun_request = Request::builder()
        .method("POST")
        .uri(format!("/analyze/{}/rerun", batch_id))
        .body(Body::empty())
        .unwrap();
    let (status, rerun) = send(&state, rerun_request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rerun["summary"], first["summary"]);

    let (_, stored) = send(&state, get(&format!("/analyze/{}", batch_id))).await;
    assert_eq!(stored, rerun);

    let missing = Request::builder()
        .method("POST")
        .uri("/analyze/nonexistent/rerun")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&state, missing).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let state = test_state();
    let (status, body) = send(&state, get("/no/such/route")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "ROUTE_NOT_FOUND");
}

#[tokio::test]
async fn test_prompt_with_logs() {
    let state = test_state();

    let (status, body) = send(
        &state,
        post_json(
            "/analyze-prompt-with-logs",
            &json!({"prompt": "Which call should we guard?", "logs": connection_refused_hits()}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Analysis complete");
    assert_eq!(body["elk_ids"], json!(["elk-1"]));
    let batch_id = body["batch_id"].as_str().unwrap().to_string();

    let (status, analyses) = send(&state, get(&format!("/analyze/{}/analyses", batch_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(analyses[0]["code_suggestions"][0]
        .as_str()
        .unwrap()
        .contains("/path/to/file.php"));
    assert!(!analyses[0]["resolution_steps"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_prompt_with_logs_rejects_bad_input() {
    let state = test_state();

    let (status, body) = send(
        &state,
        post_json(
            "/analyze-prompt-with-logs",
            &json!({"prompt": " ", "logs": connection_refused_hits()}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_FAILED");

    let (status, body) = send(
        &state,
        post_json("/analyze-prompt-with-logs", &json!({"prompt": "Why?"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_lookups_work_without_provider_credentials() {
    let mut config = Config {
        storage: StorageConfig {
            backend: StorageBackend::Memory,
            database_path: None,
        },
        ..Config::default()
    };
    config.provider.name = "openai".to_string();
    config.provider.api_key = None;
    let state = AppState::from_pipeline_config(config, WebConfig::default())
        .await
        .unwrap();

    let (status, body) = send(&state, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["provider"], "openai");

    let (status, body) = send(&state, get("/analyze/nonexistent")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, body) = send(&state, post_json("/analyze-prompt", &json!({"prompt": "Why?"}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "CONFIG_ERROR");
}
