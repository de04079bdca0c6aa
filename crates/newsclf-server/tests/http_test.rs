mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use newsclf_server::config::LoadMode;
use newsclf_server::{build_router, AppState};

use common::{config_for, config_with_artifacts, write_tokenizer};

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn predict_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn predict(app: Router, text: &str) -> (StatusCode, Value) {
    send(app, predict_request(&json!({ "text": text }).to_string())).await
}

#[tokio::test]
async fn root_reports_running() {
    let app = build_router(AppState::new(Default::default()));
    let (status, body) = send(app, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"message": "API is running. Use POST /predict to classify news."})
    );
}

#[tokio::test]
async fn health_check() {
    let app = build_router(AppState::new(Default::default()));
    let (status, body) = send(app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "newsclf-server");
}

#[tokio::test]
async fn eager_predicts_real_and_fake() {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState::initialize(config_with_artifacts(dir.path(), LoadMode::Eager))
        .await
        .unwrap();
    assert!(state.is_loaded());
    let app = build_router(state);

    let (status, body) = predict(app.clone(), "The government passed the bill").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["label"], "REAL");
    let confidence = body["confidence"].as_f64().unwrap();
    assert!(confidence >= 0.5 && confidence <= 1.0);

    let (status, body) = predict(app, "Aliens landed!").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["label"], "FAKE");
    let confidence = body["confidence"].as_f64().unwrap();
    assert!(confidence >= 0.0 && confidence < 0.5);
}

#[tokio::test]
async fn same_text_gives_same_answer() {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState::initialize(config_with_artifacts(dir.path(), LoadMode::Eager))
        .await
        .unwrap();
    let app = build_router(state);

    let (_, first) = predict(app.clone(), "aliens passed the cat").await;
    let (_, second) = predict(app, "aliens passed the cat").await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn empty_text_is_classified() {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState::initialize(config_with_artifacts(dir.path(), LoadMode::Eager))
        .await
        .unwrap();
    let (status, body) = predict(build_router(state), "").await;
    assert_eq!(status, StatusCode::OK);
    // 全零输入 -> sigmoid(0) = 0.5 -> REAL
    assert_eq!(body["label"], "REAL");
    assert!((body["confidence"].as_f64().unwrap() - 0.5).abs() < 1e-6);
}

#[tokio::test]
async fn lazy_loads_on_first_request() {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState::initialize(config_with_artifacts(dir.path(), LoadMode::Lazy))
        .await
        .unwrap();
    assert!(!state.is_loaded());
    let app = build_router(state.clone());

    let (_, ready) = send(app.clone(), get("/ready")).await;
    assert_eq!(ready["status"], "loading");
    assert_eq!(ready["model_loaded"], false);
    assert_eq!(ready["loaded_at"], Value::Null);

    let (status, _) = predict(app.clone(), "government bill").await;
    assert_eq!(status, StatusCode::OK);
    assert!(state.is_loaded());

    let (_, ready) = send(app, get("/ready")).await;
    assert_eq!(ready["status"], "ready");
    assert_eq!(ready["model_loaded"], true);
    assert!(ready["loaded_at"].is_string());
}

#[tokio::test]
async fn lazy_missing_model_is_a_500() {
    let dir = tempfile::tempdir().unwrap();
    let tokenizer_path = dir.path().join("tokenizer.json");
    write_tokenizer(&tokenizer_path);
    let config = config_for(dir.path().join("missing_model"), tokenizer_path, LoadMode::Lazy);
    let app = build_router(AppState::initialize(config).await.unwrap());

    let (status, body) = predict(app, "anything").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let detail = body["detail"].as_str().unwrap();
    assert!(detail.starts_with("Model file not found"), "{}", detail);
    assert!(detail.contains("missing_model"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_requests_share_one_load() {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState::initialize(config_with_artifacts(dir.path(), LoadMode::Lazy))
        .await
        .unwrap();
    assert_eq!(state.load_attempts(), 0);
    let app = build_router(state.clone());

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let app = app.clone();
            tokio::spawn(async move { predict(app, "aliens landed").await })
        })
        .collect();
    for handle in handles {
        let (status, body) = handle.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["label"], "FAKE");
    }

    assert_eq!(state.load_attempts(), 1);
    let loaded_at = state.loaded_at().unwrap();

    let (status, _) = predict(app, "government bill").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state.load_attempts(), 1);
    assert_eq!(state.loaded_at(), Some(loaded_at));
}

#[tokio::test]
async fn lazy_load_failure_is_retried() {
    let dir = tempfile::tempdir().unwrap();
    let model_dir = dir.path().join("fake_news_model");
    let tokenizer_path = dir.path().join("tokenizer.json");
    common::write_model(&model_dir);
    let state = AppState::initialize(config_for(model_dir, tokenizer_path.clone(), LoadMode::Lazy))
        .await
        .unwrap();
    let app = build_router(state.clone());

    let (status, body) = predict(app.clone(), "aliens").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["detail"].as_str().unwrap().starts_with("Tokenizer file not found"));

    // 产物补齐后下一个请求重新加载
    write_tokenizer(&tokenizer_path);
    let (status, body) = predict(app, "aliens").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["label"], "FAKE");
    assert_eq!(state.load_attempts(), 2);
}

#[tokio::test]
async fn eager_missing_artifacts_fail_startup() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(
        dir.path().join("missing_model"),
        dir.path().join("missing_tokenizer.json"),
        LoadMode::Eager,
    );
    let err = AppState::initialize(config).await.unwrap_err();
    assert!(newsclf_core::Error::is_artifact_missing(&err));
}

#[tokio::test]
async fn dummy_fallback_returns_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_for(
        dir.path().join("missing_model"),
        dir.path().join("missing_tokenizer.json"),
        LoadMode::Eager,
    );
    config.loading.dummy_fallback = true;
    let state = AppState::initialize(config).await.unwrap();
    assert!(state.fallback_active());
    let app = build_router(state);

    let (status, body) = predict(app.clone(), "anything at all").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["label"], 1);
    assert_eq!(body["note"], "Model not loaded, returning dummy Fake result");
    assert!((body["confidence"].as_f64().unwrap() - 0.99).abs() < 1e-6);
    assert_eq!(body.as_object().unwrap().len(), 3);

    let (_, ready) = send(app, get("/ready")).await;
    assert_eq!(ready["status"], "fallback");
    assert_eq!(ready["model_loaded"], false);
}

#[tokio::test]
async fn dummy_fallback_with_artifacts_serves_real_predictions() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_with_artifacts(dir.path(), LoadMode::Lazy);
    config.loading.dummy_fallback = true;
    let state = AppState::initialize(config).await.unwrap();
    assert!(!state.fallback_active());
    assert!(state.is_loaded());

    let (_, body) = predict(build_router(state), "aliens landed").await;
    assert_eq!(body["label"], "FAKE");
}

#[tokio::test]
async fn malformed_body_is_rejected() {
    let app = build_router(AppState::new(Default::default()));
    let (status, _) = send(app.clone(), predict_request("{not json")).await;
    assert!(status.is_client_error());

    let (status, _) = send(app, predict_request(r#"{"title": "missing text"}"#)).await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn cors_is_permissive_by_default() {
    let app = build_router(AppState::new(Default::default()));
    let request = Request::builder()
        .uri("/")
        .header(header::ORIGIN, "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "*"
    );
}

#[tokio::test]
async fn cors_can_be_disabled() {
    let mut config = newsclf_server::ServerConfig::default();
    config.http.enable_cors = false;
    let app = build_router(AppState::new(config));
    let request = Request::builder()
        .uri("/")
        .header(header::ORIGIN, "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}
