// Drives the HTTP API in-process against a mocked classification pipeline.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use innervoice::config::CorsConfig;
use innervoice::server::{self, AppState};
use innervoice::{ClassifierLoader, EmotionClassifier, LabelScore, TextClassifier};

enum Behavior {
    Scores(Vec<LabelScore>),
    Fail(&'static str),
}

struct MockPipeline(Behavior);

impl TextClassifier for MockPipeline {
    fn classify(&self, _text: &str) -> anyhow::Result<Vec<LabelScore>> {
        match &self.0 {
            Behavior::Scores(scores) => Ok(scores.clone()),
            Behavior::Fail(message) => anyhow::bail!("{message}"),
        }
    }
}

struct MockLoader {
    pipeline: Arc<MockPipeline>,
    loads: Arc<AtomicUsize>,
    delay: Duration,
}

#[async_trait]
impl ClassifierLoader for MockLoader {
    fn cache_key(&self) -> String {
        "mock-emotion".to_string()
    }

    async fn load(&self) -> anyhow::Result<Arc<dyn TextClassifier>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        let pipeline: Arc<dyn TextClassifier> = self.pipeline.clone();
        Ok(pipeline)
    }
}

fn happy_scores() -> Vec<LabelScore> {
    vec![
        LabelScore::new("happy", 0.9),
        LabelScore::new("sad", 0.05),
        LabelScore::new("angry", 0.02),
        LabelScore::new("anxious", 0.01),
        LabelScore::new("calm", 0.01),
        LabelScore::new("neutral", 0.01),
    ]
}

fn app_with(behavior: Behavior, delay: Duration) -> (Router, Arc<AtomicUsize>) {
    limited_app_with(behavior, delay, None)
}

fn limited_app_with(
    behavior: Behavior,
    delay: Duration,
    body_limit: Option<usize>,
) -> (Router, Arc<AtomicUsize>) {
    let loads = Arc::new(AtomicUsize::new(0));
    let loader = MockLoader {
        pipeline: Arc::new(MockPipeline(behavior)),
        loads: loads.clone(),
        delay,
    };
    let state = Arc::new(AppState::new(EmotionClassifier::new(loader)));
    let app = server::app(state, &CorsConfig::default(), body_limit)
        .expect("default CORS config is valid");
    (app, loads)
}

fn happy_app() -> (Router, Arc<AtomicUsize>) {
    app_with(Behavior::Scores(happy_scores()), Duration::ZERO)
}

fn analyze_request(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/analyze")
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn analyze(app: Router, body: Value) -> (StatusCode, Value) {
    send(app, analyze_request(body.to_string())).await
}

#[tokio::test]
async fn root_reports_liveness() {
    let (app, loads) = happy_app();
    let request = Request::builder().uri("/").body(Body::empty()).unwrap();

    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "InnerVoice API is running"}));
    assert_eq!(loads.load(Ordering::SeqCst), 0, "liveness must not load the model");
}

#[tokio::test]
async fn analyze_returns_best_label_and_distribution() {
    let (app, _) = happy_app();

    let (status, body) = analyze(app, json!({"text": "I am feeling very happy today!"})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["label"], "happy");
    let confidence = body["confidence"].as_f64().unwrap();
    assert!((confidence - 0.9).abs() < 1e-6);
    assert!((0.0..=1.0).contains(&confidence));

    let all = body["all"].as_array().unwrap();
    assert_eq!(all.len(), 6);
    assert!(all.iter().any(|entry| entry["label"] == body["label"]));
}

#[tokio::test]
async fn blank_text_is_a_bad_request() {
    for text in ["", "   ", "\n\t "] {
        let (app, loads) = happy_app();

        let (status, body) = analyze(app, json!({ "text": text })).await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "{text:?}");
        assert_eq!(body["detail"], "Text cannot be empty");
        assert_eq!(loads.load(Ordering::SeqCst), 0);
    }
}

#[tokio::test]
async fn malformed_bodies_are_unprocessable() {
    let bodies = [
        json!({}),
        json!({"message": "hello"}),
        json!({"text": 42}),
        json!({"text": null}),
        json!({"text": ["hello"]}),
    ];
    for body in bodies {
        let (app, loads) = happy_app();

        let (status, response) = analyze(app, body.clone()).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");
        assert!(response["detail"].is_string(), "{body}");
        assert_eq!(loads.load(Ordering::SeqCst), 0);
    }
}

#[tokio::test]
async fn unparseable_json_is_unprocessable() {
    let (app, _) = happy_app();

    let (status, body) = send(app, analyze_request("{\"text\": ")).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn missing_content_type_is_unprocessable() {
    for content_type in [None, Some("text/plain")] {
        let (app, loads) = happy_app();
        let mut request = Request::builder().method(Method::POST).uri("/analyze");
        if let Some(content_type) = content_type {
            request = request.header(header::CONTENT_TYPE, content_type);
        }
        let body = json!({"text": "I am feeling very happy today!"}).to_string();

        let (status, response) = send(app, request.body(Body::from(body)).unwrap()).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{content_type:?}");
        assert!(response["detail"].is_string());
        assert_eq!(loads.load(Ordering::SeqCst), 0);
    }
}

#[tokio::test]
async fn bodies_over_two_megabytes_are_classified() {
    let (app, _) = happy_app();
    let text = "I am feeling very happy today! ".repeat(100_000);
    assert!(text.len() > 2 * 1024 * 1024);

    let (status, body) = analyze(app, json!({ "text": text })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["label"], "happy");
}

#[tokio::test]
async fn configured_body_limit_rejects_with_payload_too_large() {
    let (app, loads) = limited_app_with(
        Behavior::Scores(happy_scores()),
        Duration::ZERO,
        Some(1024),
    );
    let text = "I am feeling very happy today! ".repeat(100);

    let (status, body) = analyze(app, json!({ "text": text })).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(body["detail"].is_string());
    assert_eq!(loads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn identical_text_gives_identical_results() {
    let (app, loads) = happy_app();
    let body = json!({"text": "Nothing much happened today."});

    let (_, first) = analyze(app.clone(), body.clone()).await;
    let (_, second) = analyze(app, body).await;

    assert_eq!(first["label"], second["label"]);
    assert_eq!(first["confidence"], second["confidence"]);
    assert_eq!(loads.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_requests_load_once() {
    let (app, loads) = app_with(Behavior::Scores(happy_scores()), Duration::from_millis(50));

    let requests = (0..16).map(|i| {
        let app = app.clone();
        tokio::spawn(async move { analyze(app, json!({ "text": format!("request {i}") })).await })
    });
    let responses = futures::future::join_all(requests).await;

    for response in responses {
        let (status, body) = response.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["label"], "happy");
    }
    assert_eq!(loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn empty_pipeline_output_degrades_to_unknown() {
    let (app, _) = app_with(Behavior::Scores(Vec::new()), Duration::ZERO);

    let (status, body) = analyze(app, json!({"text": "asdf"})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["label"], "unknown");
    assert_eq!(body["confidence"], 0.0);
}

#[tokio::test]
async fn malformed_pipeline_output_degrades_to_unknown() {
    let scores = vec![LabelScore::new("", 0.8), LabelScore::new("sad", f32::INFINITY)];
    let (app, _) = app_with(Behavior::Scores(scores), Duration::ZERO);

    let (status, body) = analyze(app, json!({"text": "asdf"})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["label"], "unknown");
    assert_eq!(body["confidence"], 0.0);
}

#[tokio::test]
async fn pipeline_errors_are_internal_errors() {
    let (app, _) = app_with(Behavior::Fail("tensor shape mismatch"), Duration::ZERO);

    let (status, body) = analyze(app, json!({"text": "I am feeling very happy today!"})).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["detail"], "tensor shape mismatch");
}

#[tokio::test]
async fn long_and_non_ascii_text_is_accepted() {
    let (app, _) = happy_app();
    let text = "今日はとても嬉しい 😊 ".repeat(2_000);

    let (status, body) = analyze(app, json!({ "text": text })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["label"], "happy");
}

fn preflight(origin: &str) -> Request<Body> {
    Request::builder()
        .method(Method::OPTIONS)
        .uri("/analyze")
        .header(header::ORIGIN, origin)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn cors_preflight_from_allowed_origins() {
    for origin in [
        "http://localhost:5173",
        "https://innervoice.vercel.app",
        "https://feature-branch.vercel.app",
    ] {
        let (app, _) = happy_app();

        let response = app.oneshot(preflight(origin)).await.unwrap();
        let headers = response.headers();

        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            origin,
            "{origin}"
        );
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
            "true"
        );
    }
}

#[tokio::test]
async fn cors_preflight_from_other_origins() {
    let (app, _) = happy_app();

    let response = app.oneshot(preflight("https://evil.example.com")).await.unwrap();

    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}
