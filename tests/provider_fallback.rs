use axum::{
    body::{self, Body},
    http::{HeaderMap, Request, StatusCode},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use er_sql::{
    config::{AppConfig, LlmConfig},
    er::{Entity, ErModel, Relationship, RelationshipKind},
    llm::{providers::mock::generate_mock_sql, SqlSynthesizer},
    web::{app, state::AppState},
};

const API_KEY: &str = "sk-test";

// Serves `router` on an ephemeral port and returns the completions URL
async fn spawn_provider(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}/v1/chat/completions", addr)
}

fn llm_config(api_url: String) -> LlmConfig {
    LlmConfig {
        api_key: Some(API_KEY.to_string()),
        api_url,
        timeout_secs: 5,
        ..AppConfig::default().llm
    }
}

fn shop() -> ErModel {
    ErModel::new(
        vec![
            Entity::new("Users", ["id", "name", "email"]),
            Entity::new("Orders", ["id", "user_id", "total", "status"]),
        ],
        vec![Relationship::new("Users", "Orders", RelationshipKind::OneToMany)],
    )
}

async fn fenced_completion(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let authorized = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        == Some("Bearer sk-test");
    let prompt = body["messages"][1]["content"].as_str().unwrap_or_default();

    if !authorized || !prompt.contains("- Users: id, name, email") {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "bad request" })));
    }

    (
        StatusCode::OK,
        Json(json!({
            "choices": [
                { "message": { "role": "assistant", "content": "```sql\nSELECT name FROM Users;\n```\n" } }
            ]
        })),
    )
}

#[tokio::test]
async fn provider_output_is_unfenced() {
    let url = spawn_provider(Router::new().route("/v1/chat/completions", post(fenced_completion))).await;
    let synthesizer = SqlSynthesizer::new(&llm_config(url)).unwrap();

    let sql = synthesizer.generate(&shop(), "names of all users").await;

    assert_eq!(sql, "SELECT name FROM Users;");
}

#[tokio::test]
async fn server_error_falls_back_to_mock() {
    let router = Router::new().route(
        "/v1/chat/completions",
        post(|| async { (StatusCode::TOO_MANY_REQUESTS, "rate limited") }),
    );
    let url = spawn_provider(router).await;
    let synthesizer = SqlSynthesizer::new(&llm_config(url)).unwrap();
    let description = "orders with status 'pending'";

    let sql = synthesizer.generate(&shop(), description).await;

    assert_eq!(sql, generate_mock_sql(&shop(), description));
    assert!(sql.contains("status = 'pending'"));
}

#[tokio::test]
async fn empty_choices_fall_back_to_mock() {
    let router = Router::new().route(
        "/v1/chat/completions",
        post(|| async { Json(json!({ "choices": [] })) }),
    );
    let url = spawn_provider(router).await;
    let synthesizer = SqlSynthesizer::new(&llm_config(url)).unwrap();

    let sql = synthesizer.generate(&shop(), "show me everything").await;

    assert_eq!(sql, "SELECT * FROM Users;");
}

#[tokio::test]
async fn unreachable_provider_falls_back_to_mock() {
    // Reserve a port, then free it so nothing is listening there
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let synthesizer =
        SqlSynthesizer::new(&llm_config(format!("http://{}/v1/chat/completions", addr))).unwrap();
    let description = "count orders per user";

    let sql = synthesizer.generate(&shop(), description).await;

    assert_eq!(sql, generate_mock_sql(&shop(), description));
}

#[tokio::test]
async fn failing_provider_response_matches_mock_mode() {
    let router = Router::new().route(
        "/v1/chat/completions",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    );
    let url = spawn_provider(router).await;

    let body = json!({
        "erDiagramData": serde_json::to_value(shop()).unwrap(),
        "queryDescription": "count orders per user"
    })
    .to_string();

    let mut responses = Vec::new();
    for synthesizer in [
        SqlSynthesizer::new(&llm_config(url.clone())).unwrap(),
        SqlSynthesizer::mock(),
    ] {
        let router = app(Arc::new(AppState::new(AppConfig::default(), synthesizer)));
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/generate-sql")
                    .header("content-type", "application/json")
                    .body(Body::from(body.clone()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        responses.push(serde_json::from_slice::<Value>(&bytes).unwrap());
    }

    assert_eq!(responses[0], responses[1]);
    assert!(responses[0]["sql"].is_string());
}
