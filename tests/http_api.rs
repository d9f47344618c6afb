mod common;

use serde_json::{json, Value};
use tokio::net::TcpListener;

use astro_thesaurus::chat::OFF_TOPIC_REPLY;
use astro_thesaurus::server::{self, HealthResponse, EXAMPLE_PROMPTS};
use common::{app_state, Script};

async fn spawn_server(script: Script) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = app_state(script, false);
    tokio::spawn(async move {
        let _ = server::serve(listener, state).await;
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_health_reports_index_not_ready() {
    let base = spawn_server(Script::Fail).await;
    let health: HealthResponse = reqwest::get(format!("{}/api/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(health.status, "online");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
    assert_eq!(health.model, "scripted");
    assert_eq!(health.rag_docs, 0);
    assert!(!health.ready);
}

#[tokio::test]
async fn test_examples_list() {
    let base = spawn_server(Script::Fail).await;
    let body: Value = reqwest::get(format!("{}/api/examples", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["examples"].as_array().unwrap().len(), EXAMPLE_PROMPTS.len());
}

#[tokio::test]
async fn test_chat_answers_and_gates() {
    let base = spawn_server(Script::Reply("Mars orbits every 1.88 years.".to_string())).await;
    let client = reqwest::Client::new();

    let on_topic: Value = client
        .post(format!("{}/api/chat", base))
        .json(&json!({"message": "What is the orbital period of Mars?"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(on_topic["text"], "Mars orbits every 1.88 years.");

    let off_topic: Value = client
        .post(format!("{}/api/chat", base))
        .json(&json!({"message": "Best pizza in town?"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(off_topic["text"], OFF_TOPIC_REPLY);

    let empty = client
        .post(format!("{}/api/chat", base))
        .json(&json!({"message": "   "}))
        .send()
        .await
        .unwrap();
    assert_eq!(empty.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_simulate_returns_frames() {
    let base = spawn_server(Script::Fail).await;
    let body: Value = reqwest::Client::new()
        .post(format!("{}/api/simulate", base))
        .json(&json!({"prompt": "binary star", "frames": 12}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["scenario"]["source"], "fallback");
    assert_eq!(body["frames"].as_array().unwrap().len(), 12);
    assert_eq!(body["elements"].as_array().unwrap().len(), 1);
}
