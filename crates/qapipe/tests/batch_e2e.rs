//! End-to-end batch contract: fixture benchmark + model endpoints, real
//! binary, JSONL artifact on disk.

use assert_cmd::Command;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::net::SocketAddr;

fn fixture_app() -> Router {
    Router::new()
        .route(
            "/questions",
            get(|| async {
                Json(serde_json::json!([
                    {"task_id": "e2e-1", "question": "What is the capital of France?"},
                    {"task_id": "e2e-2", "text": "Spell hello backwards"}
                ]))
            }),
        )
        .route(
            "/v1/chat/completions",
            post(|| async {
                Json(serde_json::json!({
                    "choices": [{"message": {
                        "role": "assistant",
                        "content": "Considering the question. FINAL ANSWER: \"Paris.\""
                    }}]
                }))
            }),
        )
}

#[test]
fn batch_writes_ordered_jsonl_artifact() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let addr: SocketAddr = rt.block_on(async {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, fixture_app()).await.unwrap();
        });
        addr
    });

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("answers.jsonl");

    Command::cargo_bin("qapipe")
        .unwrap()
        .args(["batch", "--out"])
        .arg(&out)
        .env("QAPIPE_BENCH_API_URL", format!("http://{addr}"))
        .env("QAPIPE_LLM_BASE_URL", format!("http://{addr}"))
        .env("QAPIPE_LLM_API_KEY", "e2e-key")
        .env("QAPIPE_LLM_MODEL", "e2e-model")
        .env_remove("QAPIPE_TAVILY_API_KEY")
        .env_remove("TAVILY_API_KEY")
        .env_remove("QAPIPE_ENV_FILE")
        .assert()
        .success();

    let body = std::fs::read_to_string(&out).unwrap();
    let records: Vec<serde_json::Value> = body
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["task_id"].as_str(), Some("e2e-1"));
    assert_eq!(records[1]["task_id"].as_str(), Some("e2e-2"));
    // Quote layer and trailing period normalized away by the formatter.
    assert_eq!(records[0]["model_answer"].as_str(), Some("Paris"));
    assert_eq!(records[1]["model_answer"].as_str(), Some("Paris"));
    assert!(records[0]["reasoning_trace"]
        .as_str()
        .unwrap()
        .contains("Considering the question."));
}
