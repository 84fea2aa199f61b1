//! Client for the benchmark question/file/submission API.
//!
//! The API is loose about field names and about failure signaling: file
//! downloads can return an HTTP 200 JSON error body, so success is decided
//! by sniffing the payload, not the status code.

use crate::env;
use qapipe_core::{Error, FileSource, Question, Result, SubmissionRecord};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const SUBMIT_TIMEOUT: Duration = Duration::from_secs(60);
const FILE_FETCH_ATTEMPTS: u32 = 3;
const FILE_FETCH_DELAY: Duration = Duration::from_secs(2);

pub fn bench_api_url_from_env() -> Option<String> {
    env("QAPIPE_BENCH_API_URL")
}

#[derive(Debug, Clone)]
pub struct BenchClient {
    client: reqwest::Client,
    base_url: String,
    file_fetch_attempts: u32,
    file_fetch_delay: Duration,
}

/// Lenient view of the scoring response; deployments differ in which fields
/// they return.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitOutcome {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub correct_count: Option<u64>,
    #[serde(default)]
    pub total_attempted: Option<u64>,
    #[serde(default)]
    pub message: Option<String>,
}

enum FileAttempt {
    Bytes(Vec<u8>),
    /// HTTP 200 whose JSON body carries a `detail` key: an error disguised
    /// as success. Definitive, never retried.
    ApiError(String),
}

impl BenchClient {
    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let base_url = bench_api_url_from_env()
            .ok_or_else(|| Error::NotConfigured("missing QAPIPE_BENCH_API_URL".to_string()))?;
        Ok(Self::new(client, base_url))
    }

    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            file_fetch_attempts: FILE_FETCH_ATTEMPTS,
            file_fetch_delay: FILE_FETCH_DELAY,
        }
    }

    /// Override the file-download retry schedule (tests use a short delay).
    pub fn with_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.file_fetch_attempts = attempts.max(1);
        self.file_fetch_delay = delay;
        self
    }

    /// Fetch the full question set. Entries whose shape yields no question
    /// text are skipped with a warning rather than failing the batch.
    pub async fn questions(&self) -> Result<Vec<Question>> {
        let url = format!("{}/questions", self.base_url);
        debug!(%url, "fetching questions");
        let resp = self
            .client
            .get(&url)
            .timeout(DEFAULT_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::Bench(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Bench(format!("questions HTTP {status}")));
        }
        let raw: Vec<serde_json::Value> = resp
            .json()
            .await
            .map_err(|e| Error::Bench(e.to_string()))?;

        let mut out = Vec::with_capacity(raw.len());
        for (i, v) in raw.iter().enumerate() {
            match Question::from_value(v) {
                Some(q) => out.push(q),
                None => warn!(index = i, "skipping question entry with no text field"),
            }
        }
        Ok(out)
    }

    pub async fn random_question(&self) -> Result<Question> {
        let url = format!("{}/random-question", self.base_url);
        debug!(%url, "fetching random question");
        let resp = self
            .client
            .get(&url)
            .timeout(DEFAULT_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::Bench(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Bench(format!("random-question HTTP {status}")));
        }
        let raw: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| Error::Bench(e.to_string()))?;
        Question::from_value(&raw)
            .ok_or_else(|| Error::Bench("response carries no question text field".to_string()))
    }

    /// Download the file attached to a task.
    ///
    /// Bounded retry with a fixed inter-attempt delay, local to this call:
    /// network errors, non-200 statuses, and empty bodies are retried; a
    /// disguised JSON error body fails immediately.
    pub async fn file(&self, task_id: &str) -> Result<Vec<u8>> {
        let mut last_err = Error::File("no attempts made".to_string());
        for attempt in 1..=self.file_fetch_attempts {
            match self.file_once(task_id).await {
                Ok(FileAttempt::Bytes(bytes)) => return Ok(bytes),
                Ok(FileAttempt::ApiError(detail)) => return Err(Error::File(detail)),
                Err(e) => {
                    warn!(task_id, attempt, error = %e, "file download attempt failed");
                    last_err = e;
                    if attempt < self.file_fetch_attempts {
                        tokio::time::sleep(self.file_fetch_delay).await;
                    }
                }
            }
        }
        Err(last_err)
    }

    async fn file_once(&self, task_id: &str) -> Result<FileAttempt> {
        let url = format!("{}/files/{}", self.base_url, task_id);
        let resp = self
            .client
            .get(&url)
            .timeout(DEFAULT_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::File(e.to_string()))?;

        let status = resp.status();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| Error::File(e.to_string()))?
            .to_vec();

        if content_type.contains("application/json") {
            if let Ok(v) = serde_json::from_slice::<serde_json::Value>(&bytes) {
                if let Some(detail) = v.get("detail") {
                    let detail = detail
                        .as_str()
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| detail.to_string());
                    return Ok(FileAttempt::ApiError(detail));
                }
            }
        }

        if status.is_success() && !bytes.is_empty() {
            debug!(task_id, byte_count = bytes.len(), "file downloaded");
            return Ok(FileAttempt::Bytes(bytes));
        }
        Err(Error::File(format!("HTTP {status} - no file content")))
    }

    /// Submit answers for scoring.
    pub async fn submit(
        &self,
        username: &str,
        agent_code: &str,
        records: &[SubmissionRecord],
    ) -> Result<SubmitOutcome> {
        let url = format!("{}/submit", self.base_url);
        let answers: Vec<serde_json::Value> = records
            .iter()
            .map(|r| {
                serde_json::json!({
                    "task_id": r.task_id,
                    "submitted_answer": r.model_answer,
                })
            })
            .collect();
        let payload = serde_json::json!({
            "username": username,
            "agent_code": agent_code,
            "answers": answers,
        });

        let resp = self
            .client
            .post(&url)
            .timeout(SUBMIT_TIMEOUT)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::Submit(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Submit(format!("submit HTTP {status}")));
        }
        resp.json()
            .await
            .map_err(|e| Error::Submit(e.to_string()))
    }
}

#[async_trait::async_trait]
impl FileSource for BenchClient {
    async fn fetch(&self, task_id: &str) -> Result<Vec<u8>> {
        self.file(task_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::header;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn serve(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn client_for(addr: SocketAddr) -> BenchClient {
        BenchClient::new(reqwest::Client::new(), format!("http://{addr}/"))
            .with_retry(3, Duration::from_millis(10))
    }

    #[tokio::test]
    async fn questions_probe_field_spellings_and_skip_textless_entries() {
        let app = Router::new().route(
            "/questions",
            get(|| async {
                Json(serde_json::json!([
                    {"task_id": "t-1", "question": "Q1"},
                    {"id": 2, "Question": "Q2", "file_name": "data.xlsx"},
                    {"task_id": "t-3"},
                    {"task_id": "t-4", "text": "Q4"}
                ]))
            }),
        );
        let addr = serve(app).await;
        let questions = client_for(addr).questions().await.unwrap();
        assert_eq!(questions.len(), 3);
        assert_eq!(questions[0].task_id, "t-1");
        assert_eq!(questions[1].task_id, "2");
        assert_eq!(questions[1].file_name.as_deref(), Some("data.xlsx"));
        assert_eq!(questions[2].text, "Q4");
    }

    #[tokio::test]
    async fn random_question_without_text_is_a_fetch_failure() {
        let app = Router::new().route(
            "/random-question",
            get(|| async { Json(serde_json::json!({"task_id": "t-1", "answer": "nope"})) }),
        );
        let addr = serve(app).await;
        let err = client_for(addr).random_question().await.unwrap_err();
        assert!(matches!(err, Error::Bench(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn file_disguised_json_error_fails_without_retry() {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = hits.clone();
        let app = Router::new().route(
            "/files/:task_id",
            get(move |Path(_): Path<String>| {
                let hits = hits2.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    (
                        [(header::CONTENT_TYPE, "application/json")],
                        r#"{"detail": "Failed to download file"}"#,
                    )
                }
            }),
        );
        let addr = serve(app).await;
        let err = client_for(addr).file("t-1").await.unwrap_err();
        match err {
            Error::File(detail) => assert_eq!(detail, "Failed to download file"),
            other => panic!("got {other:?}"),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1, "definitive error must not retry");
    }

    #[tokio::test]
    async fn file_retries_transient_failures_then_succeeds() {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = hits.clone();
        let app = Router::new().route(
            "/files/:task_id",
            get(move |Path(_): Path<String>| {
                let hits = hits2.clone();
                async move {
                    let n = hits.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        (
                            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                            Vec::<u8>::new(),
                        )
                    } else {
                        (axum::http::StatusCode::OK, b"payload".to_vec())
                    }
                }
            }),
        );
        let addr = serve(app).await;
        let bytes = client_for(addr).file("t-1").await.unwrap();
        assert_eq!(bytes, b"payload");
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn file_exhausts_attempts_and_reports_last_error() {
        let app = Router::new().route(
            "/files/:task_id",
            get(|| async { (axum::http::StatusCode::NOT_FOUND, "missing") }),
        );
        let addr = serve(app).await;
        let err = client_for(addr).file("t-1").await.unwrap_err();
        match err {
            Error::File(msg) => assert!(msg.contains("404"), "got {msg}"),
            other => panic!("got {other:?}"),
        }
    }

    #[tokio::test]
    async fn submit_posts_wire_shape_and_parses_outcome() {
        let app = Router::new().route(
            "/submit",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["username"].as_str(), Some("alice"));
                assert_eq!(body["agent_code"].as_str(), Some("https://code.example"));
                assert_eq!(
                    body["answers"][0]["submitted_answer"].as_str(),
                    Some("Paris")
                );
                Json(serde_json::json!({
                    "username": "alice",
                    "score": 50.0,
                    "correct_count": 1,
                    "total_attempted": 2,
                    "message": "scored"
                }))
            }),
        );
        let addr = serve(app).await;
        let records = vec![SubmissionRecord {
            task_id: "t-1".to_string(),
            model_answer: "Paris".to_string(),
            reasoning_trace: "trace".to_string(),
        }];
        let outcome = client_for(addr)
            .submit("alice", "https://code.example", &records)
            .await
            .unwrap();
        assert_eq!(outcome.score, Some(50.0));
        assert_eq!(outcome.correct_count, Some(1));
    }
}
