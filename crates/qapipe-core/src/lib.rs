use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod answer;
pub mod context;
pub mod heuristics;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("search failed: {0}")]
    Search(String),
    #[error("llm failed: {0}")]
    Llm(String),
    #[error("llm credits exhausted: {0}")]
    CreditsExhausted(String),
    #[error("file fetch failed: {0}")]
    File(String),
    #[error("benchmark api failed: {0}")]
    Bench(String),
    #[error("submit failed: {0}")]
    Submit(String),
    #[error("calc failed: {0}")]
    Calc(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// One benchmark question. Immutable once fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub task_id: String,
    pub text: String,
    pub file_name: Option<String>,
}

impl Question {
    /// Probe a benchmark API object for a question.
    ///
    /// Deployments disagree on field names: the identifier may arrive as
    /// `task_id` or `id` (string or number), the text as any of
    /// `Question`/`question`/`text`/`query`. An object with no question text
    /// yields `None`.
    pub fn from_value(v: &serde_json::Value) -> Option<Question> {
        let task_id = v
            .get("task_id")
            .or_else(|| v.get("id"))
            .and_then(|id| match id {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Number(n) => Some(n.to_string()),
                _ => None,
            })?;
        let text = ["Question", "question", "text", "query"]
            .iter()
            .find_map(|k| v.get(*k).and_then(|t| t.as_str()))
            .map(|s| s.to_string())?;
        let file_name = v
            .get("file_name")
            .and_then(|f| f.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        Some(Question {
            task_id,
            text,
            file_name,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    pub max_results: Option<usize>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub url: String,
    pub title: Option<String>,
    pub snippet: Option<String>,
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub provider: String,
    pub timings_ms: BTreeMap<String, u128>,
}

#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse>;
}

/// Single-shot chat completion over a fixed system/user prompt pair.
#[async_trait::async_trait]
pub trait ChatModel: Send + Sync {
    async fn chat(&self, system: &str, user: &str, max_tokens: u64) -> Result<String>;
}

/// Source of question-associated file bytes, keyed by task identifier.
#[async_trait::async_trait]
pub trait FileSource: Send + Sync {
    async fn fetch(&self, task_id: &str) -> Result<Vec<u8>>;
}

/// What became of an associated file, after interpretation.
///
/// Every fetch/parse failure downgrades to a coarser variant; there is no
/// error path out of file handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileOutcome {
    Unavailable {
        reason: String,
    },
    Tabular {
        preview: String,
        columns: Vec<String>,
        total_rows: usize,
    },
    PlainText {
        snippet: String,
        truncated: bool,
    },
    Binary {
        byte_count: usize,
    },
}

/// Ordered, append-only record of the steps taken for one question.
#[derive(Debug, Clone, Default)]
pub struct ReasoningTrace {
    steps: Vec<String>,
}

impl ReasoningTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: impl Into<String>) {
        self.steps.push(step.into());
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Render for reporting. Not machine-parsed downstream.
    pub fn join(&self) -> String {
        self.steps.join(" | ")
    }
}

/// One line of the JSONL answers artifact. Field names are the submission
/// wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub task_id: String,
    pub model_answer: String,
    pub reasoning_trace: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_probe_accepts_task_id_and_question() {
        let v = serde_json::json!({"task_id": "t-1", "Question": "Who?", "file_name": "a.xlsx"});
        let q = Question::from_value(&v).unwrap();
        assert_eq!(q.task_id, "t-1");
        assert_eq!(q.text, "Who?");
        assert_eq!(q.file_name.as_deref(), Some("a.xlsx"));
    }

    #[test]
    fn question_probe_accepts_alternate_field_spellings() {
        for key in ["Question", "question", "text", "query"] {
            let v = serde_json::json!({"id": 7, key: "What?"});
            let q = Question::from_value(&v).unwrap();
            assert_eq!(q.task_id, "7");
            assert_eq!(q.text, "What?");
            assert!(q.file_name.is_none());
        }
    }

    #[test]
    fn question_probe_rejects_missing_text_and_blank_file_name() {
        let v = serde_json::json!({"task_id": "t-2", "answer": "42"});
        assert!(Question::from_value(&v).is_none());

        let v = serde_json::json!({"task_id": "t-3", "question": "Q", "file_name": "  "});
        let q = Question::from_value(&v).unwrap();
        assert!(q.file_name.is_none());
    }

    #[test]
    fn trace_joins_with_pipe_separator() {
        let mut t = ReasoningTrace::new();
        t.push("a");
        t.push("b");
        t.push("c");
        assert_eq!(t.join(), "a | b | c");
    }
}
