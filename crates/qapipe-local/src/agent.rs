//! The question-answering pipeline: tool decision, optional search, optional
//! file context, one model call, answer normalization.
//!
//! Strictly sequential per question and across the batch. The only failure
//! that escapes [`Agent::answer`] is credit exhaustion; everything else is
//! folded into sentinel text inside the produced record so every question
//! keeps its positional slot in the output.

use crate::{tabular, FileCache};
use qapipe_core::answer::{
    build_user_prompt, extract_final_answer, format_answer, ANSWER_ERROR_SENTINEL,
    SYSTEM_INSTRUCTION,
};
use qapipe_core::context::{render_search_results, ContextBuilder};
use qapipe_core::heuristics::Heuristics;
use qapipe_core::{
    ChatModel, Error, FileOutcome, FileSource, Question, ReasoningTrace, Result, SearchProvider,
    SearchQuery, SubmissionRecord,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Answer recorded when the batch halts on credit exhaustion.
pub const CREDITS_EXHAUSTED_ANSWER: &str = "API credits exhausted";

/// Capability holder: each optional tool is a named slot, checked at
/// construction time rather than by string lookup.
#[derive(Clone, Default)]
pub struct Toolbox {
    pub search: Option<Arc<dyn SearchProvider>>,
    pub files: Option<Arc<dyn FileSource>>,
}

impl Toolbox {
    pub fn empty() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub max_search_results: usize,
    pub answer_max_tokens: u64,
    pub heuristics: Heuristics,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_search_results: 8,
            answer_max_tokens: 2000,
            heuristics: Heuristics::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Answered {
    pub answer: String,
    pub reasoning_trace: String,
}

pub struct Agent {
    model: Arc<dyn ChatModel>,
    tools: Toolbox,
    file_cache: FileCache,
    config: AgentConfig,
}

impl Agent {
    pub fn new(model: Arc<dyn ChatModel>, tools: Toolbox, config: AgentConfig) -> Self {
        Self::with_file_cache(model, tools, config, FileCache::new())
    }

    /// Injectable cache constructor so tests can pre-seed or observe it.
    pub fn with_file_cache(
        model: Arc<dyn ChatModel>,
        tools: Toolbox,
        config: AgentConfig,
        file_cache: FileCache,
    ) -> Self {
        Self {
            model,
            tools,
            file_cache,
            config,
        }
    }

    /// Answer one question, tracing each step taken.
    ///
    /// Only `Error::CreditsExhausted` is returned as an error; any other
    /// model-call failure yields the sentinel answer with the error text as
    /// reasoning.
    pub async fn answer(&self, question: &Question) -> Result<Answered> {
        let mut trace = ReasoningTrace::new();
        trace.push(format!("Question: {}", question.text));

        let decision = self
            .config
            .heuristics
            .decide(&question.text, question.file_name.is_some());
        debug!(task_id = %question.task_id, ?decision, "tool decision");

        let mut context = ContextBuilder::new();

        if decision.needs_search {
            trace.push("determined web search is needed");
            match &self.tools.search {
                Some(search) => {
                    let query = self.config.heuristics.build_query(&question.text);
                    trace.push(format!("Search query: {query}"));
                    let rendered = match search
                        .search(&SearchQuery {
                            query: query.clone(),
                            max_results: Some(self.config.max_search_results),
                            timeout_ms: None,
                        })
                        .await
                    {
                        Ok(resp) => {
                            debug!(results = resp.results.len(), "search completed");
                            render_search_results(&query, &resp.results)
                        }
                        Err(e) => {
                            warn!(error = %e, "search failed");
                            format!("Search failed: {e}")
                        }
                    };
                    context.push_search_results(&rendered);
                    trace.push("search completed");
                }
                None => trace.push("web search unavailable - tool not configured"),
            }
        }

        if decision.needs_file {
            trace.push("determined file reading is needed");
            match &self.tools.files {
                Some(files) => {
                    let outcome = self.file_outcome(files.as_ref(), &question.task_id).await;
                    trace.push(match &outcome {
                        FileOutcome::Tabular { .. } => "file parsed as a table",
                        FileOutcome::PlainText { .. } => "file read as text",
                        FileOutcome::Binary { .. } => "file kept as a binary notice",
                        FileOutcome::Unavailable { .. } => {
                            "file unavailable - answering without it"
                        }
                    });
                    context.push_file(&outcome);
                    trace.push("file processing completed");
                }
                None => trace.push("file reader unavailable - tool not configured"),
            }
        }

        let context_text = context.finish();
        let user_prompt = build_user_prompt(&question.text, &context_text);
        let (raw_answer, reasoning) = match self
            .model
            .chat(SYSTEM_INSTRUCTION, &user_prompt, self.config.answer_max_tokens)
            .await
        {
            Ok(raw) => extract_final_answer(&raw),
            Err(Error::CreditsExhausted(msg)) => return Err(Error::CreditsExhausted(msg)),
            Err(e) => {
                warn!(error = %e, "model call failed");
                (ANSWER_ERROR_SENTINEL.to_string(), e.to_string())
            }
        };
        trace.push(reasoning);

        let answer = format_answer(&raw_answer);
        trace.push(format!("Final formatted answer: {answer}"));

        Ok(Answered {
            answer,
            reasoning_trace: trace.join(),
        })
    }

    async fn file_outcome(&self, files: &dyn FileSource, task_id: &str) -> FileOutcome {
        let bytes = match self.file_cache.get(task_id) {
            Some(bytes) => bytes,
            None => match files.fetch(task_id).await {
                Ok(bytes) => {
                    self.file_cache.put(task_id, bytes.clone());
                    bytes
                }
                Err(e) => {
                    return FileOutcome::Unavailable {
                        reason: e.to_string(),
                    }
                }
            },
        };
        if bytes.is_empty() {
            return FileOutcome::Unavailable {
                reason: "empty response body".to_string(),
            };
        }
        tabular::interpret_file_bytes(&bytes)
    }

    /// Answer every question in input order.
    ///
    /// On credit exhaustion the failing question gets a sentinel record and
    /// the remaining questions are not processed; everything answered so far
    /// is preserved.
    pub async fn run_batch(&self, questions: &[Question]) -> Vec<SubmissionRecord> {
        let mut records = Vec::with_capacity(questions.len());
        for (i, question) in questions.iter().enumerate() {
            info!(
                task_id = %question.task_id,
                index = i + 1,
                total = questions.len(),
                "processing question"
            );
            match self.answer(question).await {
                Ok(answered) => records.push(SubmissionRecord {
                    task_id: question.task_id.clone(),
                    model_answer: answered.answer,
                    reasoning_trace: answered.reasoning_trace,
                }),
                Err(e) => {
                    warn!(
                        error = %e,
                        answered = records.len(),
                        "credits exhausted; halting batch"
                    );
                    records.push(SubmissionRecord {
                        task_id: question.task_id.clone(),
                        model_answer: CREDITS_EXHAUSTED_ANSWER.to_string(),
                        reasoning_trace: e.to_string(),
                    });
                    break;
                }
            }
        }
        records
    }
}
