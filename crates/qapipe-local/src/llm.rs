//! OpenAI-compatible chat-completions client.
//!
//! One synchronous call per question: no streaming, no multi-turn follow-up.
//! Credit depletion is surfaced as its own error variant because it is a
//! batch-terminating signal, unlike ordinary call failures.

use crate::env;
use qapipe_core::{ChatModel, Error, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://router.huggingface.co";
const DEFAULT_MODEL: &str = "moonshotai/Kimi-K2-Instruct-0905";
const DEFAULT_TIMEOUT_MS: u64 = 120_000;

fn llm_base_url_from_env() -> Option<String> {
    env("QAPIPE_LLM_BASE_URL")
}

fn llm_api_key_from_env() -> Option<String> {
    env("QAPIPE_LLM_API_KEY").or_else(|| env("HF_API_TOKEN"))
}

fn llm_model_from_env() -> Option<String> {
    env("QAPIPE_LLM_MODEL")
}

#[derive(Debug, Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_ms: u64,
}

impl ChatClient {
    /// The inference credential is required; without it the model client is
    /// unusable and construction fails.
    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = llm_api_key_from_env().ok_or_else(|| {
            Error::NotConfigured("missing QAPIPE_LLM_API_KEY (or HF_API_TOKEN)".to_string())
        })?;
        let base_url = llm_base_url_from_env().unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let model = llm_model_from_env().unwrap_or_else(|| DEFAULT_MODEL.to_string());
        Ok(Self::new(client, base_url, api_key, model))
    }

    pub fn new(client: reqwest::Client, base_url: String, api_key: String, model: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
            model,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint_chat_completions(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn classify_failure(status: reqwest::StatusCode, body: &str) -> Error {
        let lowered = body.to_lowercase();
        if status.as_u16() == 402 || (status.as_u16() == 429 && lowered.contains("credit")) {
            return Error::CreditsExhausted(format!("chat.completions HTTP {status}: {body}"));
        }
        Error::Llm(format!("chat.completions HTTP {status}"))
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionsRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u64,
    stream: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[async_trait::async_trait]
impl ChatModel for ChatClient {
    async fn chat(&self, system: &str, user: &str, max_tokens: u64) -> Result<String> {
        let req = ChatCompletionsRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            max_tokens,
            stream: false,
        };

        let resp = self
            .client
            .post(self.endpoint_chat_completions())
            .timeout(std::time::Duration::from_millis(self.timeout_ms))
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", self.api_key),
            )
            .json(&req)
            .send()
            .await
            .map_err(|e| Error::Llm(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Self::classify_failure(status, &body));
        }

        let parsed: ChatCompletionsResponse =
            resp.json().await.map_err(|e| Error::Llm(e.to_string()))?;
        Ok(parsed
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default())
    }
}
