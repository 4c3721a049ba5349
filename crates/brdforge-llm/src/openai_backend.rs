//! OpenAI-compatible HTTP backend
//!
//! Speaks the chat-completions API: one system message carrying the
//! JSON-only contract, one user message carrying the stage template and
//! the serialized input. The reply content is parsed as JSON, with a
//! brace-slice salvage pass for fenced or prefixed replies.
//!
//! Transport and provider failures do not escape as errors: the backend
//! returns the stage's fallback skeleton with the `_error` marker set,
//! so the stage runner counts the attempt and retries.

use async_trait::async_trait;
use brdforge_config::Config;
use brdforge_utils::types::StageId;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

use crate::fallback::fallback_skeleton;
use crate::prompts::PromptLibrary;
use crate::types::{LlmError, StageBackend};

/// Reserved key attached to fallback payloads on generation failure.
const ERROR_MARKER_KEY: &str = "_error";

// Widest brace-to-brace slice, for replies wrapped in fences or prose.
static JSON_SLICE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("static pattern compiles"));

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Production backend over an OpenAI-compatible chat-completions API.
pub struct OpenAiBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    system_prompt: String,
    temperature: f64,
    prompts: PromptLibrary,
}

impl OpenAiBackend {
    /// Build the backend from configuration.
    ///
    /// # Errors
    /// `LlmError::Misconfiguration` when the HTTP client cannot be
    /// constructed. A missing API key is not an error here; it is
    /// reported per call through the error-marker path so a resumed run
    /// fails at a stage boundary with a durable diagnostic.
    pub fn new(config: &Config) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| LlmError::Misconfiguration(format!("HTTP client: {e}")))?;

        let prompts = match &config.prompts_dir {
            Some(dir) => PromptLibrary::with_overrides(dir.clone()),
            None => PromptLibrary::builtin(),
        };

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.api_base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
            temperature: config.temperature,
            prompts,
        })
    }

    fn api_key(&self) -> Result<&str, LlmError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| LlmError::Misconfiguration("OPENAI_API_KEY is not set".to_string()))?;
        if key.is_empty() || !key.starts_with("sk-") {
            return Err(LlmError::Misconfiguration(
                "OPENAI_API_KEY looks invalid; set a real key".to_string(),
            ));
        }
        Ok(key)
    }

    async fn chat(&self, stage: StageId, input: &Value) -> Result<Value, LlmError> {
        let api_key = self.api_key()?;
        let user_prompt = self.prompts.user_prompt(stage, input);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &self.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &user_prompt,
                },
            ],
            temperature: self.temperature,
        };

        debug!(%stage, model = %self.model, "invoking generation backend");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(LlmError::Provider {
                status: status.as_u16(),
                detail: truncate(&detail, 512),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(LlmError::EmptyResponse)?;

        extract_json(&content)
    }
}

#[async_trait]
impl StageBackend for OpenAiBackend {
    async fn generate(&self, stage: StageId, input: &Value) -> Result<Value, LlmError> {
        match self.chat(stage, input).await {
            Ok(artifact) => Ok(artifact),
            Err(error) => {
                warn!(%stage, %error, "generation call failed; returning error-marker payload");
                let mut payload = fallback_skeleton(stage);
                if let Some(map) = payload.as_object_mut() {
                    map.insert(ERROR_MARKER_KEY.to_string(), Value::String(error.to_string()));
                }
                Ok(payload)
            }
        }
    }
}

/// Parse a model reply as JSON, salvaging the widest `{...}` slice when
/// the reply carries fences or surrounding prose.
fn extract_json(text: &str) -> Result<Value, LlmError> {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Ok(value);
    }
    if let Some(found) = JSON_SLICE.find(text) {
        return serde_json::from_str(found.as_str())
            .map_err(|e| LlmError::MalformedResponse(e.to_string()));
    }
    Err(LlmError::MalformedResponse(format!(
        "no JSON object in reply: {}",
        truncate(text, 128)
    )))
}

fn truncate(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        text.to_string()
    } else {
        let mut end = limit;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &text[..end])
    }
}
