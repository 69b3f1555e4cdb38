//! OpenAI-compatible chat-completions client implementing [`ContentGenerator`].

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use pagesmith_core::contract::ContentGenerator;
use pagesmith_core::error::GenerationError;
use pagesmith_core::prompt::Prompt;

use crate::load_config::{LlmSection, Secrets};

#[derive(Debug, Deserialize)]
struct Completion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    token: String,
}

impl ChatCompletionsClient {
    pub fn new(llm: &LlmSection, secrets: &Secrets) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(llm.timeout_secs))
            .build()?;
        info!(endpoint = %llm.endpoint, model = %llm.model, "Initialized ChatCompletionsClient");
        Ok(Self {
            http,
            endpoint: llm.endpoint.clone(),
            model: llm.model.clone(),
            temperature: llm.temperature,
            max_tokens: llm.max_tokens,
            token: secrets.llm_api_token.clone(),
        })
    }

    /// Plain string content for text-only prompts, content parts when images are attached.
    fn request_body(&self, prompt: &Prompt) -> Value {
        let content = if prompt.images.is_empty() {
            json!(prompt.text)
        } else {
            let mut parts = vec![json!({ "type": "text", "text": prompt.text })];
            parts.extend(
                prompt
                    .images
                    .iter()
                    .map(|url| json!({ "type": "image_url", "image_url": { "url": url } })),
            );
            Value::Array(parts)
        };
        json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": content }],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        })
    }
}

/// `choices[0].message.content` of a completion response.
fn completion_text(body: &str) -> Result<String, GenerationError> {
    let completion: Completion = serde_json::from_str(body)
        .map_err(|e| GenerationError::UnexpectedResponse(format!("invalid JSON: {e}")))?;
    completion
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| {
            GenerationError::UnexpectedResponse(body.chars().take(300).collect::<String>())
        })
}

#[async_trait]
impl ContentGenerator for ChatCompletionsClient {
    async fn generate(&self, prompt: &Prompt) -> Result<String, GenerationError> {
        info!(
            model = %self.model,
            prompt_len = prompt.text.len(),
            images = prompt.images.len(),
            "Requesting completion"
        );
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Completion request failed");
                GenerationError::Request(e.to_string())
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GenerationError::Request(e.to_string()))?;
        if !status.is_success() {
            error!(status = status.as_u16(), "Completion endpoint returned an error");
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = completion_text(&body)?;
        info!(response_len = text.len(), "Completion received");
        Ok(text)
    }
}
