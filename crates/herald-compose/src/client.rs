//! OpenAI-compatible chat completions client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use herald_outreach::{Candidate, ContentGenerator, GenerationError};

use crate::ComposeError;

/// Instructions used when none are configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You write short, friendly, first-contact direct \
messages on Bluesky. Mention something specific from the context you are given, keep it \
under 300 characters, ask one open question, and never include links or hashtags. Reply \
with the message text only.";

/// Where and how to ask for completions.
#[derive(Debug, Clone)]
pub struct ComposeConfig {
    /// Base URL up to and including the API version, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub system_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ComposeConfig {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            model: model.into(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            temperature: 0.8,
            max_tokens: 300,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Generates outreach messages with a chat completions model.
pub struct ChatCompletionGenerator {
    http: Client,
    config: ComposeConfig,
}

impl ChatCompletionGenerator {
    pub fn new(config: ComposeConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &ComposeConfig {
        &self.config
    }

    /// Ask the model for a message to `candidate`.
    pub async fn compose(&self, candidate: &Candidate) -> Result<String, ComposeError> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: self.config.system_prompt.clone(),
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt(candidate),
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let mut builder = self.http.post(&url).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ComposeError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ComposeError::InvalidResponse(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(ComposeError::EmptyContent)?;

        debug!(handle = %candidate.handle, chars = content.chars().count(), "composed message");
        Ok(content)
    }
}

#[async_trait]
impl ContentGenerator for ChatCompletionGenerator {
    async fn generate(&self, candidate: &Candidate) -> Result<String, GenerationError> {
        self.compose(candidate)
            .await
            .map_err(|e| GenerationError(e.to_string()))
    }
}

/// The per-recipient part of the prompt.
pub fn user_prompt(candidate: &Candidate) -> String {
    let context = candidate.context.trim();
    if context.is_empty() {
        format!(
            "Write a message to @{}. There is no context about them.",
            candidate.handle
        )
    } else {
        format!(
            "Write a message to @{}.\n\nContext about them:\n{}",
            candidate.handle, context
        )
    }
}
