use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{Completion, CompletionContext, Provider};
use crate::app_config::TranslationConfig;
use crate::errors::ProviderError;
use crate::translation::parser::{SseDecoder, StreamEvent};

/// Fixed per-request timeout
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Client for OpenAI-compatible chat completion APIs
#[derive(Debug)]
pub struct OpenAICompatible {
    /// HTTP client for API requests
    client: Client,
    /// Full `/chat/completions` URL
    endpoint: String,
    /// Bearer token
    api_key: String,
}

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    /// Role of the message sender (system, user, assistant)
    pub role: String,
    /// Content of the message
    pub content: String,
}

/// Chat completion request body
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// The model to use
    model: String,

    /// The messages for the conversation
    messages: Vec<ChatMessage>,

    /// Temperature for generation
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,

    /// Maximum number of tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,

    /// Top probability mass to consider (nucleus sampling)
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,

    /// Top k tokens to consider, left out unless positive
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,

    /// Whether the response is streamed as server-sent events
    stream: bool,
}

impl Default for ChatRequest {
    fn default() -> Self {
        Self {
            model: String::new(),
            messages: Vec::new(),
            temperature: None,
            max_tokens: None,
            top_p: None,
            top_k: None,
            stream: false,
        }
    }
}

impl ChatRequest {
    /// Create a new request for `model`
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Build the request for one batch prompt from job settings
    pub fn from_config(config: &TranslationConfig, prompt: impl Into<String>) -> Self {
        let mut request = Self::new(&config.model)
            .add_message("system", &config.system_prompt)
            .add_message("user", prompt)
            .temperature(config.temperature)
            .max_tokens(config.max_tokens)
            .top_p(config.top_p)
            .stream(config.stream);
        request.top_k = config.top_k_param();
        request
    }

    /// Add a message to the request
    pub fn add_message(mut self, role: impl Into<String>, content: impl Into<String>) -> Self {
        self.messages.push(ChatMessage {
            role: role.into(),
            content: content.into(),
        });
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the maximum number of generated tokens
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the top_p (nucleus sampling)
    pub fn top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Set the top_k
    pub fn top_k(mut self, top_k: u32) -> Self {
        self.top_k = Some(top_k);
        self
    }

    /// Request a streamed response
    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_stream(&self) -> bool {
        self.stream
    }

    /// Content of the last user message
    pub fn user_prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
    }
}

/// Non-streamed chat completion response
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

/// One completion choice
#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

impl ChatResponse {
    /// Text of the first choice, empty when there is none
    pub fn text(&self) -> String {
        self.choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default()
    }
}

impl OpenAICompatible {
    /// Create a client posting to `endpoint` (the full completions URL)
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }

    /// Create a client for the configured base URL
    pub fn from_config(config: &TranslationConfig) -> Self {
        Self::new(config.completions_url(), &config.api_key)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Drain an event stream, stopping at `[DONE]`, end of body, or cancellation
    async fn read_stream(
        response: reqwest::Response,
        context: CompletionContext<'_>,
    ) -> Result<Completion, ProviderError> {
        let mut decoder = SseDecoder::new();
        let mut content = String::new();
        let mut stream = response.bytes_stream();

        'frames: while let Some(chunk) = stream.next().await {
            if context.cancellation.is_cancelled() {
                debug!("Stream interrupted by cancellation after {} chars", content.len());
                return Ok(Completion { text: content, interrupted: true });
            }

            let chunk = chunk?;
            for event in decoder.push(&chunk) {
                match event {
                    StreamEvent::Delta(delta) => {
                        (context.on_delta)(&delta);
                        content.push_str(&delta);
                    }
                    StreamEvent::Done => break 'frames,
                }
                if context.cancellation.is_cancelled() {
                    return Ok(Completion { text: content, interrupted: true });
                }
            }
        }

        for event in decoder.finish() {
            if let StreamEvent::Delta(delta) = event {
                (context.on_delta)(&delta);
                content.push_str(&delta);
            }
        }

        Ok(Completion::whole(content))
    }
}

#[async_trait]
impl Provider for OpenAICompatible {
    async fn complete(
        &self,
        request: &ChatRequest,
        context: CompletionContext<'_>,
    ) -> Result<Completion, ProviderError> {
        let response = self.client.post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("Completion API error ({}): {}", status, error_text);
            return Err(ProviderError::ApiError {
                status_code: status.as_u16(),
                message: error_text,
            });
        }

        if request.is_stream() {
            Self::read_stream(response, context).await
        } else {
            let body = response.json::<ChatResponse>().await?;
            Ok(Completion::whole(body.text()))
        }
    }
}
