/*!
 * Mock provider implementations for testing.
 *
 * This module provides mock providers that simulate different behaviors:
 * - `MockProvider::working()` - Translates every `id:::text` line of the prompt
 * - `MockProvider::fixed(text)` - Always returns the same text
 * - `MockProvider::failing()` - Always fails with an API error
 *
 * Streamed requests are answered line by line through the delta sink, with
 * cancellation checked between lines like a real stream reader.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::{ChatRequest, Completion, CompletionContext, Provider};
use crate::errors::ProviderError;
use crate::translation::concurrency::CancellationFlag;
use crate::translation::core::FORMAT_REMINDER;
use crate::translation::lines::{LineEntry, ID_DELIMITER};

/// Prefix the working mock puts in front of every translated text
pub const MOCK_TRANSLATION_PREFIX: &str = "[TRANSLATED] ";

/// Behavior mode for the mock provider
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with a proper `id:::text` translation of every line
    Working,
    /// Returns the same payload for every request
    Fixed(String),
    /// Translates only every other line, leaving the rest out of the response
    PartialIds,
    /// Answers in `id. text` form instead of `id:::text`
    Numbered,
    /// Fails intermittently (every Nth request)
    Intermittent { fail_every: usize },
    /// Always fails with an error
    Failing,
    /// Returns empty response
    Empty,
    /// Simulates slow response
    Slow { delay_ms: u64 },
}

/// Mock provider for testing translation behavior
#[derive(Debug, Clone)]
pub struct MockProvider {
    /// Behavior mode
    behavior: MockBehavior,
    /// Request counter for intermittent failures
    request_count: Arc<AtomicUsize>,
    /// Every request received, in arrival order
    requests: Arc<Mutex<Vec<ChatRequest>>>,
    /// Custom response generator (optional)
    custom_response: Option<fn(&ChatRequest) -> String>,
    /// Set this flag once the given number of requests has completed
    cancel_after: Option<(usize, CancellationFlag)>,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
            custom_response: None,
            cancel_after: None,
        }
    }

    /// Create a working mock provider that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create a mock that always answers with `text`
    pub fn fixed(text: impl Into<String>) -> Self {
        Self::new(MockBehavior::Fixed(text.into()))
    }

    /// Create a mock that drops every other id from its answers
    pub fn partial_ids() -> Self {
        Self::new(MockBehavior::PartialIds)
    }

    /// Create an intermittently failing mock provider
    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every: fail_every.max(1) })
    }

    /// Create a failing mock provider that always errors
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Create a mock that returns empty responses
    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    /// Create a working mock that takes `delay_ms` per request
    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Set a custom response generator
    pub fn with_custom_response(mut self, generator: fn(&ChatRequest) -> String) -> Self {
        self.custom_response = Some(generator);
        self
    }

    /// Cancel `flag` as soon as `requests` requests have been answered
    pub fn cancel_after(mut self, requests: usize, flag: CancellationFlag) -> Self {
        self.cancel_after = Some((requests, flag));
        self
    }

    /// Number of requests received so far
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Copies of every request received so far
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }

    /// Translate every `id:::text` line of a batch prompt
    pub fn translate_prompt(prompt: &str) -> String {
        Self::batch_lines(prompt)
            .filter(|entry| entry.has_id_format)
            .map(|entry| entry.with_text(&format!("{}{}", MOCK_TRANSLATION_PREFIX, entry.original_text)))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The batch lines of a prompt, without the trailing format reminder
    fn batch_lines(prompt: &str) -> impl Iterator<Item = LineEntry> + '_ {
        prompt
            .strip_suffix(FORMAT_REMINDER)
            .unwrap_or(prompt)
            .lines()
            .map(LineEntry::parse)
    }

    fn respond(&self, request: &ChatRequest, count: usize) -> Result<String, ProviderError> {
        let prompt = request.user_prompt().unwrap_or_default();

        if let Some(generator) = self.custom_response {
            return Ok(generator(request));
        }

        match &self.behavior {
            MockBehavior::Working | MockBehavior::Slow { .. } => Ok(Self::translate_prompt(prompt)),

            MockBehavior::Fixed(text) => Ok(text.clone()),

            MockBehavior::PartialIds => Ok(Self::batch_lines(prompt)
                .filter(|entry| entry.has_id_format)
                .step_by(2)
                .map(|entry| entry.with_text(&format!("{}{}", MOCK_TRANSLATION_PREFIX, entry.original_text)))
                .collect::<Vec<_>>()
                .join("\n")),

            MockBehavior::Numbered => Ok(Self::batch_lines(prompt)
                .filter(|entry| entry.has_id_format)
                .map(|entry| format!("{}. {}{}", entry.id, MOCK_TRANSLATION_PREFIX, entry.original_text))
                .collect::<Vec<_>>()
                .join("\n")),

            MockBehavior::Intermittent { fail_every } => {
                if count % fail_every == fail_every - 1 {
                    Err(ProviderError::ApiError {
                        message: format!("Simulated intermittent failure (request #{})", count + 1),
                        status_code: 503,
                    })
                } else {
                    Ok(Self::translate_prompt(prompt))
                }
            }

            MockBehavior::Failing => Err(ProviderError::ApiError {
                message: "Simulated provider failure".to_string(),
                status_code: 500,
            }),

            MockBehavior::Empty => Ok(String::new()),
        }
    }

    fn stream_out(text: &str, context: CompletionContext<'_>) -> Completion {
        let mut content = String::new();
        for line in text.split_inclusive('\n') {
            if context.cancellation.is_cancelled() {
                return Completion { text: content, interrupted: true };
            }
            (context.on_delta)(line);
            content.push_str(line);
        }
        Completion::whole(content)
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(
        &self,
        request: &ChatRequest,
        context: CompletionContext<'_>,
    ) -> Result<Completion, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        if let MockBehavior::Slow { delay_ms } = self.behavior {
            tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
        }

        let result = self.respond(request, count).map(|text| {
            if request.is_stream() {
                Self::stream_out(&text, context)
            } else {
                Completion::whole(text)
            }
        });

        if let Some((limit, flag)) = &self.cancel_after {
            if count + 1 >= *limit {
                flag.cancel();
            }
        }

        result
    }
}

/// Whether `line` looks like the working mock's output for some id
pub fn is_mock_translation(line: &str) -> bool {
    line.split_once(ID_DELIMITER)
        .is_some_and(|(_, text)| text.starts_with(MOCK_TRANSLATION_PREFIX))
}
