/*!
 * Completion API clients.
 *
 * - `openai`: OpenAI-compatible `/chat/completions` client, JSON or streamed
 * - `mock`: in-process provider for tests and dry runs
 */

use async_trait::async_trait;
use std::fmt::Debug;

use crate::errors::ProviderError;
use crate::translation::concurrency::CancellationFlag;

pub use self::openai::{ChatMessage, ChatRequest, ChatResponse};

/// What a provider can observe or report while a request is in flight
#[derive(Clone, Copy)]
pub struct CompletionContext<'a> {
    /// Checked between stream frames
    pub cancellation: &'a CancellationFlag,

    /// Receives each streamed content delta as it arrives
    pub on_delta: &'a (dyn Fn(&str) + Send + Sync),
}

/// Text returned by one completion request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    /// Full response text (accumulated deltas when streaming)
    pub text: String,

    /// Whether streaming stopped early because of cancellation
    pub interrupted: bool,
}

impl Completion {
    pub fn whole(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            interrupted: false,
        }
    }
}

/// Common trait for completion providers
///
/// Implementations issue exactly one request per call and never retry.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// Complete a chat request
    ///
    /// # Arguments
    /// * `request` - The request to send
    /// * `context` - Cancellation flag and delta sink for streamed responses
    ///
    /// # Returns
    /// * `Result<Completion, ProviderError>` - The response text or an error
    async fn complete(
        &self,
        request: &ChatRequest,
        context: CompletionContext<'_>,
    ) -> Result<Completion, ProviderError>;
}

pub mod mock;
pub mod openai;
