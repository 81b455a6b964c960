/*!
 * Core translation client.
 *
 * `TranslationClient` turns one batch of input lines into one completion
 * request, parses whatever comes back, and reconciles the result with the
 * batch by line identifier. Request failures never escape: a failed batch is
 * returned unchanged with a `Failed` status.
 */

use std::sync::Arc;

use log::{debug, error, warn};

use crate::app_config::TranslationConfig;
use crate::errors::ProviderError;
use crate::providers::{ChatRequest, CompletionContext, Provider};

use super::concurrency::{CancellationFlag, RateLimiter};
use super::lines::LineEntry;
use super::parser::{parse_translation_map, TranslationMapping};

/// Appended to every batch prompt
pub const FORMAT_REMINDER: &str = "\n\nREMINDER: Format 'ID:::TranslatedText'.";

/// Marker forwarded once a streamed response has been fully read
pub const STREAM_FINISHED: &str = "\n[Stream Finished]";

/// How a batch request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    /// A response was parsed and reconciled
    Translated,
    /// The request failed; lines are unchanged
    Failed,
    /// Cancellation was observed before or during the request; lines are unchanged
    Cancelled,
}

/// Result lines for one batch, same length and order as the input batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub lines: Vec<String>,
    pub status: BatchStatus,
}

impl BatchOutcome {
    fn unchanged(lines: &[String], status: BatchStatus) -> Self {
        Self {
            lines: lines.to_vec(),
            status,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == BatchStatus::Cancelled
    }
}

/// Build the user prompt for a batch
pub fn build_prompt<S: AsRef<str>>(lines: &[S]) -> String {
    let body = lines.iter().map(AsRef::as_ref).collect::<Vec<_>>().join("\n");
    format!("{}{}", body, FORMAT_REMINDER)
}

/// Match a parsed mapping back onto the batch lines.
///
/// Identifier lines take their mapped text, or keep their original text when
/// the identifier is missing from the mapping. Bare lines are returned as-is.
pub fn reconcile<S: AsRef<str>>(lines: &[S], mapping: &TranslationMapping) -> Vec<String> {
    lines
        .iter()
        .map(|line| {
            let line = line.as_ref();
            let entry = LineEntry::parse(line);
            if !entry.has_id_format {
                return line.to_string();
            }
            match mapping.get(&entry.id) {
                Some(text) => entry.with_text(text),
                None => entry.untranslated(),
            }
        })
        .collect()
}

/// Sends batches to a completion provider on behalf of the workers of one job
#[derive(Debug, Clone)]
pub struct TranslationClient {
    provider: Arc<dyn Provider>,
    config: Arc<TranslationConfig>,
    rate_limiter: Arc<RateLimiter>,
    cancellation: CancellationFlag,
}

impl TranslationClient {
    pub fn new(
        provider: Arc<dyn Provider>,
        config: Arc<TranslationConfig>,
        rate_limiter: Arc<RateLimiter>,
        cancellation: CancellationFlag,
    ) -> Self {
        Self {
            provider,
            config,
            rate_limiter,
            cancellation,
        }
    }

    pub fn config(&self) -> &TranslationConfig {
        &self.config
    }

    /// Translate one batch.
    ///
    /// `log` receives diagnostics meant for the user: API errors, streamed
    /// deltas and completion notices.
    pub async fn translate_batch(
        &self,
        lines: &[String],
        log: &(dyn Fn(&str) + Send + Sync),
    ) -> BatchOutcome {
        if self.cancellation.is_cancelled() {
            return BatchOutcome::unchanged(lines, BatchStatus::Cancelled);
        }
        if lines.is_empty() {
            return BatchOutcome::unchanged(lines, BatchStatus::Translated);
        }

        let request = ChatRequest::from_config(&self.config, build_prompt(lines));

        self.rate_limiter.acquire(self.config.min_request_delay()).await;

        let context = CompletionContext {
            cancellation: &self.cancellation,
            on_delta: log,
        };

        let completion = match self.provider.complete(&request, context).await {
            Ok(completion) => completion,
            Err(ProviderError::ApiError { status_code, message }) => {
                log(&format!("API Error {}: {}", status_code, message));
                return BatchOutcome::unchanged(lines, BatchStatus::Failed);
            }
            Err(e) => {
                error!("Batch request failed: {}", e);
                log(&format!("Exception: {}", e));
                return BatchOutcome::unchanged(lines, BatchStatus::Failed);
            }
        };

        if completion.interrupted {
            debug!("Batch of {} lines interrupted by cancellation", lines.len());
            return BatchOutcome::unchanged(lines, BatchStatus::Cancelled);
        }

        if request.is_stream() {
            log(STREAM_FINISHED);
        } else {
            log(&format!("Received: {} chars", completion.text.chars().count()));
        }

        let mapping = parse_translation_map(&completion.text);
        if mapping.is_empty() {
            warn!("No translated lines found in a response of {} chars", completion.text.len());
        }

        BatchOutcome {
            lines: reconcile(lines, &mapping),
            status: BatchStatus::Translated,
        }
    }
}
