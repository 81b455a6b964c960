/*!
 * Batch processing across workers.
 *
 * The data lines of a job are split into contiguous chunks, one per worker.
 * Each `BatchWorker` walks its chunk batch by batch, writes results into the
 * shared output buffer at their global indices and checkpoints after every
 * batch.
 */

use std::sync::Arc;

use log::{debug, error, info};

use super::core::BatchStatus;
use super::lines::{IndexedEntry, WorkChunk};
use super::orchestrator::JobContext;
use super::progress::{ProgressEvent, ProgressReporter};

/// Split `entries` into at most `workers` contiguous chunks of `ceil(T / workers)`
/// entries each. Zero workers is treated as one. Empty chunks are never returned.
pub fn partition(entries: Vec<IndexedEntry>, workers: usize) -> Vec<WorkChunk> {
    let total = entries.len();
    if total == 0 {
        return Vec::new();
    }

    let chunk_size = total.div_ceil(workers.max(1));
    let mut chunks = Vec::with_capacity(total.div_ceil(chunk_size));
    let mut remaining = entries.into_iter().peekable();

    while remaining.peek().is_some() {
        chunks.push(WorkChunk::new(remaining.by_ref().take(chunk_size).collect()));
    }

    chunks
}

/// Lifecycle of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Running,
    /// Left early because the job was cancelled
    Stopped,
    /// Went through its whole chunk
    Finished,
}

/// What a worker did, returned when it ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker_id: usize,
    pub first_index: usize,
    pub last_index: usize,
    /// Lines whose batch was written to the buffer
    pub processed: usize,
    pub total: usize,
    /// Batches whose request failed and were written back unchanged
    pub failed_batches: usize,
    pub state: WorkerState,
}

/// Processes one chunk of the input, batch by batch
pub struct BatchWorker {
    id: usize,
    chunk: WorkChunk,
    context: Arc<JobContext>,
    reporter: Arc<dyn ProgressReporter>,
    state: WorkerState,
}

impl BatchWorker {
    pub fn new(
        id: usize,
        chunk: WorkChunk,
        context: Arc<JobContext>,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self {
            id,
            chunk,
            context,
            reporter,
            state: WorkerState::Idle,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    fn emit(&self, current: usize, message: &str) {
        self.reporter.on_progress(ProgressEvent::status(
            self.id,
            current,
            self.chunk.len(),
            message,
        ));
    }

    /// Run until the chunk is exhausted or cancellation is observed
    pub async fn run(mut self) -> WorkerReport {
        let total = self.chunk.len();
        let first_index = self.chunk.first_index().unwrap_or_default();
        let last_index = self.chunk.last_index().unwrap_or_default();
        let mut processed = 0;
        let mut failed_batches = 0;

        self.state = WorkerState::Running;
        self.emit(0, &format!("Ready. Range: {}-{}", first_index, last_index));
        debug!("Worker {} started on lines {}-{}", self.id, first_index, last_index);

        for batch in self.chunk.batches(self.context.batch_size) {
            if self.context.cancellation.is_cancelled() {
                self.state = WorkerState::Stopped;
                break;
            }

            let lines: Vec<String> = batch.iter().map(|e| e.entry.raw.clone()).collect();
            let reporter = &self.reporter;
            let worker_id = self.id;
            let log = move |message: &str| {
                reporter.on_progress(ProgressEvent::appended(worker_id, processed, total, message));
            };

            let outcome = self.context.client.translate_batch(&lines, &log).await;

            match outcome.status {
                BatchStatus::Cancelled => {
                    self.state = WorkerState::Stopped;
                    break;
                }
                BatchStatus::Failed => failed_batches += 1,
                BatchStatus::Translated => {}
            }

            for (entry, line) in batch.iter().zip(outcome.lines) {
                self.context.buffer.set(entry.index, line);
            }
            processed += batch.len();

            if let Err(e) = self.context.clone().flush_checkpoint().await {
                error!("Worker {}: {}", self.id, e);
            }

            self.emit(processed, "");
        }

        if self.state == WorkerState::Stopped {
            info!("Worker {} stopped after {}/{} lines", self.id, processed, total);
            self.emit(processed, "Stopped.");
        } else {
            self.state = WorkerState::Finished;
            self.emit(total, "Finished.");
        }

        WorkerReport {
            worker_id: self.id,
            first_index,
            last_index,
            processed,
            total,
            failed_batches,
            state: self.state,
        }
    }
}
