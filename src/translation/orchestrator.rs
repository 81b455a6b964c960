/*!
 * Job coordination.
 *
 * A `TranslationJob` reads the input, builds the shared output buffer, writes
 * an initial checkpoint, partitions the data lines across workers and waits
 * for all of them. When the job was not cancelled and every worker finished,
 * the checkpoint is promoted to the output file; otherwise the output file is
 * left untouched.
 */

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{error, info, warn};

use crate::app_config::{FilesConfig, TranslationConfig};
use crate::errors::JobError;
use crate::file_utils::FileManager;
use crate::providers::Provider;

use super::batch::{partition, BatchWorker, WorkerReport, WorkerState};
use super::checkpoint::{CheckpointWriter, OutputBuffer};
use super::concurrency::{CancellationFlag, RateLimiter};
use super::core::TranslationClient;
use super::lines::InputDocument;
use super::progress::ProgressReporter;

/// Files touched by a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPaths {
    pub input: PathBuf,
    pub output: PathBuf,
    pub checkpoint: PathBuf,
}

impl JobPaths {
    pub fn from_config(files: &FilesConfig) -> Self {
        Self {
            input: PathBuf::from(&files.input_file),
            output: PathBuf::from(&files.output_file),
            checkpoint: PathBuf::from(&files.checkpoint_file),
        }
    }
}

/// State shared by all workers of one run
#[derive(Debug)]
pub struct JobContext {
    pub client: TranslationClient,
    pub cancellation: CancellationFlag,
    pub buffer: OutputBuffer,
    pub checkpoint: CheckpointWriter,
    pub batch_size: usize,
}

impl JobContext {
    pub fn new(
        client: TranslationClient,
        cancellation: CancellationFlag,
        buffer: OutputBuffer,
        checkpoint: CheckpointWriter,
        batch_size: usize,
    ) -> Self {
        Self {
            client,
            cancellation,
            buffer,
            checkpoint,
            batch_size: batch_size.max(1),
        }
    }

    /// Write the checkpoint on the blocking pool so file I/O stays off the async workers
    pub async fn flush_checkpoint(self: Arc<Self>) -> Result<(), JobError> {
        let path = self.checkpoint.path().to_path_buf();
        tokio::task::spawn_blocking(move || self.checkpoint.flush(&self.buffer))
            .await
            .map_err(|e| JobError::Checkpoint {
                path,
                source: std::io::Error::other(e),
            })?
    }
}

/// What a finished run did
#[derive(Debug, Clone)]
pub struct JobSummary {
    /// Lines in the input, header included
    pub total_lines: usize,
    /// Lines handed to workers
    pub data_lines: usize,
    pub has_header: bool,
    /// One report per worker, in partition order
    pub workers: Vec<WorkerReport>,
    pub cancelled: bool,
    /// Whether the output file was replaced
    pub output_written: bool,
    /// Final buffer contents
    pub lines: Vec<String>,
}

impl JobSummary {
    /// Lines written by workers
    pub fn processed(&self) -> usize {
        self.workers.iter().map(|w| w.processed).sum()
    }

    pub fn failed_batches(&self) -> usize {
        self.workers.iter().map(|w| w.failed_batches).sum()
    }
}

/// Runs translation jobs with one configuration and provider
#[derive(Debug)]
pub struct TranslationJob {
    config: Arc<TranslationConfig>,
    provider: Arc<dyn Provider>,
    cancellation: CancellationFlag,
}

impl TranslationJob {
    /// Create a job, rejecting settings a run cannot use
    pub fn new(config: TranslationConfig, provider: Arc<dyn Provider>) -> Result<Self, JobError> {
        config
            .validate()
            .map_err(|e| JobError::InvalidConfig(format!("{:#}", e)))?;

        Ok(Self {
            config: Arc::new(config),
            provider,
            cancellation: CancellationFlag::new(),
        })
    }

    /// Use a flag owned by the caller instead of a fresh one
    pub fn with_cancellation(mut self, cancellation: CancellationFlag) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn config(&self) -> &TranslationConfig {
        &self.config
    }

    /// Handle to the flag observed by this job's workers
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancellation.clone()
    }

    /// Ask the running workers to stop after their current batch
    pub fn cancel(&self) {
        info!("Cancellation requested");
        self.cancellation.cancel();
    }

    /// Translate `paths.input`, checkpointing to `paths.checkpoint` and
    /// promoting the result to `paths.output` unless cancelled.
    pub async fn run(
        &self,
        paths: &JobPaths,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Result<JobSummary, JobError> {
        self.cancellation.reset();

        let document = InputDocument::read(&paths.input)?;
        info!("Loaded {} lines from {:?}", document.len(), paths.input);

        let mut summary = self.execute(document, &paths.checkpoint, reporter).await?;

        if summary.cancelled {
            warn!("Job cancelled, {:?} left untouched; progress kept in {:?}", paths.output, paths.checkpoint);
        } else {
            FileManager::replace_with_copy(&paths.checkpoint, &paths.output).map_err(|source| {
                JobError::Output {
                    path: paths.output.clone(),
                    source,
                }
            })?;
            summary.output_written = true;
            info!("Output written to {:?}", paths.output);
        }

        Ok(summary)
    }

    /// Translate in-memory lines, checkpointing to `checkpoint`. No output file is written.
    pub async fn run_lines<I, S>(
        &self,
        lines: I,
        checkpoint: impl AsRef<Path>,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Result<JobSummary, JobError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.cancellation.reset();
        self.execute(InputDocument::from_lines(lines), checkpoint.as_ref(), reporter).await
    }

    async fn execute(
        &self,
        document: InputDocument,
        checkpoint_path: &Path,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Result<JobSummary, JobError> {
        let has_header = document.has_header();
        let checkpoint = CheckpointWriter::new(checkpoint_path);
        let buffer = OutputBuffer::new(document.initial_output());
        checkpoint.flush(&buffer)?;

        let data = document.data_entries();
        let data_lines = data.len();
        let chunks = partition(data, self.config.effective_threads());
        info!(
            "Translating {} lines with {} worker(s), batch size {}",
            data_lines,
            chunks.len(),
            self.config.batch_size
        );

        let client = TranslationClient::new(
            self.provider.clone(),
            self.config.clone(),
            Arc::new(RateLimiter::new()),
            self.cancellation.clone(),
        );
        let context = Arc::new(JobContext::new(
            client,
            self.cancellation.clone(),
            buffer,
            checkpoint,
            self.config.batch_size,
        ));

        let handles: Vec<_> = chunks
            .into_iter()
            .enumerate()
            .map(|(id, chunk)| {
                let worker = BatchWorker::new(id, chunk, context.clone(), reporter.clone());
                tokio::spawn(worker.run())
            })
            .collect();

        let spawned = handles.len();
        let mut workers = Vec::with_capacity(spawned);
        for (id, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(report) => workers.push(report),
                Err(e) => error!("Worker {} task failed: {}", id, e),
            }
        }

        context.clone().flush_checkpoint().await?;

        let failed = spawned - workers.len();
        if failed > 0 {
            return Err(JobError::WorkerFailed {
                failed,
                total: spawned,
                checkpoint: checkpoint_path.to_path_buf(),
            });
        }

        let cancelled = self.cancellation.is_cancelled()
            || workers.iter().any(|w| w.state == WorkerState::Stopped);

        Ok(JobSummary {
            total_lines: document.len(),
            data_lines,
            has_header,
            workers,
            cancelled,
            output_written: false,
            lines: context.buffer.snapshot(),
        })
    }
}
