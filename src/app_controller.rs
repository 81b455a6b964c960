use anyhow::{Context, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::app_config::Config;
use crate::file_utils::FileManager;
use crate::providers::openai::OpenAICompatible;
use crate::providers::Provider;
use crate::translation::{JobPaths, JobSummary, ProgressEvent, ProgressReporter, TranslationJob};

// @module: Application controller for line file translation

/// Main application controller
pub struct Controller {
    // @field: App configuration
    config: Config,
}

impl Controller {
    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate().context("Configuration validation failed")?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn job_paths(&self) -> JobPaths {
        JobPaths::from_config(&self.config.files)
    }

    /// Run a job against the configured API, with progress bars and Ctrl-C handling
    pub async fn run(&self) -> Result<JobSummary> {
        let provider = Arc::new(OpenAICompatible::from_config(&self.config.translation));
        debug!("Using completion endpoint {}", provider.endpoint());

        let reporter = Arc::new(ProgressBarReporter::new(MultiProgress::new()));
        let result = self.run_with_provider(provider, reporter.clone(), true).await;
        reporter.finish_all();

        result
    }

    /// Run a job with any provider and reporter.
    ///
    /// With `handle_interrupt`, Ctrl-C requests cancellation for the duration of the job.
    pub async fn run_with_provider(
        &self,
        provider: Arc<dyn Provider>,
        reporter: Arc<dyn ProgressReporter>,
        handle_interrupt: bool,
    ) -> Result<JobSummary> {
        let start_time = std::time::Instant::now();
        let paths = self.job_paths();

        for path in [&paths.output, &paths.checkpoint] {
            if let Some(parent) = path.parent() {
                FileManager::ensure_dir(parent)?;
            }
        }

        let job = TranslationJob::new(self.config.translation.clone(), provider)?;

        let interrupt = handle_interrupt.then(|| {
            let cancellation = job.cancellation();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Stop requested, waiting for in-flight batches");
                    cancellation.cancel();
                }
            })
        });

        let result = job.run(&paths, reporter).await;

        if let Some(handle) = interrupt {
            handle.abort();
        }

        let summary = result.with_context(|| format!("Translation of {:?} failed", paths.input))?;
        Self::report(&summary, &paths, start_time.elapsed());

        Ok(summary)
    }

    fn report(summary: &JobSummary, paths: &JobPaths, elapsed: std::time::Duration) {
        if summary.failed_batches() > 0 {
            warn!(
                "{} batch(es) failed and kept their original text",
                summary.failed_batches()
            );
        }

        if summary.cancelled {
            warn!(
                "Stopped after {}/{} lines in {}. Progress is in {}",
                summary.processed(),
                summary.data_lines,
                Self::format_duration(elapsed),
                Self::display(&paths.checkpoint)
            );
        } else {
            info!(
                "Translated {} lines in {}. Output: {}",
                summary.data_lines,
                Self::format_duration(elapsed),
                Self::display(&paths.output)
            );
        }
    }

    fn display(path: &Path) -> String {
        path.display().to_string()
    }

    /// Format a duration as `1h 2m 3s`, `2m 3s` or `3.042s`
    pub fn format_duration(duration: std::time::Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }
}

/// One terminal progress bar per worker
pub struct ProgressBarReporter {
    multi_progress: MultiProgress,
    bars: Mutex<HashMap<usize, ProgressBar>>,
}

impl ProgressBarReporter {
    pub fn new(multi_progress: MultiProgress) -> Self {
        Self {
            multi_progress,
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{prefix}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
            .or_else(|_| ProgressStyle::default_bar().template("[{prefix}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░")
    }

    fn bar_for(&self, event: &ProgressEvent) -> ProgressBar {
        self.bars
            .lock()
            .entry(event.worker_id)
            .or_insert_with(|| {
                let bar = self.multi_progress.add(ProgressBar::new(event.total as u64));
                bar.set_style(Self::style());
                bar.set_prefix(format!("{}", event.worker_id));
                bar
            })
            .clone()
    }

    /// Finish any bar still running
    pub fn finish_all(&self) {
        for bar in self.bars.lock().values() {
            if !bar.is_finished() {
                bar.abandon();
            }
        }
    }
}

impl ProgressReporter for ProgressBarReporter {
    fn on_progress(&self, event: ProgressEvent) {
        if event.append {
            debug!("[worker {}] {}", event.worker_id, event.message.trim_end());
            return;
        }

        let bar = self.bar_for(&event);
        bar.set_length(event.total as u64);
        bar.set_position(event.current as u64);

        if let Some(range) = event.message.strip_prefix("Ready. Range: ") {
            bar.set_prefix(format!("{}: {}", event.worker_id, range));
        }

        if event.message == "Finished." || event.message == "Stopped." {
            bar.finish_with_message(event.message);
        } else if !event.message.is_empty() {
            bar.set_message(event.message);
        }
    }
}
