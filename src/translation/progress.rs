/*!
 * Progress reporting from workers.
 *
 * Workers call `ProgressReporter::on_progress` from their own tasks. The
 * reporter decides where events go: a channel with a single consumer, the
 * log, or a terminal display.
 */

use log::{debug, info};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// One progress notification from a worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub worker_id: usize,

    /// Lines processed so far by this worker
    pub current: usize,

    /// Lines owned by this worker
    pub total: usize,

    pub message: String,

    /// When set, `message` is incremental output to append to a log view
    /// rather than a status line
    pub append: bool,
}

impl ProgressEvent {
    pub fn status(worker_id: usize, current: usize, total: usize, message: impl Into<String>) -> Self {
        Self {
            worker_id,
            current,
            total,
            message: message.into(),
            append: false,
        }
    }

    pub fn appended(worker_id: usize, current: usize, total: usize, message: impl Into<String>) -> Self {
        Self {
            worker_id,
            current,
            total,
            message: message.into(),
            append: true,
        }
    }
}

/// Receiver of worker progress, shared by every worker of a job
pub trait ProgressReporter: Send + Sync {
    fn on_progress(&self, event: ProgressEvent);
}

impl<F> ProgressReporter for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn on_progress(&self, event: ProgressEvent) {
        self(event)
    }
}

/// Forwards events to a single consumer over an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    sender: UnboundedSender<ProgressEvent>,
}

impl ChannelReporter {
    /// Create a reporter and the receiving end for its consumer
    pub fn new() -> (Self, UnboundedReceiver<ProgressEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl ProgressReporter for ChannelReporter {
    fn on_progress(&self, event: ProgressEvent) {
        // The consumer going away must not disturb the workers
        let _ = self.sender.send(event);
    }
}

/// Writes status events to the log; appended output goes to debug level
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ProgressReporter for LogReporter {
    fn on_progress(&self, event: ProgressEvent) {
        if event.append {
            debug!("[worker {}] {}", event.worker_id, event.message.trim_end());
        } else if !event.message.is_empty() {
            info!(
                "[worker {}] {}/{} {}",
                event.worker_id, event.current, event.total, event.message
            );
        } else {
            debug!("[worker {}] {}/{}", event.worker_id, event.current, event.total);
        }
    }
}
