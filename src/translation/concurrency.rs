/*!
 * Shared coordination primitives for a translation job.
 *
 * - `RateLimiter`: one outbound request slot shared by every worker
 * - `CancellationFlag`: cooperative, monotonic stop signal
 */

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::debug;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Enforces a minimum spacing between the starts of consecutive requests.
///
/// The timestamp is shared by all workers, so adding workers raises response
/// processing parallelism but never the request rate.
#[derive(Debug, Default)]
pub struct RateLimiter {
    /// Start of the most recently granted acquisition
    last_grant: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until `min_delay` has passed since the previous grant, then record
    /// and return this grant's start time.
    ///
    /// The lock is held while sleeping, so waiting and updating the timestamp
    /// form one critical section.
    pub async fn acquire(&self, min_delay: Duration) -> Instant {
        let mut last_grant = self.last_grant.lock().await;

        if let Some(previous) = *last_grant {
            let elapsed = previous.elapsed();
            if elapsed < min_delay {
                let wait = min_delay - elapsed;
                debug!("Rate limiter waiting {:?}", wait);
                tokio::time::sleep(wait).await;
            }
        }

        let now = Instant::now();
        *last_grant = Some(now);
        now
    }
}

/// Stop signal shared by the coordinator, the workers and stream readers.
///
/// Once set it stays set until `reset`, which only happens when a new job run
/// starts.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clear the flag for a new job
    pub(crate) fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}
