/*!
 * Concurrent batch translation of `id:::text` line files.
 *
 * The pipeline is split into several submodules:
 *
 * - `lines`: Input line model, work chunks and the loaded document
 * - `parser`: Response parsing and server-sent-event decoding
 * - `concurrency`: Shared rate limiter and cancellation flag
 * - `core`: Per-batch translation client and reconciliation
 * - `checkpoint`: Shared output buffer and checkpoint persistence
 * - `batch`: Partitioning and the per-chunk worker
 * - `progress`: Progress events and reporters
 * - `orchestrator`: Job coordination from input file to output file
 */

// Re-export main types for easier usage
pub use self::batch::{partition, BatchWorker, WorkerReport, WorkerState};
pub use self::concurrency::{CancellationFlag, RateLimiter};
pub use self::core::{BatchOutcome, BatchStatus, TranslationClient};
pub use self::lines::{InputDocument, LineEntry};
pub use self::orchestrator::{JobPaths, JobSummary, TranslationJob};
pub use self::parser::{parse_translation_map, TranslationMapping};
pub use self::progress::{ChannelReporter, LogReporter, ProgressEvent, ProgressReporter};

// Submodules
pub mod batch;
pub mod checkpoint;
pub mod concurrency;
pub mod core;
pub mod lines;
pub mod orchestrator;
pub mod parser;
pub mod progress;
