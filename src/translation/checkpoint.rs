/*!
 * Shared output buffer and checkpoint persistence.
 */

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use log::debug;
use parking_lot::Mutex;

use crate::errors::JobError;
use crate::file_utils::FileManager;

/// One slot per input line, indexed like the input.
///
/// Each slot is written by exactly one worker for the whole job; the per-slot
/// lock only lets the checkpoint writer read a slot while its owner may be
/// writing it.
#[derive(Debug, Default)]
pub struct OutputBuffer {
    slots: Vec<Mutex<String>>,
}

impl OutputBuffer {
    pub fn new(initial: Vec<String>) -> Self {
        Self {
            slots: initial.into_iter().map(Mutex::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Overwrite slot `index`. Out-of-range indices are ignored.
    pub fn set(&self, index: usize, value: String) {
        if let Some(slot) = self.slots.get(index) {
            *slot.lock() = value;
        }
    }

    pub fn get(&self, index: usize) -> Option<String> {
        self.slots.get(index).map(|slot| slot.lock().clone())
    }

    /// Copy of every slot in index order
    pub fn snapshot(&self) -> Vec<String> {
        self.slots.iter().map(|slot| slot.lock().clone()).collect()
    }
}

/// Rewrites the checkpoint file with the full buffer after every batch
#[derive(Debug)]
pub struct CheckpointWriter {
    path: PathBuf,
    /// Serialises writers across workers
    write_lock: Mutex<()>,
    flushes: AtomicUsize,
}

impl CheckpointWriter {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
            flushes: AtomicUsize::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of completed flushes
    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    /// Write a complete snapshot of `buffer`, one slot per line.
    ///
    /// The file is replaced by rename before the lock is released.
    pub fn flush(&self, buffer: &OutputBuffer) -> Result<(), JobError> {
        let _guard = self.write_lock.lock();

        let snapshot = buffer.snapshot();
        FileManager::write_lines_atomic(&self.path, &snapshot).map_err(|source| {
            JobError::Checkpoint {
                path: self.path.clone(),
                source,
            }
        })?;

        let count = self.flushes.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Checkpoint #{} written: {} lines to {:?}", count, snapshot.len(), self.path);
        Ok(())
    }
}
