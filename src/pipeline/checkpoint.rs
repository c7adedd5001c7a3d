//! Intermediate recovery batches written during a crawl.

use tracing::{debug, warn};

use crate::store::{Store, Table};

/// Write a checkpoint every `every` processed pages or rows. Zero disables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointPolicy {
    every: usize,
}

impl CheckpointPolicy {
    pub fn new(every: usize) -> Self {
        Self { every }
    }

    pub fn disabled() -> Self {
        Self { every: 0 }
    }

    pub fn every(&self) -> usize {
        self.every
    }

    /// True once `processed` items have gone by since the last checkpoint.
    pub fn is_due(&self, processed: usize) -> bool {
        self.every > 0 && processed > 0 && processed % self.every == 0
    }
}

/// Persist a recovery batch. Failures are logged, never returned.
pub(crate) fn save(store: &Store, table: &Table, subdir: &str, name: &str) {
    if table.is_empty() {
        return;
    }
    match store.checkpoint(table, subdir, name) {
        Ok(path) => debug!("Checkpoint written: {}", path.display()),
        Err(e) => warn!("Failed to write checkpoint {}: {}", name, e),
    }
}
