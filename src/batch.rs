//! Commit/reopen transaction scope bounding batch sizes.

use tracing::debug;

use crate::config::BatchSize;
use crate::error::Result;
use crate::graph::{GraphStore, GraphTransaction};

/// Owns the live transaction for one file's load, committing and reopening
/// every `batch_size` entity writes.
///
/// The scope holds exactly one open transaction at a time (a replacement is
/// opened just before the previous one commits). If the scope is dropped
/// mid-file — an error or cancellation — the in-flight transaction's drop
/// discards its staged writes, while previously committed batches persist.
pub struct BatchTransaction<'a, S: GraphStore> {
    store: &'a S,
    tx: S::Tx<'a>,
    batch_size: BatchSize,
    ops: usize,
    batches: u64,
}

impl<'a, S: GraphStore> BatchTransaction<'a, S> {
    /// Opens the first transaction.
    pub fn new(store: &'a S, batch_size: BatchSize) -> Result<Self> {
        Ok(Self {
            store,
            tx: store.begin()?,
            batch_size,
            ops: 0,
            batches: 0,
        })
    }

    /// The currently open transaction.
    pub fn tx(&mut self) -> &mut S::Tx<'a> {
        &mut self.tx
    }

    /// Records one completed entity write; commits and reopens when the
    /// batch bound is reached.
    pub fn bump(&mut self) -> Result<()> {
        self.ops += 1;
        if let BatchSize::Limited(limit) = self.batch_size {
            if self.ops >= limit.get() {
                self.commit_and_reopen()?;
            }
        }
        Ok(())
    }

    fn commit_and_reopen(&mut self) -> Result<()> {
        let next = self.store.begin()?;
        let previous = std::mem::replace(&mut self.tx, next);
        previous.commit()?;
        self.batches += 1;
        self.ops = 0;
        debug!(batches = self.batches, "batch committed");
        Ok(())
    }

    /// Commits any trailing partial batch and returns the total number of
    /// commits performed. An empty trailing transaction is discarded
    /// rather than committed.
    pub fn finish(self) -> Result<u64> {
        if self.ops > 0 {
            self.tx.commit()?;
            Ok(self.batches + 1)
        } else {
            Ok(self.batches)
        }
    }
}
