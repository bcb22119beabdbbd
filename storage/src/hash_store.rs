//! Frontier of block hashes still to be fetched from peers.
//!
//! The frontier is a front-biased work list. Announced hashes are pushed
//! to the front and drained from the front, so the most recently announced
//! chain is requested first. A batch that could not be fetched is returned
//! to the front in its original order.

use std::collections::VecDeque;

use containers::BlockHash;
use parking_lot::Mutex;

use crate::{Result, StoreError};

/// Ordered, shared collection of hashes to fetch.
///
/// Implementations must make every method safe under concurrent callers,
/// and a batch insert must be indivisible with respect to a concurrent
/// drain.
pub trait HashStore: Send + Sync {
    /// Drop every entry, then store `hash` as the only one.
    fn reset(&self, hash: BlockHash) -> Result<()>;

    /// Insert a single hash at the front.
    fn push_front(&self, hash: BlockHash) -> Result<()>;

    /// Insert `hashes` at the front keeping their order, so that draining
    /// `hashes.len()` entries afterwards yields `hashes` again.
    fn push_front_batch(&self, hashes: &[BlockHash]) -> Result<()>;

    /// Append a single hash at the back (drained last).
    fn push_back(&self, hash: BlockHash) -> Result<()>;

    /// Front entry without removing it.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::EmptyFrontier` if there is no entry.
    fn peek(&self) -> Result<BlockHash>;

    /// Remove and return up to `max` entries from the front.
    fn drain_front(&self, max: usize) -> Result<Vec<BlockHash>>;

    /// Put back a batch previously returned by [`HashStore::drain_front`].
    fn return_batch(&self, hashes: &[BlockHash]) -> Result<()> {
        self.push_front_batch(hashes)
    }

    /// Copy of up to `count` entries from the front, leaving them in place.
    fn front(&self, count: usize) -> Result<Vec<BlockHash>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&self) -> Result<()>;

    /// Flush pending writes. The store stays usable.
    fn close(&self) -> Result<()>;
}

/// Volatile [`HashStore`] for tests and ephemeral nodes.
#[derive(Debug, Default)]
pub struct MemoryHashStore {
    hashes: Mutex<VecDeque<BlockHash>>,
}

impl MemoryHashStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HashStore for MemoryHashStore {
    fn reset(&self, hash: BlockHash) -> Result<()> {
        let mut hashes = self.hashes.lock();
        hashes.clear();
        hashes.push_front(hash);
        Ok(())
    }

    fn push_front(&self, hash: BlockHash) -> Result<()> {
        self.hashes.lock().push_front(hash);
        Ok(())
    }

    fn push_front_batch(&self, batch: &[BlockHash]) -> Result<()> {
        let mut hashes = self.hashes.lock();
        for hash in batch.iter().rev() {
            hashes.push_front(*hash);
        }
        Ok(())
    }

    fn push_back(&self, hash: BlockHash) -> Result<()> {
        self.hashes.lock().push_back(hash);
        Ok(())
    }

    fn peek(&self) -> Result<BlockHash> {
        self.hashes
            .lock()
            .front()
            .copied()
            .ok_or(StoreError::EmptyFrontier)
    }

    fn drain_front(&self, max: usize) -> Result<Vec<BlockHash>> {
        let mut hashes = self.hashes.lock();
        let count = max.min(hashes.len());
        Ok(hashes.drain(..count).collect())
    }

    fn front(&self, count: usize) -> Result<Vec<BlockHash>> {
        Ok(self.hashes.lock().iter().take(count).copied().collect())
    }

    fn len(&self) -> usize {
        self.hashes.lock().len()
    }

    fn clear(&self) -> Result<()> {
        self.hashes.lock().clear();
        Ok(())
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}
