//! Queue of downloaded blocks waiting to be imported.
//!
//! FIFO for import. Bulk appends are bounded by the queue capacity: the
//! prefix that fits is kept and the rest is dropped. Single appends are
//! never dropped, so a block put back after a failed import always lands.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use containers::{Block, BlockHash};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::warn;

use crate::{Result, StoreError};

/// Shared queue of blocks pending import.
#[async_trait]
pub trait BlockQueue: Send + Sync {
    /// Append one block at the tail.
    fn enqueue(&self, block: Block) -> Result<()>;

    /// Append the prefix of `blocks` that fits under the capacity.
    ///
    /// Returns how many blocks were kept.
    fn enqueue_batch(&self, blocks: Vec<Block>) -> Result<usize>;

    /// Pop the front block without waiting.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::EmptyQueue` if there is no block.
    fn poll(&self) -> Result<Block>;

    /// Pop the front block, waiting until one is available.
    async fn dequeue(&self) -> Result<Block>;

    /// Most recently appended block still in the queue.
    fn peek_back(&self) -> Result<Option<Block>>;

    /// The hashes of `hashes` whose block is not queued, in input order.
    fn filter_existing(&self, hashes: &[BlockHash]) -> Vec<BlockHash>;

    fn contains(&self, hash: &BlockHash) -> bool;

    fn capacity(&self) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&self) -> Result<()>;

    /// Flush pending writes. The queue stays usable.
    fn close(&self) -> Result<()>;
}

/// Multiset of queued block hashes.
///
/// The same block can be queued twice (a retry racing a fresh delivery),
/// so entries are reference counted.
#[derive(Debug, Default, Clone)]
pub(crate) struct HashIndex {
    counts: HashMap<BlockHash, usize>,
}

impl HashIndex {
    pub fn insert(&mut self, hash: BlockHash) {
        *self.counts.entry(hash).or_insert(0) += 1;
    }

    pub fn remove(&mut self, hash: &BlockHash) {
        if let Some(count) = self.counts.get_mut(hash) {
            *count -= 1;
            if *count == 0 {
                self.counts.remove(hash);
            }
        }
    }

    pub fn contains(&self, hash: &BlockHash) -> bool {
        self.counts.contains_key(hash)
    }

    pub fn filter_missing(&self, hashes: &[BlockHash]) -> Vec<BlockHash> {
        hashes
            .iter()
            .filter(|hash| !self.contains(hash))
            .copied()
            .collect()
    }

    pub fn clear(&mut self) {
        self.counts.clear();
    }
}

/// Number of incoming blocks that fit into a queue of `len` out of `capacity`.
pub(crate) fn admissible(capacity: usize, len: usize, incoming: usize) -> usize {
    capacity.saturating_sub(len).min(incoming)
}

pub(crate) fn log_dropped(kept: usize, incoming: usize, capacity: usize) {
    if kept < incoming {
        warn!(
            kept,
            dropped = incoming - kept,
            capacity,
            "Block queue full, dropping excess blocks"
        );
    }
}

/// Retry `poll` until it yields something other than `EmptyQueue`.
///
/// The `Notified` future is created before polling, so an append that
/// lands between the poll and the await still wakes us.
pub(crate) async fn wait_for_block<F>(notify: &Notify, mut poll: F) -> Result<Block>
where
    F: FnMut() -> Result<Block> + Send,
{
    loop {
        let notified = notify.notified();
        match poll() {
            Err(StoreError::EmptyQueue) => notified.await,
            other => return other,
        }
    }
}

#[derive(Debug, Default)]
struct MemoryQueueState {
    blocks: VecDeque<Block>,
    index: HashIndex,
}

/// Volatile [`BlockQueue`] for tests and ephemeral nodes.
#[derive(Debug)]
pub struct MemoryBlockQueue {
    state: Mutex<MemoryQueueState>,
    capacity: usize,
    notify: Notify,
}

impl MemoryBlockQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(MemoryQueueState::default()),
            capacity,
            notify: Notify::new(),
        }
    }
}

#[async_trait]
impl BlockQueue for MemoryBlockQueue {
    fn enqueue(&self, block: Block) -> Result<()> {
        {
            let mut state = self.state.lock();
            state.index.insert(block.hash);
            state.blocks.push_back(block);
        }
        self.notify.notify_waiters();
        Ok(())
    }

    fn enqueue_batch(&self, blocks: Vec<Block>) -> Result<usize> {
        let incoming = blocks.len();
        let kept = {
            let mut state = self.state.lock();
            let kept = admissible(self.capacity, state.blocks.len(), incoming);
            for block in blocks.into_iter().take(kept) {
                state.index.insert(block.hash);
                state.blocks.push_back(block);
            }
            kept
        };

        log_dropped(kept, incoming, self.capacity);
        if kept > 0 {
            self.notify.notify_waiters();
        }
        Ok(kept)
    }

    fn poll(&self) -> Result<Block> {
        let mut state = self.state.lock();
        let block = state.blocks.pop_front().ok_or(StoreError::EmptyQueue)?;
        state.index.remove(&block.hash);
        Ok(block)
    }

    async fn dequeue(&self) -> Result<Block> {
        wait_for_block(&self.notify, || self.poll()).await
    }

    fn peek_back(&self) -> Result<Option<Block>> {
        Ok(self.state.lock().blocks.back().cloned())
    }

    fn filter_existing(&self, hashes: &[BlockHash]) -> Vec<BlockHash> {
        self.state.lock().index.filter_missing(hashes)
    }

    fn contains(&self, hash: &BlockHash) -> bool {
        self.state.lock().index.contains(hash)
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn len(&self) -> usize {
        self.state.lock().blocks.len()
    }

    fn clear(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.blocks.clear();
        state.index.clear();
        Ok(())
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}
