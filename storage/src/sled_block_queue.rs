//! Sled-backed pending block queue.
//!
//! Blocks are bincode-encoded under position keys (see [`crate::db`]).
//! The hash membership index lives in memory and is rebuilt from the tree
//! when the queue is opened.

use async_trait::async_trait;
use containers::{Block, BlockHash};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::block_queue::{admissible, log_dropped, wait_for_block, HashIndex};
use crate::db::{decode_position, encode_position, Positions, BLOCK_QUEUE_TREE};
use crate::{BlockQueue, Result, StoreError};

#[derive(Debug)]
struct QueueState {
    positions: Positions,
    index: HashIndex,
}

/// Persistent [`BlockQueue`].
pub struct SledBlockQueue {
    tree: sled::Tree,
    state: Mutex<QueueState>,
    capacity: usize,
    notify: Notify,
}

impl std::fmt::Debug for SledBlockQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledBlockQueue")
            .field("positions", &self.state.lock().positions)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl SledBlockQueue {
    /// Open the block tree of `db`, recovering whatever was committed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Corruption` if a stored block cannot be decoded.
    pub fn open(db: &sled::Db, capacity: usize) -> Result<Self> {
        let tree = db
            .open_tree(BLOCK_QUEUE_TREE)
            .map_err(|e| StoreError::Database(format!("open block tree: {}", e)))?;
        let positions = Positions::recover(&tree)?;
        let index = Self::scan_index(&tree)?;

        debug!(blocks = positions.len(), capacity, "Opened block queue");

        Ok(Self {
            tree,
            state: Mutex::new(QueueState { positions, index }),
            capacity,
            notify: Notify::new(),
        })
    }

    fn scan_index(tree: &sled::Tree) -> Result<HashIndex> {
        let mut index = HashIndex::default();
        for value in tree.iter().values() {
            let value = value.map_err(|e| StoreError::Database(format!("scan blocks: {}", e)))?;
            index.insert(Self::decode(&value)?.hash);
        }
        Ok(index)
    }

    fn encode(block: &Block) -> Result<Vec<u8>> {
        block
            .to_bytes()
            .map_err(|e| StoreError::Codec(format!("encode block {}: {}", block.number, e)))
    }

    fn decode(value: &[u8]) -> Result<Block> {
        Block::from_bytes(value).map_err(|e| StoreError::Corruption(format!("stored block: {}", e)))
    }
}

#[async_trait]
impl BlockQueue for SledBlockQueue {
    fn enqueue(&self, block: Block) -> Result<()> {
        let value = Self::encode(&block)?;
        {
            let mut state = self.state.lock();
            let tail = state.positions.back_end(1)?;
            self.tree
                .insert(encode_position(state.positions.tail), value)
                .map_err(|e| StoreError::Database(format!("append block: {}", e)))?;
            state.positions.tail = tail;
            state.index.insert(block.hash);
        }
        self.notify.notify_waiters();
        Ok(())
    }

    fn enqueue_batch(&self, blocks: Vec<Block>) -> Result<usize> {
        let incoming = blocks.len();
        let kept = {
            let mut state = self.state.lock();
            let kept = admissible(self.capacity, state.positions.len(), incoming);
            let tail = state.positions.back_end(kept)?;

            let mut batch = sled::Batch::default();
            for (offset, block) in blocks.iter().take(kept).enumerate() {
                let position = state.positions.tail + offset as u64;
                batch.insert(&encode_position(position)[..], Self::encode(block)?);
            }
            self.tree
                .apply_batch(batch)
                .map_err(|e| StoreError::Database(format!("append blocks: {}", e)))?;

            state.positions.tail = tail;
            for block in blocks.iter().take(kept) {
                state.index.insert(block.hash);
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
        let (key, value) = self
            .tree
            .pop_min()
            .map_err(|e| StoreError::Database(format!("pop block: {}", e)))?
            .ok_or(StoreError::EmptyQueue)?;

        state.positions.pop_front(decode_position(&key)?);

        match Self::decode(&value) {
            Ok(block) => {
                state.index.remove(&block.hash);
                Ok(block)
            }
            Err(err) => {
                // The hash of the dropped entry is unknown, recount from what is left.
                state.index = Self::scan_index(&self.tree).unwrap_or_else(|scan_err| {
                    warn!(error = %scan_err, "Failed to rebuild block index, starting empty");
                    HashIndex::default()
                });
                Err(err)
            }
        }
    }

    async fn dequeue(&self) -> Result<Block> {
        wait_for_block(&self.notify, || self.poll()).await
    }

    fn peek_back(&self) -> Result<Option<Block>> {
        let _state = self.state.lock();
        self.tree
            .last()
            .map_err(|e| StoreError::Database(format!("peek block: {}", e)))?
            .map(|(_, value)| Self::decode(&value))
            .transpose()
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
        self.state.lock().positions.len()
    }

    fn clear(&self) -> Result<()> {
        let mut state = self.state.lock();
        let mut batch = sled::Batch::default();
        for key in self.tree.iter().keys() {
            batch.remove(key.map_err(|e| StoreError::Database(format!("scan blocks: {}", e)))?);
        }
        self.tree
            .apply_batch(batch)
            .map_err(|e| StoreError::Database(format!("clear blocks: {}", e)))?;
        state.positions.reset();
        state.index.clear();
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.tree
            .flush()
            .map_err(|e| StoreError::Database(format!("flush blocks: {}", e)))?;
        Ok(())
    }
}
