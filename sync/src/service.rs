//! Sync queue coordinating hash fetching and block import.
//!
//! The SyncQueue is the entry point for the peer layer. It owns:
//! - Hash frontier: hashes to request from peers
//! - Pending block queue: downloaded blocks awaiting import
//! - Import worker: background task feeding blocks to the chain

use std::sync::Arc;

use chain::Blockchain;
use containers::{Block, BlockHash, TotalDifficulty};
use metrics::SharedMetrics;
use parking_lot::{Mutex, RwLock};
use storage::{BlockQueue, HashStore};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::{
    config::SyncConfig,
    error::{Result, SyncError},
    import_worker::ImportWorker,
    states::{transition, WorkerState},
};

/// Facade called by network callbacks from any number of threads.
///
/// The stores synchronize themselves. The only state kept here is the last
/// announced block and the highest known total difficulty, each behind its
/// own lock.
pub struct SyncQueue {
    config: SyncConfig,
    chain: Arc<dyn Blockchain>,
    hashes: Arc<dyn HashStore>,
    blocks: Arc<dyn BlockQueue>,
    last_block: RwLock<Option<Block>>,
    highest_total_difficulty: RwLock<TotalDifficulty>,
    worker_state: Arc<Mutex<WorkerState>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    shutdown: watch::Sender<bool>,
    metrics: Option<SharedMetrics>,
}

impl SyncQueue {
    /// Build the queue over already opened stores and start the import worker.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Runtime` when called outside a Tokio runtime.
    pub fn new(
        config: SyncConfig,
        chain: Arc<dyn Blockchain>,
        hashes: Arc<dyn HashStore>,
        blocks: Arc<dyn BlockQueue>,
    ) -> Result<Self> {
        Self::with_metrics(config, chain, hashes, blocks, None)
    }

    pub fn with_metrics(
        config: SyncConfig,
        chain: Arc<dyn Blockchain>,
        hashes: Arc<dyn HashStore>,
        blocks: Arc<dyn BlockQueue>,
        metrics: Option<SharedMetrics>,
    ) -> Result<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|e| SyncError::Runtime(e.to_string()))?;

        // Blocks recovered from disk were announced before the restart.
        let last_block = blocks.peek_back()?;
        if let Some(block) = &last_block {
            info!(
                queue_size = blocks.len(),
                hash_queue_size = hashes.len(),
                last_number = block.number,
                "Resuming from persisted sync queue"
            );
        }

        let worker_state = Arc::new(Mutex::new(WorkerState::default()));
        let (shutdown, shutdown_rx) = watch::channel(false);
        let worker = ImportWorker::new(
            Arc::clone(&chain),
            Arc::clone(&blocks),
            config.no_parent_backoff(),
            Arc::clone(&worker_state),
            metrics.clone(),
        )
        .spawn(&runtime, shutdown_rx);

        Ok(Self {
            config,
            chain,
            hashes,
            blocks,
            last_block: RwLock::new(last_block),
            highest_total_difficulty: RwLock::new(TotalDifficulty::ZERO),
            worker_state,
            worker: Mutex::new(Some(worker)),
            shutdown,
            metrics,
        })
    }

    /// Queue a list of blocks received from a peer.
    ///
    /// Blocks beyond the queue capacity are discarded. The last block of
    /// the list becomes the last announced block either way.
    pub fn add_blocks(&self, blocks: Vec<Block>) -> Result<()> {
        let Some(last) = blocks.last().cloned() else {
            return Err(SyncError::InvalidArgument("block list must not be empty"));
        };

        self.blocks.enqueue_batch(blocks)?;
        let last_number = last.number;
        *self.last_block.write() = Some(last);

        info!(
            queue_size = self.blocks.len(),
            last_number,
            "Blocks waiting to be processed"
        );
        self.update_block_gauge();
        Ok(())
    }

    /// Queue a single block, usually from a new block announcement.
    pub fn add_block(&self, block: Block) -> Result<()> {
        let number = block.number;
        self.blocks.enqueue(block.clone())?;
        *self.last_block.write() = Some(block);

        debug!(
            queue_size = self.blocks.len(),
            last_number = number,
            "Blocks waiting to be processed"
        );
        self.update_block_gauge();
        Ok(())
    }

    /// Last block announced to the queue, or the chain head once the queue
    /// has drained. Never absent, there is always at least genesis.
    pub fn last_block(&self) -> Block {
        if self.blocks.is_empty() {
            return self.chain.best_block();
        }
        self.last_block
            .read()
            .clone()
            .unwrap_or_else(|| self.chain.best_block())
    }

    /// Drop all pending hashes and make `hash` the only sync target.
    pub fn set_best_hash(&self, hash: BlockHash) -> Result<()> {
        self.hashes.reset(hash)?;
        self.update_hash_gauge();
        Ok(())
    }

    /// Front of the frontier.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::EmptyFrontier` when there is nothing to sync.
    pub fn best_hash(&self) -> Result<BlockHash> {
        Ok(self.hashes.peek()?)
    }

    pub fn add_hash(&self, hash: BlockHash) -> Result<()> {
        self.hashes.push_front(hash)?;
        trace!(
            hash = %hash.short(),
            hash_queue_size = self.hashes.len(),
            "Adding hash to hash queue"
        );
        Ok(())
    }

    /// Push announced hashes to the front, skipping blocks already queued.
    pub fn add_hashes(&self, hashes: &[BlockHash]) -> Result<()> {
        for hash in hashes {
            trace!(
                hash = %hash.short(),
                hash_queue_size = self.hashes.len(),
                "Adding hash to hash queue"
            );
        }

        let filtered = self.blocks.filter_existing(hashes);
        if filtered.len() < hashes.len() {
            debug!(
                skipped = hashes.len() - filtered.len(),
                "Skipping hashes of already queued blocks"
            );
        }
        self.hashes.push_front_batch(&filtered)?;
        self.update_hash_gauge();
        Ok(())
    }

    /// Append a hash from a new block announcement. It is fetched after
    /// everything already in the frontier.
    pub fn add_new_block_hash(&self, hash: BlockHash) -> Result<()> {
        self.hashes.push_back(hash)?;
        self.update_hash_gauge();
        Ok(())
    }

    /// Put back hashes from [`SyncQueue::get_hashes`] that no peer delivered.
    ///
    /// `hashes` must be in the order they were handed out; the next
    /// `get_hashes` returns them in that same order.
    pub fn return_hashes(&self, hashes: &[BlockHash]) -> Result<()> {
        if hashes.is_empty() {
            return Ok(());
        }

        info!(count = hashes.len(), "Hashes remained uncovered");
        for hash in hashes {
            debug!(hash = %hash, "Return hash");
        }

        self.hashes.return_batch(hashes)?;
        self.update_hash_gauge();
        Ok(())
    }

    /// Next batch of hashes to fetch, at most `max_blocks_ask` long.
    pub fn get_hashes(&self) -> Result<Vec<BlockHash>> {
        let hashes = self.hashes.drain_front(self.config.max_blocks_ask)?;
        self.update_hash_gauge();
        Ok(hashes)
    }

    pub fn log_hash_queue_size(&self) {
        info!(hash_queue_size = self.hashes.len(), "Block hashes list size");
        self.update_hash_gauge();
    }

    pub fn highest_total_difficulty(&self) -> TotalDifficulty {
        *self.highest_total_difficulty.read()
    }

    pub fn set_highest_total_difficulty(&self, total_difficulty: TotalDifficulty) {
        *self.highest_total_difficulty.write() = total_difficulty;
    }

    /// Number of blocks waiting for import.
    pub fn size(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_hashes_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Empty both stores, keeping them open.
    pub fn clear(&self) -> Result<()> {
        self.hashes.clear()?;
        self.blocks.clear()?;
        self.update_hash_gauge();
        self.update_block_gauge();
        Ok(())
    }

    pub fn hash_store(&self) -> &Arc<dyn HashStore> {
        &self.hashes
    }

    pub fn worker_state(&self) -> WorkerState {
        *self.worker_state.lock()
    }

    /// Stop the import worker and flush both stores.
    ///
    /// An import already in progress runs to completion first.
    pub async fn close(&self) -> Result<()> {
        if self.worker_state().is_running() {
            transition(&self.worker_state, WorkerState::Stopping);
        }
        self.shutdown.send_replace(true);

        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(err) = worker.await {
                warn!(error = %err, "Import worker task ended abnormally");
            }
        }
        transition(&self.worker_state, WorkerState::Stopped);

        self.hashes.close()?;
        self.blocks.close()?;
        info!("Sync queue closed");
        Ok(())
    }

    pub fn stats(&self) -> SyncStats {
        SyncStats {
            hash_queue_size: self.hashes.len(),
            block_queue_size: self.blocks.len(),
            block_queue_capacity: self.blocks.capacity(),
            worker_state: self.worker_state(),
            highest_total_difficulty: self.highest_total_difficulty(),
        }
    }

    fn update_hash_gauge(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.set_hashes_pending(self.hashes.len() as i64);
        }
    }

    fn update_block_gauge(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.set_blocks_pending(self.blocks.len() as i64);
        }
    }
}

impl Drop for SyncQueue {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

/// Statistics about the sync queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncStats {
    pub hash_queue_size: usize,
    pub block_queue_size: usize,
    pub block_queue_capacity: usize,
    pub worker_state: WorkerState,
    pub highest_total_difficulty: TotalDifficulty,
}
