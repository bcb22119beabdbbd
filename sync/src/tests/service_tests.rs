use std::sync::Arc;

use chain::Blockchain;
use containers::TotalDifficulty;
use pretty_assertions::assert_eq;
use storage::{
    open_db, BlockQueue, HashStore, MemoryBlockQueue, MemoryHashStore, SledBlockQueue,
    SledHashStore,
};
use tempfile::TempDir;

use super::{create_test_block, hash, retry_open, test_config, wait_until, MockChain};
use crate::{SyncError, SyncQueue, WorkerState};

fn memory_queue(chain: &Arc<MockChain>) -> SyncQueue {
    SyncQueue::new(
        test_config(),
        chain.clone(),
        Arc::new(MemoryHashStore::new()),
        Arc::new(MemoryBlockQueue::new(test_config().max_blocks_queued)),
    )
    .unwrap()
}

/// Park the worker on an import of `blocker` so later blocks stay queued.
async fn park_worker(queue: &SyncQueue, chain: &MockChain) {
    queue.add_block(create_test_block(100)).unwrap();
    wait_until(|| chain.attempts() == vec![100]).await;
    assert_eq!(queue.size(), 0);
}

#[test]
fn test_creation_outside_runtime_is_an_error() {
    let chain = Arc::new(MockChain::new());
    let result = SyncQueue::new(
        test_config(),
        chain,
        Arc::new(MemoryHashStore::new()),
        Arc::new(MemoryBlockQueue::new(10)),
    );

    assert!(matches!(result, Err(SyncError::Runtime(_))));
}

#[tokio::test]
async fn test_sync_queue_creation() {
    let chain = Arc::new(MockChain::new());
    let queue = memory_queue(&chain);

    assert_eq!(queue.worker_state(), WorkerState::Running);
    assert_eq!(queue.size(), 0);
    assert!(queue.is_hashes_empty());
}

#[tokio::test]
async fn test_best_hash_then_batch_then_drain() {
    let chain = Arc::new(MockChain::new());
    let queue = memory_queue(&chain);

    queue.set_best_hash(hash(0)).unwrap();
    assert_eq!(queue.hash_store().front(10).unwrap(), vec![hash(0)]);

    queue.add_hashes(&[hash(1), hash(2)]).unwrap();
    assert_eq!(
        queue.hash_store().front(10).unwrap(),
        vec![hash(1), hash(2), hash(0)]
    );

    assert_eq!(queue.get_hashes().unwrap(), vec![hash(1), hash(2)]);
    assert_eq!(queue.hash_store().front(10).unwrap(), vec![hash(0)]);
    assert_eq!(queue.best_hash().unwrap(), hash(0));
}

#[tokio::test]
async fn test_set_best_hash_discards_previous_target() {
    let chain = Arc::new(MockChain::new());
    let queue = memory_queue(&chain);

    queue.add_hashes(&[hash(1), hash(2), hash(3)]).unwrap();
    queue.set_best_hash(hash(9)).unwrap();

    assert_eq!(queue.hash_store().len(), 1);
    assert_eq!(queue.best_hash().unwrap(), hash(9));
}

#[tokio::test]
async fn test_best_hash_on_empty_frontier() {
    let chain = Arc::new(MockChain::new());
    let queue = memory_queue(&chain);

    assert!(matches!(queue.best_hash(), Err(SyncError::EmptyFrontier)));
    assert!(queue.get_hashes().unwrap().is_empty());
}

#[tokio::test]
async fn test_returned_hashes_come_back_in_order() {
    let chain = Arc::new(MockChain::new());
    let queue = memory_queue(&chain);

    queue.set_best_hash(hash(0)).unwrap();
    queue.add_hashes(&[hash(1), hash(2), hash(3)]).unwrap();

    let batch = queue.get_hashes().unwrap();
    assert_eq!(batch, vec![hash(1), hash(2)]);

    queue.return_hashes(&batch).unwrap();
    assert_eq!(queue.get_hashes().unwrap(), batch);
    assert_eq!(queue.get_hashes().unwrap(), vec![hash(3), hash(0)]);
}

#[tokio::test]
async fn test_return_nothing_is_noop() {
    let chain = Arc::new(MockChain::new());
    let queue = memory_queue(&chain);

    queue.set_best_hash(hash(0)).unwrap();
    queue.return_hashes(&[]).unwrap();
    assert_eq!(queue.hash_store().len(), 1);
}

#[tokio::test]
async fn test_single_hash_goes_to_front_and_new_block_hash_to_back() {
    let chain = Arc::new(MockChain::new());
    let queue = memory_queue(&chain);

    queue.set_best_hash(hash(0)).unwrap();
    queue.add_new_block_hash(hash(5)).unwrap();
    queue.add_hash(hash(1)).unwrap();

    assert_eq!(
        queue.hash_store().front(10).unwrap(),
        vec![hash(1), hash(0), hash(5)]
    );
}

#[tokio::test]
async fn test_add_hashes_skips_queued_blocks() {
    let chain = Arc::new(MockChain::gated());
    let queue = memory_queue(&chain);
    park_worker(&queue, &chain).await;

    queue.add_block(create_test_block(4)).unwrap();
    queue.set_best_hash(hash(0)).unwrap();
    queue.add_hashes(&[hash(4), hash(5)]).unwrap();

    assert_eq!(
        queue.hash_store().front(10).unwrap(),
        vec![hash(5), hash(0)]
    );
}

#[tokio::test]
async fn test_add_blocks_rejects_empty_list() {
    let chain = Arc::new(MockChain::new());
    let queue = memory_queue(&chain);

    assert!(matches!(
        queue.add_blocks(Vec::new()),
        Err(SyncError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn test_last_block_falls_back_to_chain_head() {
    let chain = Arc::new(MockChain::new());
    let queue = memory_queue(&chain);

    assert_eq!(queue.last_block(), chain.best_block());
    assert_eq!(queue.last_block().number, 0);
}

#[tokio::test]
async fn test_last_block_is_last_announced_while_queued() {
    let chain = Arc::new(MockChain::gated());
    let queue = memory_queue(&chain);
    park_worker(&queue, &chain).await;

    queue
        .add_blocks(vec![create_test_block(1), create_test_block(2)])
        .unwrap();
    assert_eq!(queue.last_block(), create_test_block(2));

    queue.add_block(create_test_block(3)).unwrap();
    assert_eq!(queue.last_block(), create_test_block(3));
    assert_eq!(queue.size(), 3);
}

#[tokio::test]
async fn test_last_block_after_queue_drains() {
    let chain = Arc::new(MockChain::new());
    let queue = memory_queue(&chain);

    queue.add_block(create_test_block(1)).unwrap();
    wait_until(|| chain.imported() == vec![1]).await;
    wait_until(|| queue.size() == 0).await;

    assert_eq!(queue.last_block(), chain.best_block());
}

#[tokio::test]
async fn test_add_blocks_respects_capacity() {
    let chain = Arc::new(MockChain::gated());
    let queue = memory_queue(&chain);
    park_worker(&queue, &chain).await;

    let blocks: Vec<_> = (1..=15).map(create_test_block).collect();
    queue.add_blocks(blocks).unwrap();

    assert_eq!(queue.size(), 10);
    assert_eq!(queue.last_block(), create_test_block(15));
}

#[tokio::test]
async fn test_highest_total_difficulty_accessors() {
    let chain = Arc::new(MockChain::new());
    let queue = memory_queue(&chain);

    assert_eq!(queue.highest_total_difficulty(), TotalDifficulty::ZERO);
    queue.set_highest_total_difficulty(TotalDifficulty::from(131_072u64));
    assert_eq!(queue.highest_total_difficulty(), TotalDifficulty::from(131_072u64));
    assert_eq!(
        queue.stats().highest_total_difficulty,
        TotalDifficulty::from(131_072u64)
    );
}

#[tokio::test]
async fn test_clear_empties_both_stores() {
    let chain = Arc::new(MockChain::gated());
    let queue = memory_queue(&chain);
    park_worker(&queue, &chain).await;

    queue.add_block(create_test_block(1)).unwrap();
    queue.add_hashes(&[hash(7), hash(8)]).unwrap();
    queue.clear().unwrap();

    assert_eq!(queue.size(), 0);
    assert!(queue.is_hashes_empty());

    queue.add_hash(hash(9)).unwrap();
    assert_eq!(queue.best_hash().unwrap(), hash(9));
}

#[tokio::test]
async fn test_stats_reflect_stores() {
    let chain = Arc::new(MockChain::gated());
    let queue = memory_queue(&chain);
    park_worker(&queue, &chain).await;

    queue.add_block(create_test_block(1)).unwrap();
    queue.add_hashes(&[hash(7), hash(8)]).unwrap();

    let stats = queue.stats();
    assert_eq!(stats.block_queue_size, 1);
    assert_eq!(stats.block_queue_capacity, 10);
    assert_eq!(stats.hash_queue_size, 2);
    assert_eq!(stats.worker_state, WorkerState::Running);
}

#[tokio::test]
async fn test_close_stops_worker() {
    let chain = Arc::new(MockChain::new());
    let queue = memory_queue(&chain);

    queue.close().await.unwrap();
    assert_eq!(queue.worker_state(), WorkerState::Stopped);

    // Stores stay usable, only the worker is gone.
    queue.add_block(create_test_block(1)).unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(queue.size(), 1);
    assert!(chain.attempts().is_empty());
}

#[tokio::test]
async fn test_close_waits_for_import_in_progress() {
    let chain = Arc::new(MockChain::gated());
    let queue = Arc::new(memory_queue(&chain));
    park_worker(&queue, &chain).await;

    let closing = {
        let queue = Arc::clone(&queue);
        tokio::spawn(async move { queue.close().await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(!closing.is_finished());

    chain.release(1);
    closing.await.unwrap().unwrap();

    assert_eq!(chain.imported(), vec![100]);
    assert_eq!(queue.worker_state(), WorkerState::Stopped);
}

#[tokio::test]
async fn test_persisted_queue_resumes_after_restart() {
    let dir = TempDir::new().unwrap();

    {
        let chain = Arc::new(MockChain::gated());
        let db = open_db(dir.path()).unwrap();
        let hashes: Arc<dyn HashStore> = Arc::new(SledHashStore::open(&db).unwrap());
        let blocks: Arc<dyn BlockQueue> = Arc::new(SledBlockQueue::open(&db, 10).unwrap());
        let queue = SyncQueue::new(test_config(), chain.clone(), hashes, blocks).unwrap();
        park_worker(&queue, &chain).await;

        queue
            .add_blocks(vec![create_test_block(1), create_test_block(2)])
            .unwrap();
        queue.set_best_hash(hash(0)).unwrap();
        queue.add_hashes(&[hash(5), hash(6)]).unwrap();

        // Shutdown is signalled before the parked import is let through,
        // so the worker stops instead of taking block 1.
        let (closed, ()) = tokio::join!(queue.close(), async {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            chain.release(1);
        });
        closed.unwrap();
        assert_eq!(chain.imported(), vec![100]);
    }

    let chain = Arc::new(MockChain::gated());
    let db = retry_open(|| open_db(dir.path())).await;
    let hashes: Arc<dyn HashStore> = Arc::new(SledHashStore::open(&db).unwrap());
    let blocks: Arc<dyn BlockQueue> = Arc::new(SledBlockQueue::open(&db, 10).unwrap());
    let queue = SyncQueue::new(test_config(), chain.clone(), hashes, blocks).unwrap();

    assert_eq!(
        queue.hash_store().front(10).unwrap(),
        vec![hash(5), hash(6), hash(0)]
    );
    assert_eq!(queue.last_block(), create_test_block(2));

    chain.release(2);
    wait_until(|| chain.imported() == vec![1, 2]).await;
    queue.close().await.unwrap();
}
