mod service_tests;

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chain::{Blockchain, ImportOutcome};
use containers::{Block, BlockHash};
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use crate::SyncConfig;

/// Scripted response of the mock chain for one import attempt.
#[derive(Debug, Clone, Copy)]
pub(super) enum Step {
    Outcome(ImportOutcome),
    Fail,
    Panic,
}

/// Mock chain for testing.
///
/// Each block hash can be given a script of responses. Unscripted attempts
/// succeed. A gated chain holds every import until the test releases it.
pub(super) struct MockChain {
    genesis: Block,
    scripts: Mutex<HashMap<BlockHash, VecDeque<Step>>>,
    attempts: Mutex<Vec<u64>>,
    imported: Mutex<Vec<u64>>,
    gate: Option<Semaphore>,
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            genesis: create_test_block(0),
            scripts: Mutex::new(HashMap::new()),
            attempts: Mutex::new(Vec::new()),
            imported: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new()
        }
    }

    pub fn script(&self, block: &Block, steps: &[Step]) {
        self.scripts
            .lock()
            .insert(block.hash, steps.iter().copied().collect());
    }

    pub fn release(&self, imports: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(imports);
        }
    }

    pub fn attempts(&self) -> Vec<u64> {
        self.attempts.lock().clone()
    }

    pub fn imported(&self) -> Vec<u64> {
        self.imported.lock().clone()
    }
}

#[async_trait::async_trait]
impl Blockchain for MockChain {
    async fn try_to_connect(&self, block: &Block) -> anyhow::Result<ImportOutcome> {
        self.attempts.lock().push(block.number);

        if let Some(gate) = &self.gate {
            gate.acquire().await?.forget();
        }

        let step = self
            .scripts
            .lock()
            .get_mut(&block.hash)
            .and_then(|steps| steps.pop_front())
            .unwrap_or(Step::Outcome(ImportOutcome::Success));

        match step {
            Step::Outcome(outcome) => {
                if outcome == ImportOutcome::Success {
                    self.imported.lock().push(block.number);
                }
                Ok(outcome)
            }
            Step::Fail => Err(anyhow::anyhow!("state root mismatch in block {}", block.number)),
            Step::Panic => panic!("importer blew up on block {}", block.number),
        }
    }

    fn best_block(&self) -> Block {
        self.imported
            .lock()
            .last()
            .map(|number| create_test_block(*number as u8))
            .unwrap_or_else(|| self.genesis.clone())
    }
}

pub(super) fn hash(byte: u8) -> BlockHash {
    BlockHash::from([byte; 32])
}

pub(super) fn create_test_block(number: u8) -> Block {
    let parent = if number == 0 { BlockHash::default() } else { hash(number - 1) };
    Block::new(number as u64, hash(number), parent)
}

pub(super) fn test_config() -> SyncConfig {
    SyncConfig {
        max_blocks_ask: 2,
        max_blocks_queued: 10,
        no_parent_backoff_ms: 20,
    }
}

/// Poll `condition` until it holds, failing the test after five seconds.
pub(super) async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Reopen a sled directory whose previous handle may still hold the lock
/// until its flusher thread exits.
pub(super) async fn retry_open<T>(open: impl Fn() -> storage::Result<T>) -> T {
    for _ in 0..100 {
        match open() {
            Ok(value) => return value,
            Err(storage::StoreError::Database(message)) if message.contains("lock") => {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            Err(err) => panic!("open failed: {err}"),
        }
    }
    panic!("database still locked after 2s");
}
