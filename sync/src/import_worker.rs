//! Background import of queued blocks.
//!
//! One worker per sync queue drains the pending block queue and hands each
//! block to the chain. Import is serial on purpose: the chain must see
//! parents before children.
//!
//! ## Retry
//!
//! A block whose parent is unknown goes back to the tail of the queue and
//! the whole worker pauses for the configured backoff. The pause throttles
//! retries of orphans and gives the missing ancestor time to arrive.
//!
//! ## Fault isolation
//!
//! An import that errors or panics is logged and the block is dropped. The
//! loop carries on with the next block.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chain::{Blockchain, ImportOutcome};
use containers::Block;
use futures::FutureExt;
use metrics::SharedMetrics;
use parking_lot::Mutex;
use storage::BlockQueue;
use tokio::runtime::Handle;
use tokio::select;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::states::{transition, WorkerState};

pub struct ImportWorker {
    chain: Arc<dyn Blockchain>,
    blocks: Arc<dyn BlockQueue>,
    backoff: Duration,
    state: Arc<Mutex<WorkerState>>,
    metrics: Option<SharedMetrics>,
}

impl ImportWorker {
    pub fn new(
        chain: Arc<dyn Blockchain>,
        blocks: Arc<dyn BlockQueue>,
        backoff: Duration,
        state: Arc<Mutex<WorkerState>>,
        metrics: Option<SharedMetrics>,
    ) -> Self {
        Self {
            chain,
            blocks,
            backoff,
            state,
            metrics,
        }
    }

    /// Run the loop on `runtime` until `shutdown` flips.
    pub fn spawn(self, runtime: &Handle, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        runtime.spawn(self.run(shutdown))
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(backoff_ms = self.backoff.as_millis() as u64, "Import worker started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let next = select! {
                biased;
                _ = shutdown.changed() => break,
                next = self.blocks.dequeue() => next,
            };

            let pause = match next {
                Ok(block) => self.process(block).await == Some(ImportOutcome::NoParent),
                Err(err) => {
                    error!(error = %err, "Failed to take block from queue");
                    true
                }
            };

            if pause {
                select! {
                    biased;
                    _ = shutdown.changed() => break,
                    _ = tokio::time::sleep(self.backoff) => {}
                }
            }
        }

        transition(&self.state, WorkerState::Stopped);
        info!("Import worker stopped");
    }

    /// Import a single block and act on the outcome.
    ///
    /// Returns `None` if the import errored or panicked.
    pub async fn process(&self, block: Block) -> Option<ImportOutcome> {
        let number = block.number;
        debug!(
            queue_size = self.blocks.len(),
            number,
            hash = %block.hash.short(),
            "Importing block"
        );

        let started = Instant::now();
        let result = AssertUnwindSafe(self.chain.try_to_connect(&block))
            .catch_unwind()
            .await;
        if let Some(metrics) = &self.metrics {
            metrics.observe_import_time(started.elapsed().as_secs_f64());
        }

        let outcome = match result {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                error!(number, error = ?err, "Block import failed");
                self.record_failure();
                return None;
            }
            Err(panic) => {
                error!(number, reason = panic_message(&*panic), "Block import panicked");
                self.record_failure();
                return None;
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.inc_import_outcome(outcome.as_str());
        }

        match outcome {
            ImportOutcome::Success => {
                info!(number, "Success importing block");
            }
            other if other.is_terminal() => {
                debug!(number, outcome = %other, "Block not imported, dropping it");
            }
            _ => {
                info!(number, "No parent on the chain for block");
                if let Err(err) = self.blocks.enqueue(block) {
                    error!(number, error = %err, "Failed to requeue block without parent");
                }
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.set_blocks_pending(self.blocks.len() as i64);
        }

        Some(outcome)
    }

    fn record_failure(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.inc_import_failures();
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic payload"
    }
}
