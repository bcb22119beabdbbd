//! Block synchronization queue.
//!
//! Sits between the peer layer and the chain importer:
//!
//! - **Hash frontier**: hashes announced by peers that still need fetching
//! - **Pending block queue**: downloaded blocks waiting for import
//! - **Import worker**: one background task feeding queued blocks to the chain
//! - **Sync queue**: the facade producers call into, owning all of the above
//!
//! ## Flow
//!
//! 1. Peers announce hashes, which go to the front of the frontier
//! 2. Hashes whose block is already queued are filtered out
//! 3. The fetcher drains batches with `get_hashes` and downloads the blocks
//! 4. Downloaded blocks are pushed back with `add_blocks` / `add_block`
//! 5. The import worker pops blocks in order and connects them to the chain
//! 6. A block without parent goes back to the tail and the worker pauses

pub mod config;
pub mod error;
pub mod import_worker;
pub mod service;
pub mod states;

pub use config::*;
pub use error::{Result, SyncError};
pub use import_worker::ImportWorker;
pub use service::{SyncQueue, SyncStats};
pub use states::WorkerState;

#[cfg(test)]
mod tests;
