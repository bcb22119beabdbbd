//! Persistent work lists behind the block sync queue.
//!
//! Two stores are provided, each with an in-memory and a sled-backed
//! implementation:
//!
//! - [`HashStore`]: hashes still to be fetched from peers. New and returned
//!   hashes go to the front, so the freshest chain is requested first.
//! - [`BlockQueue`]: downloaded blocks waiting for import, FIFO and bounded
//!   by a capacity on bulk appends.
//!
//! Every store method synchronizes internally. Callers share a store
//! behind an `Arc` without any outer lock.

pub mod block_queue;
pub mod db;
pub mod error;
pub mod hash_store;
pub mod sled_block_queue;
pub mod sled_hash_store;

pub use block_queue::{BlockQueue, MemoryBlockQueue};
pub use db::open_db;
pub use error::{Result, StoreError};
pub use hash_store::{HashStore, MemoryHashStore};
pub use sled_block_queue::SledBlockQueue;
pub use sled_hash_store::SledHashStore;
