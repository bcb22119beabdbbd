//! Sled database handle and the position keys shared by both stores.
//!
//! Entries are keyed by a big-endian `u64` position so that sled's key
//! order is the deque order. An empty tree starts at [`MID_POSITION`];
//! front inserts grow downward and appends grow upward.

use std::path::Path;

use crate::{Result, StoreError};

/// Tree name for the hash frontier.
pub const HASH_STORE_TREE: &str = "block_queue_hashes";

/// Tree name for pending blocks.
pub const BLOCK_QUEUE_TREE: &str = "block_queue_blocks";

/// Position of the first entry inserted into an empty tree.
pub const MID_POSITION: u64 = u64::MAX / 2;

/// Open or create the sled database backing both stores.
pub fn open_db(path: &Path) -> Result<sled::Db> {
    sled::Config::new()
        .path(path)
        .mode(sled::Mode::HighThroughput)
        .flush_every_ms(Some(500))
        .open()
        .map_err(|e| StoreError::Database(format!("sled open: {}", e)))
}

pub(crate) fn encode_position(position: u64) -> [u8; 8] {
    position.to_be_bytes()
}

pub(crate) fn decode_position(key: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = key
        .try_into()
        .map_err(|_| StoreError::Corruption(format!("position key of {} bytes", key.len())))?;
    Ok(u64::from_be_bytes(bytes))
}

/// Occupied positions `[head, tail)` of a tree.
///
/// Both stores only remove from the front, so the range has no gaps and
/// its width is the entry count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Positions {
    pub head: u64,
    pub tail: u64,
}

impl Positions {
    pub fn new() -> Self {
        Self {
            head: MID_POSITION,
            tail: MID_POSITION,
        }
    }

    /// Rebuild the range from the first and last keys of `tree`.
    pub fn recover(tree: &sled::Tree) -> Result<Self> {
        let first = tree
            .first()
            .map_err(|e| StoreError::Database(format!("read first key: {}", e)))?;
        let last = tree
            .last()
            .map_err(|e| StoreError::Database(format!("read last key: {}", e)))?;

        match (first, last) {
            (Some((first, _)), Some((last, _))) => {
                let head = decode_position(&first)?;
                let tail = decode_position(&last)?
                    .checked_add(1)
                    .ok_or(StoreError::KeySpaceExhausted)?;
                if (tail - head) as usize != tree.len() {
                    return Err(StoreError::Corruption(format!(
                        "positions {}..{} do not match {} entries",
                        head,
                        tail,
                        tree.len()
                    )));
                }
                Ok(Self { head, tail })
            }
            _ => Ok(Self::new()),
        }
    }

    pub fn len(&self) -> usize {
        (self.tail - self.head) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    /// First position of `count` slots placed just before the head.
    pub fn front_start(&self, count: usize) -> Result<u64> {
        self.head
            .checked_sub(count as u64)
            .ok_or(StoreError::KeySpaceExhausted)
    }

    /// Tail after appending `count` slots.
    pub fn back_end(&self, count: usize) -> Result<u64> {
        self.tail
            .checked_add(count as u64)
            .ok_or(StoreError::KeySpaceExhausted)
    }

    /// Advance the head past a removed front entry at `position`.
    pub fn pop_front(&mut self, position: u64) {
        self.head = position + 1;
        if self.is_empty() {
            self.reset();
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
